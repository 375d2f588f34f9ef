// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Transaction manager.
//!
//! The [`TransactionManager`] is the central component: it validates
//! transactions, hands them to the repository, and answers balance and
//! history queries.
//!
//! # Duplicate Suppression
//!
//! The manager keeps no state of its own and takes no locks. Duplicates are
//! detected by the repository's atomic insert on the transaction identity;
//! a [`RepositoryError::Conflict`](crate::RepositoryError::Conflict) comes
//! back as [`LedgerError::TransactionAlreadyExists`]. Any number of managers
//! may share one repository.

use crate::base::UserId;
use crate::cancel::Cancellation;
use crate::error::LedgerError;
use crate::repository::Repository;
use crate::transaction::{Page, Transaction, User};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validates and records transactions against a shared repository.
#[derive(Clone)]
pub struct TransactionManager {
    repository: Arc<dyn Repository>,
}

impl TransactionManager {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// A transaction is valid iff its amount is strictly positive.
    pub fn validate(&self, transaction: &Transaction) -> bool {
        transaction.amount > Decimal::ZERO
    }

    /// Registers a user with a zero balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UserAlreadyExists`] - The id is taken.
    /// - [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`] - The signal fired.
    /// - [`LedgerError::Storage`] - Any other store failure.
    pub async fn create_user(
        &self,
        cancel: &Cancellation,
        user_id: UserId,
    ) -> Result<User, LedgerError> {
        let user = cancel
            .run(async { Ok::<_, LedgerError>(self.repository.add(user_id).await?) })
            .await
            .inspect_err(|err| log_failure("create_user", user_id, err))?;
        debug!(%user_id, "user created");
        Ok(user)
    }

    /// Records a transaction exactly once.
    ///
    /// Returns the transaction as recorded, which is the input unchanged.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidTransaction`] - Amount is not positive; the store is not touched.
    /// - [`LedgerError::TransactionAlreadyExists`] - The identity was recorded before.
    /// - [`LedgerError::UserNotFound`] - The user does not exist.
    /// - [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`] - The signal fired.
    /// - [`LedgerError::Storage`] - Any other store failure, not retried.
    pub async fn add_transaction(
        &self,
        cancel: &Cancellation,
        transaction: Transaction,
    ) -> Result<Transaction, LedgerError> {
        if !self.validate(&transaction) {
            return Err(LedgerError::InvalidTransaction);
        }

        let result = cancel
            .run(async {
                Ok::<_, LedgerError>(self.repository.add_transaction(&transaction).await?)
            })
            .await;

        match result {
            Ok(()) => {
                debug!(
                    transaction_id = %transaction.id,
                    user_id = %transaction.user_id,
                    amount = %transaction.amount,
                    "transaction recorded"
                );
                Ok(transaction)
            }
            Err(LedgerError::TransactionAlreadyExists) => {
                debug!(transaction_id = %transaction.id, "duplicate transaction rejected");
                Err(LedgerError::TransactionAlreadyExists)
            }
            Err(err) => {
                log_failure("add_transaction", transaction.user_id, &err);
                Err(err)
            }
        }
    }

    /// Returns the user's balance as reported by the repository.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UserNotFound`] - The user does not exist.
    /// - [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`] - The signal fired.
    /// - [`LedgerError::Storage`] - Any other store failure.
    pub async fn get_user_balance(
        &self,
        cancel: &Cancellation,
        user_id: UserId,
    ) -> Result<Decimal, LedgerError> {
        let user = cancel
            .run(async { Ok::<_, LedgerError>(self.repository.find_by_id(user_id).await?) })
            .await
            .inspect_err(|err| log_failure("get_user_balance", user_id, err))?;
        Ok(user.balance)
    }

    /// Returns one page of the user's transactions, oldest first.
    ///
    /// `page` is 1-indexed. A user without transactions gets an empty vector.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidPagination`] - `page` or `page_size` is zero.
    /// - [`LedgerError::UserNotFound`] - The user does not exist, checked before any history read.
    /// - [`LedgerError::Cancelled`] / [`LedgerError::DeadlineExceeded`] - The signal fired.
    /// - [`LedgerError::Storage`] - Any other store failure.
    pub async fn get_user_transaction_history(
        &self,
        cancel: &Cancellation,
        user_id: UserId,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let page = Page::new(page, page_size)?;

        cancel
            .run(async {
                self.repository.find_by_id(user_id).await?;
                Ok::<_, LedgerError>(self
                    .repository
                    .user_transaction_history(user_id, page)
                    .await?)
            })
            .await
            .inspect_err(|err| log_failure("get_user_transaction_history", user_id, err))
    }
}

fn log_failure(operation: &'static str, user_id: UserId, err: &LedgerError) {
    match err {
        LedgerError::Storage(_) | LedgerError::Cancelled | LedgerError::DeadlineExceeded => {
            warn!(operation, %user_id, error = %err, "ledger operation failed");
        }
        _ => debug!(operation, %user_id, error = %err, "ledger operation rejected"),
    }
}
