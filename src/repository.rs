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

//! Storage contracts for users and transactions.
//!
//! A backend is the single source of truth: it must enforce identity
//! uniqueness atomically, so that among concurrent inserts of the same
//! [`TransactionId`](crate::TransactionId) exactly one succeeds and every
//! other one observes [`RepositoryError::Conflict`].
//!
//! A SQL backend keeps the following layout:
//!
//! ```sql
//! users(id UUID PRIMARY KEY, balance DOUBLE PRECISION NOT NULL)
//! transactions(id UUID PRIMARY KEY,
//!              user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!              amount DOUBLE PRECISION NOT NULL,
//!              created_at TIMESTAMP NOT NULL,
//!              idempotency_key UUID NOT NULL)
//! ```

use crate::base::UserId;
use crate::error::RepositoryError;
use crate::transaction::{Page, Transaction, User};
use async_trait::async_trait;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Registers a user with an empty history.
    ///
    /// Fails with [`RepositoryError::UserExists`] on a repeated id.
    async fn add(&self, id: UserId) -> Result<User, RepositoryError>;

    /// Looks up a user and its balance.
    ///
    /// Fails with [`RepositoryError::NotFound`] if absent.
    async fn find_by_id(&self, id: UserId) -> Result<User, RepositoryError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Atomically records a transaction.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the identity is taken,
    /// with [`RepositoryError::NotFound`] when the user does not exist and with
    /// [`RepositoryError::BalanceOverflow`] when the balance could no longer be
    /// represented. A failed call records nothing.
    async fn add_transaction(&self, transaction: &Transaction) -> Result<(), RepositoryError>;

    /// One page of a user's transactions, oldest first.
    async fn user_transaction_history(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transaction>, RepositoryError>;
}

/// Both sub-repositories behind one object.
pub trait Repository: UserRepository + TransactionRepository {}

impl<T: UserRepository + TransactionRepository> Repository for T {}
