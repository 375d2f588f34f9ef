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

//! Thread-safe in-memory store with atomic duplicate detection.
//!
//! Transactions are keyed by identity in a [`DashMap`]; its entry API gives
//! an atomic check-and-insert, so concurrent inserts of one identity are
//! serialized by the shard lock and only the first one lands.
//!
//! Each user owns an ordered history behind a [`RwLock`]. Balances are summed
//! from that history on every read; a transaction that would take the sum
//! past `Decimal::MAX` is refused before it is indexed.
//!
//! Lock order is always users shard, then transactions shard, then user
//! history. Readers never touch the transactions map.

use crate::base::{TransactionId, UserId};
use crate::error::RepositoryError;
use crate::repository::{TransactionRepository, UserRepository};
use crate::transaction::{Page, Transaction, User};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// A user's transactions in history order.
#[derive(Debug, Default)]
struct UserLedger {
    history: RwLock<Vec<Transaction>>,
}

/// Sum of `history`, or `None` past `Decimal::MAX`.
fn total(history: &[Transaction]) -> Option<Decimal> {
    history
        .iter()
        .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.amount))
}

impl UserLedger {
    /// Inserts `transaction` in history order, calling `index` first.
    ///
    /// Nothing is recorded and `index` is not called if the balance would
    /// overflow.
    fn record(
        &self,
        transaction: Transaction,
        index: impl FnOnce(),
    ) -> Result<(), RepositoryError> {
        let mut history = self.history.write();
        if total(&history)
            .and_then(|sum| sum.checked_add(transaction.amount))
            .is_none()
        {
            return Err(RepositoryError::BalanceOverflow {
                user_id: transaction.user_id,
            });
        }

        index();
        let position =
            history.partition_point(|existing| existing.history_order(&transaction) == Ordering::Less);
        history.insert(position, transaction);
        Ok(())
    }

    fn balance(&self) -> Option<Decimal> {
        total(&self.history.read())
    }

    fn page(&self, page: Page) -> Vec<Transaction> {
        self.history
            .read()
            .iter()
            .skip(page.offset())
            .take(page.size())
            .copied()
            .collect()
    }
}

/// In-memory [`Repository`](crate::Repository).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: DashMap<UserId, UserLedger>,
    /// Identity index; the uniqueness constraint lives here.
    transactions: DashMap<TransactionId, Transaction>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn add(&self, id: UserId) -> Result<User, RepositoryError> {
        match self.users.entry(id) {
            Entry::Occupied(_) => Err(RepositoryError::UserExists { id }),
            Entry::Vacant(entry) => {
                entry.insert(UserLedger::default());
                Ok(User::new(id))
            }
        }
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, RepositoryError> {
        let ledger = self.users.get(&id).ok_or(RepositoryError::NotFound)?;
        let balance = ledger
            .balance()
            .ok_or(RepositoryError::BalanceOverflow { user_id: id })?;
        Ok(User { id, balance })
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn add_transaction(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        let ledger = self
            .users
            .get(&transaction.user_id)
            .ok_or(RepositoryError::NotFound)?;

        match self.transactions.entry(transaction.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict { id: transaction.id }),
            Entry::Vacant(entry) => {
                // The shard stays locked until the history holds the row, so a
                // caller that saw the conflict also sees the balance change.
                // A rejected row drops the vacant entry without indexing it.
                let mut _guard = None;
                ledger.record(*transaction, || _guard = Some(entry.insert(*transaction)))
            }
        }
    }

    async fn user_transaction_history(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let ledger = self.users.get(&user_id).ok_or(RepositoryError::NotFound)?;
        Ok(ledger.page(page))
    }
}
