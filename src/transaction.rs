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

//! Ledger records.
//!
//! Transactions are immutable once recorded. A user's balance is never
//! stored on its own: it is the sum of the user's transaction amounts.

use crate::LedgerError;
use crate::base::{IdempotencyKey, TransactionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A balance-affecting event for a single user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: IdempotencyKey,
}

impl Transaction {
    /// History order: oldest first, ties broken by id.
    pub fn history_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// A ledger user together with its derived balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub balance: Decimal,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
        }
    }
}

/// A 1-indexed page request over a user's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: usize,
    size: usize,
}

impl Page {
    pub const DEFAULT_SIZE: usize = 10;

    /// Builds a page request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidPagination`] if either value is zero.
    pub fn new(number: usize, size: usize) -> Result<Self, LedgerError> {
        if number == 0 || size == 0 {
            return Err(LedgerError::InvalidPagination);
        }
        Ok(Self { number, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of records preceding this page.
    pub fn offset(&self) -> usize {
        (self.number - 1).saturating_mul(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: Self::DEFAULT_SIZE,
        }
    }
}
