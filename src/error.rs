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

//! Error types for the ledger and its storage.

use crate::base::{TransactionId, UserId};
use thiserror::Error;

/// Failures reported by a [`Repository`](crate::Repository).
///
/// Identity conflicts are a variant of their own so callers never have to
/// inspect error text to recognise a duplicate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A transaction with this identity is already recorded
    #[error("transaction {id} already recorded")]
    Conflict { id: TransactionId },

    /// A user with this identity is already registered
    #[error("user {id} already registered")]
    UserExists { id: UserId },

    /// The referenced user does not exist
    #[error("record not found")]
    NotFound,

    /// Recording the transaction would take the balance past `Decimal::MAX`
    #[error("balance of user {user_id} would overflow")]
    BalanceOverflow { user_id: UserId },

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other store failure
    #[error("store failure: {0}")]
    Backend(String),
}

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("invalid transaction")]
    InvalidTransaction,

    /// The same logical request was already recorded
    #[error("transaction already exists")]
    TransactionAlreadyExists,

    /// Referenced user does not exist
    #[error("user not found")]
    UserNotFound,

    /// User was registered before
    #[error("user already exists")]
    UserAlreadyExists,

    /// Page number or page size is zero
    #[error("invalid pagination (page and page size must be positive)")]
    InvalidPagination,

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed before the store answered
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Infrastructure failure, passed through as reported by the store
    #[error(transparent)]
    Storage(RepositoryError),
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict { .. } => LedgerError::TransactionAlreadyExists,
            RepositoryError::UserExists { .. } => LedgerError::UserAlreadyExists,
            RepositoryError::NotFound => LedgerError::UserNotFound,
            other => LedgerError::Storage(other),
        }
    }
}
