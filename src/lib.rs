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

//! # Ledger Service
//!
//! This library records monetary transactions for users, derives balances
//! from them, and guarantees that a transaction is applied at most once no
//! matter how many times the same request arrives.
//!
//! ## Core Components
//!
//! - [`TransactionManager`]: Validates, records and queries transactions
//! - [`Repository`]: Storage contract with a structured identity conflict
//! - [`InMemoryStore`]: Concurrent store that serializes conflicting inserts
//! - [`Cancellation`]: Caller cancellation and deadlines for every operation
//! - [`LedgerError`]: Error types for ledger operations
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use ledger_service::{
//!     Cancellation, IdempotencyKey, InMemoryStore, LedgerError, Transaction, TransactionId,
//!     TransactionManager, UserId,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let manager = TransactionManager::new(Arc::new(InMemoryStore::new()));
//! let cancel = Cancellation::new();
//!
//! let user = UserId::new_v4();
//! manager.create_user(&cancel, user).await.unwrap();
//!
//! let key = IdempotencyKey::new_v4();
//! let deposit = Transaction {
//!     id: TransactionId::derive(key, user, dec!(100)),
//!     user_id: user,
//!     amount: dec!(100),
//!     created_at: Utc::now(),
//!     idempotency_key: key,
//! };
//! manager.add_transaction(&cancel, deposit).await.unwrap();
//!
//! // A retry of the same request is rejected
//! let retry = manager.add_transaction(&cancel, deposit).await;
//! assert_eq!(retry, Err(LedgerError::TransactionAlreadyExists));
//!
//! assert_eq!(manager.get_user_balance(&cancel, user).await.unwrap(), dec!(100));
//! # });
//! ```
//!
//! ## Thread Safety
//!
//! The manager holds no locks; every uniqueness decision is made by the
//! repository's atomic insert, so managers can be cloned freely and run
//! concurrently against one store.

pub mod api;
mod base;
mod cancel;
pub mod config;
pub mod error;
mod manager;
mod memory;
mod repository;
mod transaction;

pub use base::{IdempotencyKey, TransactionId, UserId};
pub use cancel::Cancellation;
pub use config::Config;
pub use error::{LedgerError, RepositoryError};
pub use manager::TransactionManager;
pub use memory::InMemoryStore;
pub use repository::{Repository, TransactionRepository, UserRepository};
pub use transaction::{Page, Transaction, User};
