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

//! Transaction manager public API integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ledger_service::{
    Cancellation, IdempotencyKey, InMemoryStore, LedgerError, Page, RepositoryError, Transaction,
    TransactionId, TransactionManager, TransactionRepository, User, UserId, UserRepository,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_577_836_800 + seconds, 0).unwrap()
}

fn make_transaction(user_id: UserId, amount: Decimal) -> Transaction {
    let key = IdempotencyKey::new_v4();
    Transaction {
        id: TransactionId::derive(key, user_id, amount),
        user_id,
        amount,
        created_at: timestamp(0),
        idempotency_key: key,
    }
}

async fn setup() -> (TransactionManager, Arc<InMemoryStore>, UserId) {
    let store = Arc::new(InMemoryStore::new());
    let manager = TransactionManager::new(store.clone());
    let user = UserId::new_v4();
    manager
        .create_user(&Cancellation::new(), user)
        .await
        .unwrap();
    (manager, store, user)
}

#[tokio::test]
async fn add_transaction_returns_input_unchanged() {
    let (manager, _, user) = setup().await;
    let tx = make_transaction(user, dec!(100));

    let recorded = manager
        .add_transaction(&Cancellation::new(), tx)
        .await
        .unwrap();
    assert_eq!(recorded, tx);
}

#[tokio::test]
async fn non_positive_amounts_are_invalid_and_leave_store_unchanged() {
    let (manager, store, user) = setup().await;
    let cancel = Cancellation::new();

    for amount in [Decimal::ZERO, dec!(-0.01), dec!(-100)] {
        let result = manager
            .add_transaction(&cancel, make_transaction(user, amount))
            .await;
        assert_eq!(result, Err(LedgerError::InvalidTransaction));
    }

    assert_eq!(store.transaction_count(), 0);
    assert_eq!(
        manager.get_user_balance(&cancel, user).await.unwrap(),
        Decimal::ZERO
    );
}

#[tokio::test]
async fn balance_after_single_transaction() {
    let (manager, _, user) = setup().await;
    let cancel = Cancellation::new();

    manager
        .add_transaction(&cancel, make_transaction(user, dec!(100)))
        .await
        .unwrap();

    assert_eq!(
        manager.get_user_balance(&cancel, user).await.unwrap(),
        dec!(100)
    );
}

#[tokio::test]
async fn balance_sums_exactly() {
    let (manager, _, user) = setup().await;
    let cancel = Cancellation::new();

    for _ in 0..10 {
        manager
            .add_transaction(&cancel, make_transaction(user, dec!(0.1)))
            .await
            .unwrap();
    }

    assert_eq!(
        manager.get_user_balance(&cancel, user).await.unwrap(),
        dec!(1.0)
    );
}

#[tokio::test]
async fn deposit_past_decimal_max_is_refused_and_balance_stays_readable() {
    let (manager, store, user) = setup().await;
    let cancel = Cancellation::new();
    let half = Decimal::MAX / dec!(2) + dec!(1);

    manager
        .add_transaction(&cancel, make_transaction(user, half))
        .await
        .unwrap();
    assert_eq!(
        manager
            .add_transaction(&cancel, make_transaction(user, half))
            .await,
        Err(LedgerError::Storage(RepositoryError::BalanceOverflow {
            user_id: user
        }))
    );

    assert_eq!(store.transaction_count(), 1);
    assert_eq!(manager.get_user_balance(&cancel, user).await.unwrap(), half);
    assert_eq!(
        manager
            .get_user_transaction_history(&cancel, user, 1, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn retry_after_success_is_duplicate_and_balance_unchanged() {
    let (manager, store, user) = setup().await;
    let cancel = Cancellation::new();
    let tx = make_transaction(user, dec!(100));

    manager.add_transaction(&cancel, tx).await.unwrap();
    let retry = manager.add_transaction(&cancel, tx).await;

    assert_eq!(retry, Err(LedgerError::TransactionAlreadyExists));
    assert_eq!(store.transaction_count(), 1);
    assert_eq!(
        manager.get_user_balance(&cancel, user).await.unwrap(),
        dec!(100)
    );
}

#[tokio::test]
async fn same_key_same_request_collides() {
    let (manager, _, user) = setup().await;
    let cancel = Cancellation::new();
    let key = IdempotencyKey::new_v4();

    let first = Transaction {
        id: TransactionId::derive(key, user, dec!(25)),
        user_id: user,
        amount: dec!(25),
        created_at: timestamp(0),
        idempotency_key: key,
    };
    // A retry arrives later with the amount written differently.
    let retry = Transaction {
        id: TransactionId::derive(key, user, dec!(25.00)),
        amount: dec!(25.00),
        created_at: timestamp(60),
        ..first
    };

    manager.add_transaction(&cancel, first).await.unwrap();
    assert_eq!(
        manager.add_transaction(&cancel, retry).await,
        Err(LedgerError::TransactionAlreadyExists)
    );
}

#[tokio::test]
async fn history_returns_recorded_transactions() {
    let (manager, _, user) = setup().await;
    let cancel = Cancellation::new();

    let mut first = make_transaction(user, dec!(100));
    first.created_at = timestamp(0);
    let mut second = make_transaction(user, dec!(50));
    second.created_at = timestamp(10);

    manager.add_transaction(&cancel, first).await.unwrap();
    manager.add_transaction(&cancel, second).await.unwrap();

    let history = manager
        .get_user_transaction_history(&cancel, user, 1, 10)
        .await
        .unwrap();
    assert_eq!(history, vec![first, second]);
}

#[tokio::test]
async fn history_of_user_without_transactions_is_empty() {
    let (manager, _, user) = setup().await;

    let history = manager
        .get_user_transaction_history(&Cancellation::new(), user, 1, 10)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn history_pages_are_stable() {
    let (manager, _, user) = setup().await;
    let cancel = Cancellation::new();

    let mut recorded = Vec::new();
    for i in 0..7 {
        let mut tx = make_transaction(user, Decimal::from(i + 1));
        // Pairs share a timestamp so the id breaks the tie.
        tx.created_at = timestamp(i / 2);
        manager.add_transaction(&cancel, tx).await.unwrap();
        recorded.push(tx);
    }
    recorded.sort_by(|a, b| a.history_order(b));

    let mut paged = Vec::new();
    for page in 1..=3 {
        paged.extend(
            manager
                .get_user_transaction_history(&cancel, user, page, 3)
                .await
                .unwrap(),
        );
    }

    assert_eq!(paged, recorded);
}

#[tokio::test]
async fn unknown_user_is_not_found_everywhere() {
    let (manager, store, _) = setup().await;
    let cancel = Cancellation::new();
    let stranger = UserId::new_v4();

    assert_eq!(
        manager.get_user_balance(&cancel, stranger).await,
        Err(LedgerError::UserNotFound)
    );
    assert_eq!(
        manager
            .get_user_transaction_history(&cancel, stranger, 1, 10)
            .await,
        Err(LedgerError::UserNotFound)
    );
    assert_eq!(
        manager
            .add_transaction(&cancel, make_transaction(stranger, dec!(10)))
            .await,
        Err(LedgerError::UserNotFound)
    );
    assert_eq!(store.transaction_count(), 0);
}

#[tokio::test]
async fn create_user_twice_is_rejected() {
    let (manager, _, user) = setup().await;
    assert_eq!(
        manager.create_user(&Cancellation::new(), user).await,
        Err(LedgerError::UserAlreadyExists)
    );
}

#[tokio::test]
async fn cancelled_signal_leaves_store_untouched() {
    let (manager, store, user) = setup().await;
    let cancel = Cancellation::new();
    cancel.cancel();

    let result = manager
        .add_transaction(&cancel, make_transaction(user, dec!(10)))
        .await;

    assert_eq!(result, Err(LedgerError::Cancelled));
    assert_eq!(store.transaction_count(), 0);
    assert_eq!(
        manager.get_user_balance(&cancel, user).await,
        Err(LedgerError::Cancelled)
    );
}

// === Fault injection ===

/// Store whose every call fails with the configured error.
struct FailingStore {
    error: RepositoryError,
    calls: AtomicUsize,
}

impl FailingStore {
    fn new(error: RepositoryError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    fn fail<T>(&self) -> Result<T, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

#[async_trait]
impl UserRepository for FailingStore {
    async fn add(&self, _id: UserId) -> Result<User, RepositoryError> {
        self.fail()
    }

    async fn find_by_id(&self, _id: UserId) -> Result<User, RepositoryError> {
        self.fail()
    }
}

#[async_trait]
impl TransactionRepository for FailingStore {
    async fn add_transaction(&self, _transaction: &Transaction) -> Result<(), RepositoryError> {
        self.fail()
    }

    async fn user_transaction_history(
        &self,
        _user_id: UserId,
        _page: Page,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        self.fail()
    }
}

#[tokio::test]
async fn infrastructure_errors_surface_unmodified_without_retry() {
    let error = RepositoryError::Unavailable("connection refused".into());
    let store = Arc::new(FailingStore::new(error.clone()));
    let manager = TransactionManager::new(store.clone());
    let cancel = Cancellation::new();
    let user = UserId::new_v4();

    assert_eq!(
        manager
            .add_transaction(&cancel, make_transaction(user, dec!(1)))
            .await,
        Err(LedgerError::Storage(error.clone()))
    );
    assert_eq!(
        manager.get_user_balance(&cancel, user).await,
        Err(LedgerError::Storage(error.clone()))
    );
    assert_eq!(
        manager
            .get_user_transaction_history(&cancel, user, 1, 10)
            .await,
        Err(LedgerError::Storage(error))
    );
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn invalid_transaction_never_reaches_store() {
    let store = Arc::new(FailingStore::new(RepositoryError::Backend("unused".into())));
    let manager = TransactionManager::new(store.clone());

    let result = manager
        .add_transaction(
            &Cancellation::new(),
            make_transaction(UserId::new_v4(), Decimal::ZERO),
        )
        .await;

    assert_eq!(result, Err(LedgerError::InvalidTransaction));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

/// Store that never answers.
struct HangingStore;

#[async_trait]
impl UserRepository for HangingStore {
    async fn add(&self, _id: UserId) -> Result<User, RepositoryError> {
        std::future::pending().await
    }

    async fn find_by_id(&self, _id: UserId) -> Result<User, RepositoryError> {
        std::future::pending().await
    }
}

#[async_trait]
impl TransactionRepository for HangingStore {
    async fn add_transaction(&self, _transaction: &Transaction) -> Result<(), RepositoryError> {
        std::future::pending().await
    }

    async fn user_transaction_history(
        &self,
        _user_id: UserId,
        _page: Page,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_waiting_on_store() {
    let manager = TransactionManager::new(Arc::new(HangingStore));
    let cancel = Cancellation::new().with_timeout(Duration::from_secs(2));

    let result = manager
        .add_transaction(&cancel, make_transaction(UserId::new_v4(), dec!(5)))
        .await;
    assert_eq!(result, Err(LedgerError::DeadlineExceeded));
}

#[tokio::test]
async fn cancel_stops_waiting_on_store() {
    let manager = TransactionManager::new(Arc::new(HangingStore));
    let cancel = Cancellation::new();
    let handle = cancel.clone();

    let pending = tokio::spawn(async move {
        manager
            .get_user_transaction_history(&cancel, UserId::new_v4(), 1, 10)
            .await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel();

    assert_eq!(pending.await.unwrap(), Err(LedgerError::Cancelled));
}
