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

//! Caller-controlled cancellation and deadlines.
//!
//! A [`Cancellation`] is passed to every ledger operation. Clones share the
//! same flag, so a caller can keep one handle and cancel work running
//! elsewhere.
//!
//! ```
//! use ledger_service::Cancellation;
//! use std::time::Duration;
//!
//! let cancel = Cancellation::new().with_timeout(Duration::from_millis(250));
//! let handle = cancel.clone();
//! handle.cancel();
//! assert!(cancel.is_cancelled());
//! ```

use crate::LedgerError;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancellation flag plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Arc<Signal>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A signal that only fires when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Fires the signal for this handle and all of its clones.
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::Release);
        self.signal.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns the error this signal currently reports, if any.
    pub fn check(&self) -> Result<(), LedgerError> {
        if self.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        if self.is_expired() {
            return Err(LedgerError::DeadlineExceeded);
        }
        Ok(())
    }

    async fn cancelled(&self) {
        loop {
            // Register before reading the flag so a concurrent cancel is not lost.
            let notified = self.signal.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Resolves with the reason once the signal fires or the deadline passes.
    async fn fired(&self) -> LedgerError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancelled() => LedgerError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => LedgerError::DeadlineExceeded,
            },
            None => {
                self.cancelled().await;
                LedgerError::Cancelled
            }
        }
    }

    /// Drives `operation` unless the signal fires first.
    ///
    /// A signal that has already fired returns without polling `operation`
    /// at all, so no store access happens.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.fired() => Err(reason),
            result = operation => result,
        }
    }
}
