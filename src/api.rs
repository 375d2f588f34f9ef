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

//! REST API over the [`TransactionManager`].
//!
//! # Usage
//!
//! ```bash
//! # Create a user
//! curl -X POST http://localhost:3000/users \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": "6f0c6a53-7f7e-4a4e-9d43-2f3c1d6f8b10"}'
//!
//! # Add a transaction
//! curl -X POST http://localhost:3000/users/6f0c6a53-7f7e-4a4e-9d43-2f3c1d6f8b10/add \
//!   -H "Content-Type: application/json" \
//!   -d '{"amount": 100, "idempotency_key": "0d7f5d8e-3a55-4c35-9d8e-0c2b5f5e3c11"}'
//!
//! # Balance
//! curl http://localhost:3000/users/6f0c6a53-7f7e-4a4e-9d43-2f3c1d6f8b10/balance
//!
//! # History
//! curl "http://localhost:3000/users/6f0c6a53-7f7e-4a4e-9d43-2f3c1d6f8b10/history?page=1&pageSize=10"
//! ```

use crate::base::{IdempotencyKey, TransactionId, UserId};
use crate::cancel::Cancellation;
use crate::error::LedgerError;
use crate::manager::TransactionManager;
use crate::transaction::{Page, Transaction};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

// === Request/Response DTOs ===

/// Request body for creating users. A missing id is generated.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub id: Option<UserId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub id: UserId,
}

/// Amount as sent on the wire.
///
/// Accepts `"100.50"` as well as `100.50`. Numbers keep the digits they were
/// sent with and are never read as floats.
#[derive(Debug, Clone)]
pub enum WireAmount {
    Text(String),
    Number(serde_json::Number),
}

impl<'de> Deserialize<'de> for WireAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // `Value` holds numbers as the text they arrived in.
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(Self::Text(text)),
            Value::Number(number) => Ok(Self::Number(number)),
            other => Err(de::Error::custom(format!(
                "amount must be a string or a number, got {other}"
            ))),
        }
    }
}

impl WireAmount {
    pub fn to_decimal(&self) -> Option<Decimal> {
        let text = match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        };
        Decimal::from_str_exact(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }
}

/// Request body for adding a transaction.
///
/// ```json
/// {"amount": "100.00", "idempotency_key": "0d7f5d8e-3a55-4c35-9d8e-0c2b5f5e3c11"}
/// ```
#[derive(Debug, Deserialize)]
pub struct AddTransactionRequest {
    /// Optional; must match the path when present.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub amount: WireAmount,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddTransactionResponse {
    pub message: String,
    pub transaction: Transaction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<usize>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<usize>,
}

/// Response body for errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the transaction manager.
#[derive(Clone)]
pub struct AppState {
    pub manager: TransactionManager,
    /// Deadline applied to each request; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(manager: TransactionManager, request_timeout: Option<Duration>) -> Self {
        Self {
            manager,
            request_timeout,
        }
    }

    fn cancellation(&self) -> Cancellation {
        match self.request_timeout {
            Some(timeout) => Cancellation::new().with_timeout(timeout),
            None => Cancellation::new(),
        }
    }
}

// === Error Handling ===

/// Converts ledger errors and malformed requests into HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Ledger(LedgerError),
    BadRequest {
        code: &'static str,
        message: String,
    },
}

impl AppError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Ledger(err)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request("INVALID_USER_ID", rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request("INVALID_BODY", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request("INVALID_QUERY", rejection.body_text())
    }
}

/// Status and machine-readable code for a ledger error.
pub fn status_for(err: &LedgerError) -> (StatusCode, &'static str) {
    match err {
        LedgerError::InvalidTransaction => (StatusCode::BAD_REQUEST, "INVALID_TRANSACTION"),
        LedgerError::InvalidPagination => (StatusCode::BAD_REQUEST, "INVALID_PAGINATION"),
        LedgerError::TransactionAlreadyExists => {
            (StatusCode::CONFLICT, "TRANSACTION_ALREADY_EXISTS")
        }
        LedgerError::UserAlreadyExists => (StatusCode::CONFLICT, "USER_ALREADY_EXISTS"),
        LedgerError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        LedgerError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
        LedgerError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED"),
        LedgerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_FAILURE"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = match self {
            AppError::Ledger(err) => {
                let (status, code) = status_for(&err);
                (status, code, err.to_string())
            }
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /users - Register a user.
async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let request: CreateUserRequest = if body.is_empty() {
        CreateUserRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::bad_request("INVALID_BODY", err.to_string()))?
    };
    let user_id = request.id.unwrap_or_else(UserId::new_v4);

    let user = state
        .manager
        .create_user(&state.cancellation(), user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(CreateUserResponse { id: user.id })))
}

/// POST /users/{id}/add - Add a transaction for a user.
async fn add_transaction(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AddTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddTransactionResponse>), AppError> {
    let Path(id) = path?;
    let Json(request) = body?;
    let user_id = UserId(id);

    if request.user_id.is_some_and(|body_user| body_user != user_id) {
        return Err(AppError::bad_request(
            "USER_MISMATCH",
            "user_id in body does not match path",
        ));
    }

    let amount = request.amount.to_decimal().ok_or_else(|| {
        debug!(amount = ?request.amount, "unparseable amount");
        AppError::bad_request("INVALID_AMOUNT", "amount is not a decimal number")
    })?;
    let idempotency_key = request
        .idempotency_key
        .unwrap_or_else(IdempotencyKey::new_v4);

    let transaction = Transaction {
        id: TransactionId::derive(idempotency_key, user_id, amount),
        user_id,
        amount,
        created_at: request.created_at.unwrap_or_else(Utc::now),
        idempotency_key,
    };

    let transaction = state
        .manager
        .add_transaction(&state.cancellation(), transaction)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddTransactionResponse {
            message: "Transaction successfully added".to_string(),
            transaction,
        }),
    ))
}

/// GET /users/{id}/balance - Current balance.
async fn get_balance(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BalanceResponse>, AppError> {
    let Path(id) = path?;
    let balance = state
        .manager
        .get_user_balance(&state.cancellation(), UserId(id))
        .await?;
    Ok(Json(BalanceResponse { balance }))
}

/// GET /users/{id}/history?page=&pageSize= - One page of history.
async fn get_history(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let Path(id) = path?;
    let Query(query) = query?;

    let transactions = state
        .manager
        .get_user_transaction_history(
            &state.cancellation(),
            UserId(id),
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(Page::DEFAULT_SIZE),
        )
        .await?;
    Ok(Json(transactions))
}

// === Router ===

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}/add", post(add_transaction))
        .route("/users/{id}/balance", get(get_balance))
        .route("/users/{id}/history", get(get_history))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amount(json: &str) -> Option<Decimal> {
        serde_json::from_str::<WireAmount>(json).unwrap().to_decimal()
    }

    #[test]
    fn wire_amount_accepts_strings_and_numbers() {
        assert_eq!(amount("\"100.50\""), Some(dec!(100.50)));
        assert_eq!(amount("100"), Some(dec!(100)));
        assert_eq!(amount("0.1"), Some(dec!(0.1)));
        assert_eq!(amount("-3"), Some(dec!(-3)));
        assert_eq!(amount("1e3"), Some(dec!(1000)));
    }

    #[test]
    fn wire_amount_keeps_every_digit_of_a_number() {
        assert_eq!(
            amount("12345678.123456789012"),
            Some(dec!(12345678.123456789012))
        );
        assert_eq!(amount("0.10000000000000001"), Some(dec!(0.10000000000000001)));
        assert_ne!(amount("0.10000000000000001"), amount("0.1"));
    }

    #[test]
    fn wire_amount_rejects_garbage() {
        assert_eq!(amount("\"ten\""), None);
        assert_eq!(amount("\"\""), None);
        assert!(serde_json::from_str::<WireAmount>("true").is_err());
        assert!(serde_json::from_str::<WireAmount>("null").is_err());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&LedgerError::InvalidTransaction).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&LedgerError::TransactionAlreadyExists).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&LedgerError::UserNotFound).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&LedgerError::Storage(crate::RepositoryError::Backend(
                "boom".into()
            )))
            .0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&LedgerError::DeadlineExceeded).0,
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
