//! Error type shared by every handler.
//!
//! All failures render as `{ "error": ..., "details": ... }` with the
//! upstream status code when there is one, 500 otherwise.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::middleware::clear_session_cookie;

/// Backend response body marking a revoked or unknown API token.
pub const INVALID_TOKEN_DETAIL: &str = "Invalid token.";

#[derive(Debug, Error)]
pub enum AppError {
    /// Upstream answered with a non-success status.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Value,
    },
    /// Upstream could not be reached or returned an unreadable body.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend rejected the session token; the client must sign in again.
    #[error("Invalid token.")]
    SessionExpired,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Validation { message: String, details: Value },
    /// The OAuth verifier was already exchanged by an earlier request.
    #[error("token already consumed")]
    TokenConsumed,
    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>, details: Value) -> Self {
        AppError::Validation { message: message.into(), details }
    }

    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Transport { context: context.into(), source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Upstream { status, .. } => *status,
            AppError::Transport { source, .. } => source
                .status()
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::SessionExpired | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } | AppError::TokenConsumed => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Value {
        match self {
            AppError::Upstream { details, .. } | AppError::Validation { details, .. } => {
                details.clone()
            }
            AppError::Transport { source, .. } => Value::String(source.to_string()),
            _ => Value::Null,
        }
    }
}

/// Classifies a backend 401 body: `{"detail": "Invalid token."}` means the
/// session must be dropped.
pub fn is_invalid_token(status: StatusCode, body: &Value) -> bool {
    status == StatusCode::UNAUTHORIZED
        && body.get("detail").and_then(Value::as_str) == Some(INVALID_TOKEN_DETAIL)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::TokenConsumed => tracing::warn!("OAuth token already consumed"),
            AppError::Validation { .. } | AppError::NotFound(_) | AppError::Unauthorized => {
                tracing::debug!("request rejected: {}", self)
            }
            _ => tracing::error!("request failed ({}): {:?}", status, self),
        }

        let mut body = json!({
            "error": self.to_string(),
            "details": self.details(),
        });

        if matches!(self, AppError::SessionExpired) {
            body["sign_out"] = Value::Bool(true);
            let mut response = (status, Json(body)).into_response();
            if let Ok(cookie) = HeaderValue::from_str(&clear_session_cookie().to_string()) {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            return response;
        }

        (status, Json(body)).into_response()
    }
}
