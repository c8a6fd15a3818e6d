use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::schemas::ErrorResponse;

/// The error taxonomy of the API.
///
/// Every handler returns `Result<_, ApiError>` so that status codes and
/// the `ErrorResponse` JSON shape stay consistent across the surface.
/// Storage errors deliberately carry no detail to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict {
        message: String,
        code: &'static str,
    },
    #[error("mail delivery failed: {0}")]
    MailDelivery(String),
    #[error("database error")]
    Database(#[from] DbErr),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn stock_exhausted() -> Self {
        Self::Conflict {
            message: "Coffee stock is exhausted".to_string(),
            code: "STOCK_EXHAUSTED",
        }
    }

    pub fn cap_reached(cap: i32) -> Self {
        Self::Conflict {
            message: format!("Personal coffee cap of {cap} reached"),
            code: "CAP_REACHED",
        }
    }

    pub fn email_exists(email: &str) -> Self {
        Self::Conflict {
            message: format!("Email '{email}' is already registered"),
            code: "EMAIL_ALREADY_EXISTS",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::MailDelivery(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict { code, .. } => code,
            Self::MailDelivery(_) => "MAIL_DELIVERY_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage failures are opaque to the caller but loud in the logs.
        let message = match &self {
            Self::Database(db_error) => {
                error!("Database error: {}", db_error);
                "Internal server error".to_string()
            }
            Self::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => {
                warn!("Request failed with {}: {}", status, other);
                other.to_string()
            }
        };

        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
            success: false,
        };

        (status, Json(body)).into_response()
    }
}

/// How many runtime errors the in-memory ring keeps around.
const ERROR_LOG_CAPACITY: usize = 50;

/// One captured runtime error, e.g. a failed notification send.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RuntimeError {
    /// Which subsystem produced the error.
    pub source: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded in-memory ring of recent runtime errors.
///
/// Failures on detached work (the mail fan-out) land here instead of in
/// any user-facing response; admins can inspect the ring via the API.
#[derive(Debug, Clone, Default)]
pub struct RuntimeErrorLog {
    inner: Arc<Mutex<VecDeque<RuntimeError>>>,
}

impl RuntimeErrorLog {
    pub fn record(&self, source: &str, message: String) {
        let mut ring = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if ring.len() == ERROR_LOG_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(RuntimeError {
            source: source.to_string(),
            message,
            at: Utc::now(),
        });
    }

    /// Most recent errors, newest last.
    pub fn recent(&self) -> Vec<RuntimeError> {
        let ring = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ring.iter().cloned().collect()
    }
}
