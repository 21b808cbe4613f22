//! Error handling for the Production Lot Engine
//!
//! Every failure leaves the server in the standard envelope with one of the
//! taxonomy codes; domain refusals also carry a machine-readable reason.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::models::{ProcurementTransitionError, SelectionError, TransitionError};
use shared::types::{ApiErrorBody, ApiResponse, ErrorCode};
use thiserror::Error;

/// Refusal reasons attached to conflict responses
pub mod reason {
    pub const DUPLICATE_LINK: &str = "DUPLICATE_LINK";
    pub const INVALID_LOT_STATE: &str = "INVALID_LOT_STATE";
    pub const SUBPROCESS_NOT_IN_PROCESS: &str = "SUBPROCESS_NOT_IN_PROCESS";
    pub const INVALID_STATE_TRANSITION: &str = "INVALID_STATE_TRANSITION";
    pub const CRITICAL_ALERTS_OUTSTANDING: &str = "CRITICAL_ALERTS_OUTSTANDING";
    pub const LOT_HAS_SUBPROCESSES: &str = "LOT_HAS_SUBPROCESSES";
    pub const LOT_NOT_READY: &str = "LOT_NOT_READY";
    pub const ALREADY_ACKNOWLEDGED: &str = "ALREADY_ACKNOWLEDGED";
    pub const DUPLICATE_ENTRY: &str = "DUPLICATE_ENTRY";
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule refusals
    #[error("Conflict ({reason}): {message}")]
    Conflict {
        reason: &'static str,
        message: String,
    },

    /// A precondition could not be evaluated; the operation is refused
    #[error("Precondition check failed: {0}")]
    PreconditionUnavailable(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn conflict(reason: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            reason,
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Taxonomy code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::Validation { .. } | AppError::ValidationError(_) => {
                ErrorCode::ValidationError
            }
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::PreconditionUnavailable(_)
            | AppError::DatabaseError(_)
            | AppError::InternalError(_) => ErrorCode::SystemError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::SystemError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope body; internal details never reach the client
    pub fn body(&self) -> ApiErrorBody {
        let (message, reason, field) = match self {
            AppError::Unauthorized(msg) | AppError::Forbidden(msg) => (msg.clone(), None, None),
            AppError::Validation { field, message } => {
                (message.clone(), None, Some(field.clone()))
            }
            AppError::ValidationError(msg) => (msg.clone(), None, None),
            AppError::NotFound(resource) => (format!("{} not found", resource), None, None),
            AppError::Conflict { reason, message } => {
                (message.clone(), Some((*reason).to_string()), None)
            }
            AppError::PreconditionUnavailable(msg) => (msg.clone(), None, None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None, None),
            AppError::InternalError(_) => {
                ("An internal server error occurred".to_string(), None, None)
            }
        };
        ApiErrorBody {
            code: self.code(),
            message,
            reason,
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!(code = self.code().as_str(), "Error: {:?}", self);
        } else {
            tracing::warn!(code = self.code().as_str(), "Request refused: {}", self);
        }

        (status, Json(ApiResponse::failure(self.body()))).into_response()
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::conflict(reason::INVALID_STATE_TRANSITION, err.to_string())
    }
}

impl From<ProcurementTransitionError> for AppError {
    fn from(err: ProcurementTransitionError) -> Self {
        match err {
            ProcurementTransitionError::NotAllowed { .. } => {
                AppError::conflict(reason::INVALID_STATE_TRANSITION, err.to_string())
            }
            ProcurementTransitionError::PurchaseOrderRequired
            | ProcurementTransitionError::PurchaseOrderNotAllowed => {
                AppError::validation("purchase_order_id", err.to_string())
            }
        }
    }
}

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        AppError::validation(format!("selections[{}]", err.index()), err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            });
        match first {
            Some((field, message)) => AppError::Validation { field, message },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// True when the database rejected a write on a unique constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
