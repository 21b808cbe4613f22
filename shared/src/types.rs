//! Wire types shared by the server and its clients

use serde::{Deserialize, Serialize};

/// Standard response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: ApiErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error detail inside the envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    /// Machine-readable refusal reason, e.g. `DUPLICATE_LINK`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Error taxonomy exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    SystemError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::SystemError => "system_error",
        }
    }
}

/// Outcome of one item in a bulk operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub id: uuid::Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

/// Aggregate of a bulk operation where partial success is expected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub acknowledged_count: usize,
    pub failed_count: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkOutcome {
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let acknowledged_count = results.iter().filter(|r| r.success).count();
        Self {
            acknowledged_count,
            failed_count: results.len() - acknowledged_count,
            results,
        }
    }

    pub fn failed_ids(&self) -> Vec<uuid::Uuid> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.id)
            .collect()
    }
}
