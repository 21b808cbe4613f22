//! HTTP handlers for the Production Lot Engine

use axum::{http::StatusCode, Json};
use serde::Serialize;
use shared::types::ApiResponse;
use uuid::Uuid;

pub mod alert_rule;
pub mod catalog;
pub mod extract;
pub mod health;
pub mod inventory_alert;
pub mod procurement;
pub mod production_lot;

pub use alert_rule::*;
pub use catalog::*;
pub use health::*;
pub use inventory_alert::*;
pub use procurement::*;
pub use production_lot::*;

/// Envelope-wrapped JSON body
pub type Envelope<T> = Json<ApiResponse<T>>;

pub(crate) fn ok<T>(data: T) -> Envelope<T> {
    Json(ApiResponse::ok(data))
}

pub(crate) fn created<T>(data: T) -> (StatusCode, Envelope<T>) {
    (StatusCode::CREATED, ok(data))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: Uuid,
    pub deleted: bool,
}
