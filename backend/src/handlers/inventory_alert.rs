//! HTTP handlers for inventory alerts

use axum::{extract::State, http::StatusCode};
use shared::types::BulkOutcome;
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery, OptionalJson};
use super::{created, ok, Envelope};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory_alert::{
    AcknowledgeInput, AlertEvaluation, AlertFilter, BulkAcknowledgeInput, CreateAlertInput,
    InventoryAlert,
};
use crate::services::InventoryAlertService;
use crate::AppState;

/// Evaluate one (lot, variant) requirement and persist the outcome
pub async fn create_inventory_alert(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppJson(input): AppJson<CreateAlertInput>,
) -> AppResult<(StatusCode, Envelope<AlertEvaluation>)> {
    let service = InventoryAlertService::from_state(&state);
    let evaluation = service.create_alert(input).await?;
    Ok(created(evaluation))
}

pub async fn list_inventory_alerts(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(filter): AppQuery<AlertFilter>,
) -> AppResult<Envelope<Vec<InventoryAlert>>> {
    let service = InventoryAlertService::from_state(&state);
    Ok(ok(service.list(filter).await?))
}

pub async fn get_inventory_alert(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(alert_id): AppPath<Uuid>,
) -> AppResult<Envelope<InventoryAlert>> {
    let service = InventoryAlertService::from_state(&state);
    Ok(ok(service.get(alert_id).await?))
}

pub async fn acknowledge_inventory_alert(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(alert_id): AppPath<Uuid>,
    OptionalJson(input): OptionalJson<AcknowledgeInput>,
) -> AppResult<Envelope<InventoryAlert>> {
    let service = InventoryAlertService::from_state(&state);
    Ok(ok(service.acknowledge(alert_id, user.user_id, input).await?))
}

/// Acknowledge many alerts; each id succeeds or fails on its own
pub async fn bulk_acknowledge_inventory_alerts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<BulkAcknowledgeInput>,
) -> AppResult<Envelope<BulkOutcome>> {
    let service = InventoryAlertService::from_state(&state);
    let outcome = service.bulk_acknowledge(user.user_id, input).await?;
    Ok(ok(outcome))
}
