//! HTTP handlers for production lots, their subprocess links and selections

use axum::{extract::State, http::StatusCode};
use shared::models::{LotTransition, ProductionLot, ReadinessReport};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery, OptionalJson};
use super::{created, ok, Deleted, Envelope};
use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::inventory_alert::LotEvaluation;
use crate::services::linkage::{
    AttachOutcome, AttachSubprocessInput, LinkDetail, LotSubprocessLink, SelectionChange,
    SetSelectionsInput, UpdateLinkStatusInput,
};
use crate::services::production_lot::{
    CreateProductionLotInput, CreatedLot, ExecuteLotInput, LotDetail, ProductionLotFilter,
    TransitionNote, TransitionOutcome,
};
use crate::services::rollup::LotTotals;
use crate::services::{InventoryAlertService, LinkageService, ProductionLotService, RollupService};
use crate::AppState;

// ============================================================================
// Lots
// ============================================================================

pub async fn create_production_lot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CreateProductionLotInput>,
) -> AppResult<(StatusCode, Envelope<CreatedLot>)> {
    let service = ProductionLotService::from_state(&state);
    Ok(created(service.create(user.user_id, input).await?))
}

pub async fn list_production_lots(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(filter): AppQuery<ProductionLotFilter>,
) -> AppResult<Envelope<Vec<ProductionLot>>> {
    let service = ProductionLotService::from_state(&state);
    Ok(ok(service.list(filter).await?))
}

pub async fn get_production_lot(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<LotDetail>> {
    let service = ProductionLotService::from_state(&state);
    Ok(ok(service.get(lot_id).await?))
}

/// Delete a lot that has no subprocess links
pub async fn delete_production_lot(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<Deleted>> {
    let service = ProductionLotService::from_state(&state);
    service.delete(lot_id).await?;
    Ok(ok(Deleted {
        id: lot_id,
        deleted: true,
    }))
}

pub async fn get_lot_readiness(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<ReadinessReport>> {
    let service = ProductionLotService::from_state(&state);
    Ok(ok(service.readiness(lot_id).await?))
}

pub async fn recalculate_lot_totals(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<LotTotals>> {
    let service = RollupService::from_state(&state);
    Ok(ok(service.recalculate(lot_id).await?))
}

pub async fn evaluate_lot_alerts(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<LotEvaluation>> {
    let service = InventoryAlertService::from_state(&state);
    Ok(ok(service.evaluate_lot(lot_id).await?))
}

// ============================================================================
// State transitions
// ============================================================================

pub async fn finalize_production_lot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<TransitionOutcome>> {
    let service = ProductionLotService::from_state(&state);
    Ok(ok(service.finalize(lot_id, user.user_id).await?))
}

/// Start execution; overriding outstanding CRITICAL alerts needs `production_lots:override`
pub async fn execute_production_lot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
    OptionalJson(input): OptionalJson<ExecuteLotInput>,
) -> AppResult<Envelope<TransitionOutcome>> {
    if input.override_critical_alerts {
        check_permission(&user, "production_lots", "override")?;
    }
    let service = ProductionLotService::from_state(&state);
    Ok(ok(service.execute(lot_id, user.user_id, input).await?))
}

pub async fn complete_production_lot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
    OptionalJson(note): OptionalJson<TransitionNote>,
) -> AppResult<Envelope<TransitionOutcome>> {
    let service = ProductionLotService::from_state(&state);
    let outcome = service
        .close(lot_id, user.user_id, LotTransition::Complete, note)
        .await?;
    Ok(ok(outcome))
}

pub async fn fail_production_lot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
    OptionalJson(note): OptionalJson<TransitionNote>,
) -> AppResult<Envelope<TransitionOutcome>> {
    let service = ProductionLotService::from_state(&state);
    let outcome = service
        .close(lot_id, user.user_id, LotTransition::Fail, note)
        .await?;
    Ok(ok(outcome))
}

pub async fn cancel_production_lot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
    OptionalJson(note): OptionalJson<TransitionNote>,
) -> AppResult<Envelope<TransitionOutcome>> {
    let service = ProductionLotService::from_state(&state);
    Ok(ok(service.cancel(lot_id, user.user_id, note).await?))
}

// ============================================================================
// Subprocess links and variant selections
// ============================================================================

pub async fn attach_lot_subprocess(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
    AppJson(input): AppJson<AttachSubprocessInput>,
) -> AppResult<(StatusCode, Envelope<AttachOutcome>)> {
    let service = LinkageService::from_state(&state);
    Ok(created(service.attach_subprocess(lot_id, input).await?))
}

pub async fn list_lot_subprocesses(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(lot_id): AppPath<Uuid>,
) -> AppResult<Envelope<Vec<LinkDetail>>> {
    // Resolves the lot first so an unknown id is a 404, not an empty list
    let lots = ProductionLotService::from_state(&state);
    let detail = lots.get(lot_id).await?;
    Ok(ok(detail.subprocesses))
}

/// Replace a link's variant selections; `sub_id` is the link id or the subprocess id
pub async fn set_lot_variant_selections(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath((lot_id, sub_id)): AppPath<(Uuid, Uuid)>,
    AppJson(input): AppJson<SetSelectionsInput>,
) -> AppResult<Envelope<SelectionChange>> {
    let service = LinkageService::from_state(&state);
    let change = service
        .set_variant_selections(lot_id, sub_id, user.user_id, input)
        .await?;
    Ok(ok(change))
}

pub async fn update_lot_subprocess_status(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath((lot_id, sub_id)): AppPath<(Uuid, Uuid)>,
    AppJson(input): AppJson<UpdateLinkStatusInput>,
) -> AppResult<Envelope<LotSubprocessLink>> {
    let service = LinkageService::from_state(&state);
    Ok(ok(service.update_link_status(lot_id, sub_id, input).await?))
}
