//! HTTP handlers for procurement recommendations

use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery, OptionalJson};
use super::{created, ok, Envelope};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::procurement::{
    AlertRecommendation, CreateRecommendationInput, FromAlertInput, ProcurementRecommendation,
    RecommendationFilter, UpdateStatusInput,
};
use crate::services::ProcurementService;
use crate::AppState;

pub async fn create_recommendation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CreateRecommendationInput>,
) -> AppResult<(StatusCode, Envelope<ProcurementRecommendation>)> {
    let service = ProcurementService::from_state(&state);
    Ok(created(service.recommend(user.user_id, input).await?))
}

/// Raise a recommendation sized from an alert's shortfall
pub async fn recommend_from_alert(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(alert_id): AppPath<Uuid>,
    OptionalJson(input): OptionalJson<FromAlertInput>,
) -> AppResult<(StatusCode, Envelope<AlertRecommendation>)> {
    let service = ProcurementService::from_state(&state);
    Ok(created(service.from_alert(alert_id, user.user_id, input).await?))
}

pub async fn list_recommendations(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(filter): AppQuery<RecommendationFilter>,
) -> AppResult<Envelope<Vec<ProcurementRecommendation>>> {
    let service = ProcurementService::from_state(&state);
    Ok(ok(service.list(filter).await?))
}

pub async fn get_recommendation(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Envelope<ProcurementRecommendation>> {
    let service = ProcurementService::from_state(&state);
    Ok(ok(service.get(id).await?))
}

pub async fn update_recommendation_status(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateStatusInput>,
) -> AppResult<Envelope<ProcurementRecommendation>> {
    let service = ProcurementService::from_state(&state);
    Ok(ok(service.update_status(id, input).await?))
}
