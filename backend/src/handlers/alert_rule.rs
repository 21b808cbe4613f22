//! HTTP handlers for inventory alert rules

use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use super::extract::{AppJson, AppPath, AppQuery};
use super::{created, ok, Envelope};
use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::alert_rule::{AlertRule, AlertRuleFilter, CreateAlertRuleInput, CreatedRule};
use crate::services::AlertRuleService;
use crate::AppState;

/// Create a rule, superseding the variant's active rule
pub async fn create_alert_rule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<CreateAlertRuleInput>,
) -> AppResult<(StatusCode, Envelope<CreatedRule>)> {
    let service = AlertRuleService::from_state(&state);
    let rule = service.create(user.user_id, input).await?;
    Ok(created(rule))
}

pub async fn list_alert_rules(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(filter): AppQuery<AlertRuleFilter>,
) -> AppResult<Envelope<Vec<AlertRule>>> {
    let service = AlertRuleService::from_state(&state);
    Ok(ok(service.list(filter).await?))
}

/// Deactivate a rule (privileged)
pub async fn deactivate_alert_rule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(rule_id): AppPath<Uuid>,
) -> AppResult<Envelope<AlertRule>> {
    check_permission(&user, "alert_rules", "manage")?;
    let service = AlertRuleService::from_state(&state);
    Ok(ok(service.deactivate(rule_id).await?))
}
