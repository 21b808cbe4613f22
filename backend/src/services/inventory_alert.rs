//! Inventory alert engine
//!
//! Evaluates required quantities of a lot against on-hand stock and keeps at
//! most one active (unacknowledged, unresolved) alert per (lot, variant).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    classify_severity, plan_alert_write, AlertSeverity, AlertWrite, Availability, UserAction,
};
use shared::types::{BulkItemResult, BulkOutcome};
use shared::validation::positive_quantity_rule;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::alert_rule::active_rule;
use super::catalog::CatalogCache;
use crate::error::{reason, AppError, AppResult};
use crate::external::StockLookup;
use crate::AppState;

/// Stored inventory alert
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryAlert {
    pub id: Uuid,
    pub production_lot_id: Uuid,
    pub variant_id: Uuid,
    pub alert_rule_id: Option<Uuid>,
    pub required_quantity: Decimal,
    pub available_quantity: Decimal,
    pub availability_known: bool,
    pub severity: String,
    pub source: String,
    pub user_acknowledged: bool,
    pub user_action: Option<String>,
    pub action_notes: Option<String>,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub evaluated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl InventoryAlert {
    pub fn is_active(&self) -> bool {
        !self.user_acknowledged && self.resolved_at.is_none()
    }
}

const ALERT_COLUMNS: &str = r#"
    id, production_lot_id, variant_id, alert_rule_id, required_quantity, available_quantity,
    availability_known, severity, source, user_acknowledged, user_action, action_notes,
    acknowledged_by, acknowledged_at, resolved_at, evaluated_at, created_at
"#;

/// What triggered an alert write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSource {
    Evaluation,
    Manual,
}

impl AlertSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSource::Evaluation => "evaluation",
            AlertSource::Manual => "manual",
        }
    }
}

/// Storage effect of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertWriteKind {
    Inserted,
    Refreshed,
    Resolved,
    Unchanged,
}

/// Result of evaluating one (lot, variant) pair
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvaluation {
    pub production_lot_id: Uuid,
    pub variant_id: Uuid,
    pub required_quantity: Decimal,
    pub available_quantity: Decimal,
    pub availability_known: bool,
    pub severity: AlertSeverity,
    pub write: AlertWriteKind,
    pub alert: Option<InventoryAlert>,
}

#[derive(Debug, Serialize)]
pub struct LotEvaluation {
    pub production_lot_id: Uuid,
    pub evaluations: Vec<AlertEvaluation>,
    /// Active alerts closed because their variant is no longer selected
    pub stale_resolved: u64,
}

impl LotEvaluation {
    pub fn active_alerts(&self) -> Vec<InventoryAlert> {
        self.evaluations
            .iter()
            .filter_map(|e| e.alert.clone())
            .filter(InventoryAlert::is_active)
            .collect()
    }
}

/// Manual alert request; classified like any evaluation
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAlertInput {
    pub production_lot_id: Uuid,
    pub variant_id: Uuid,
    #[validate(custom = "positive_quantity_rule")]
    pub required_quantity: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeInput {
    pub user_action: Option<UserAction>,
    pub action_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgmentItem {
    pub alert_id: Uuid,
    pub user_action: Option<UserAction>,
    pub action_notes: Option<String>,
}

/// Either plain ids (sharing the top-level action) or per-alert acknowledgments
#[derive(Debug, Default, Deserialize)]
pub struct BulkAcknowledgeInput {
    #[serde(default)]
    pub alert_ids: Vec<Uuid>,
    #[serde(default)]
    pub acknowledgments: Vec<AcknowledgmentItem>,
    pub user_action: Option<UserAction>,
    pub action_notes: Option<String>,
}

impl BulkAcknowledgeInput {
    fn into_items(self) -> Vec<(Uuid, AcknowledgeInput)> {
        let shared_action = self.user_action;
        let shared_notes = self.action_notes;
        self.alert_ids
            .into_iter()
            .map(|id| {
                (
                    id,
                    AcknowledgeInput {
                        user_action: shared_action,
                        action_notes: shared_notes.clone(),
                    },
                )
            })
            .chain(self.acknowledgments.into_iter().map(|item| {
                (
                    item.alert_id,
                    AcknowledgeInput {
                        user_action: item.user_action,
                        action_notes: item.action_notes,
                    },
                )
            }))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    pub production_lot_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub severity: Option<String>,
    pub acknowledged: Option<bool>,
    #[serde(default)]
    pub include_resolved: bool,
}

/// Inventory alert service
#[derive(Clone)]
pub struct InventoryAlertService {
    db: PgPool,
    stock: StockLookup,
    catalog: Arc<CatalogCache>,
}

impl InventoryAlertService {
    pub fn new(db: PgPool, stock: StockLookup, catalog: Arc<CatalogCache>) -> Self {
        Self { db, stock, catalog }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.db.clone(), state.stock.clone(), state.catalog.clone())
    }

    /// Evaluate every selected variant of a lot, re-reading the current selections
    pub async fn evaluate_lot(&self, lot_id: Uuid) -> AppResult<LotEvaluation> {
        ensure_lot_exists(&self.db, lot_id).await?;

        let requirements = sqlx::query_as::<_, (Uuid, Decimal)>(
            r#"
            SELECT variant_id, SUM(COALESCE(quantity_override, quantity))
            FROM lot_variant_selections
            WHERE production_lot_id = $1
            GROUP BY variant_id
            ORDER BY variant_id
            "#,
        )
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        let mut evaluations = Vec::with_capacity(requirements.len());
        for (variant_id, required) in &requirements {
            let evaluation = self
                .evaluate_pair(lot_id, *variant_id, *required, AlertSource::Evaluation)
                .await?;
            evaluations.push(evaluation);
        }

        let selected: Vec<Uuid> = requirements.iter().map(|(id, _)| *id).collect();
        let stale_resolved = sqlx::query(
            r#"
            UPDATE inventory_alerts
            SET resolved_at = NOW()
            WHERE production_lot_id = $1
              AND source = 'evaluation'
              AND NOT user_acknowledged
              AND resolved_at IS NULL
              AND NOT (variant_id = ANY($2))
            "#,
        )
        .bind(lot_id)
        .bind(&selected)
        .execute(&self.db)
        .await?
        .rows_affected();

        if stale_resolved > 0 {
            tracing::info!(lot_id = %lot_id, stale_resolved, "Resolved alerts for deselected variants");
        }

        Ok(LotEvaluation {
            production_lot_id: lot_id,
            evaluations,
            stale_resolved,
        })
    }

    /// Evaluation triggered by a committed change; failures are logged and
    /// left for the scheduler to retry
    pub async fn evaluate_after_change(&self, lot_id: Uuid) -> Vec<InventoryAlert> {
        match self.evaluate_lot(lot_id).await {
            Ok(evaluation) => evaluation.active_alerts(),
            Err(e) => {
                tracing::warn!(lot_id = %lot_id, error = %e, "Alert evaluation after change failed");
                Vec::new()
            }
        }
    }

    /// Classify one requirement and upsert, refresh or resolve its active alert
    pub async fn evaluate_pair(
        &self,
        lot_id: Uuid,
        variant_id: Uuid,
        required: Decimal,
        source: AlertSource,
    ) -> AppResult<AlertEvaluation> {
        let availability = self.stock.availability(variant_id).await;
        let available = availability.effective();

        let mut tx = self.db.begin().await?;
        let rule = active_rule(&mut tx, variant_id).await?;
        let thresholds = rule.as_ref().map(|r| r.thresholds());
        let severity = classify_severity(required, availability, thresholds.as_ref());

        let active: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM inventory_alerts
            WHERE production_lot_id = $1 AND variant_id = $2
              AND NOT user_acknowledged AND resolved_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(lot_id)
        .bind(variant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (write, alert) = match plan_alert_write(active, severity) {
            AlertWrite::Insert => {
                let alert = sqlx::query_as::<_, InventoryAlert>(&format!(
                    r#"
                    INSERT INTO inventory_alerts
                        (production_lot_id, variant_id, alert_rule_id, required_quantity,
                         available_quantity, availability_known, severity, source)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (production_lot_id, variant_id)
                        WHERE NOT user_acknowledged AND resolved_at IS NULL
                    DO UPDATE SET
                        alert_rule_id = EXCLUDED.alert_rule_id,
                        required_quantity = EXCLUDED.required_quantity,
                        available_quantity = EXCLUDED.available_quantity,
                        availability_known = EXCLUDED.availability_known,
                        severity = EXCLUDED.severity,
                        evaluated_at = NOW()
                    RETURNING {}
                    "#,
                    ALERT_COLUMNS
                ))
                .bind(lot_id)
                .bind(variant_id)
                .bind(rule.as_ref().map(|r| r.id))
                .bind(required)
                .bind(available)
                .bind(availability.is_known())
                .bind(severity.as_str())
                .bind(source.as_str())
                .fetch_one(&mut *tx)
                .await?;
                (AlertWriteKind::Inserted, Some(alert))
            }
            AlertWrite::Refresh { alert_id } => {
                let alert = sqlx::query_as::<_, InventoryAlert>(&format!(
                    r#"
                    UPDATE inventory_alerts
                    SET alert_rule_id = $2,
                        required_quantity = $3,
                        available_quantity = $4,
                        availability_known = $5,
                        severity = $6,
                        evaluated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ALERT_COLUMNS
                ))
                .bind(alert_id)
                .bind(rule.as_ref().map(|r| r.id))
                .bind(required)
                .bind(available)
                .bind(availability.is_known())
                .bind(severity.as_str())
                .fetch_one(&mut *tx)
                .await?;
                (AlertWriteKind::Refreshed, Some(alert))
            }
            AlertWrite::Resolve { alert_id } => {
                let alert = sqlx::query_as::<_, InventoryAlert>(&format!(
                    r#"
                    UPDATE inventory_alerts
                    SET resolved_at = NOW(), evaluated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ALERT_COLUMNS
                ))
                .bind(alert_id)
                .fetch_one(&mut *tx)
                .await?;
                (AlertWriteKind::Resolved, Some(alert))
            }
            AlertWrite::Noop => (AlertWriteKind::Unchanged, None),
        };

        tx.commit().await?;

        if severity.requires_alert() {
            tracing::info!(
                lot_id = %lot_id,
                variant_id = %variant_id,
                required = %required,
                available = %available,
                availability_known = availability.is_known(),
                safety_stock = ?thresholds.map(|t| t.safety_stock_quantity),
                reorder_point = ?thresholds.map(|t| t.reorder_point_quantity),
                severity = %severity,
                write = ?write,
                "Inventory shortfall evaluated"
            );
        } else {
            tracing::debug!(
                lot_id = %lot_id,
                variant_id = %variant_id,
                write = ?write,
                "Stock sufficient"
            );
        }

        Ok(AlertEvaluation {
            production_lot_id: lot_id,
            variant_id,
            required_quantity: required,
            available_quantity: available,
            availability_known: matches!(availability, Availability::Known(_)),
            severity,
            write,
            alert,
        })
    }

    /// Evaluate a single pair on request
    pub async fn create_alert(&self, input: CreateAlertInput) -> AppResult<AlertEvaluation> {
        input.validate()?;
        ensure_lot_exists(&self.db, input.production_lot_id).await?;
        if self.catalog.variant(input.variant_id).await?.is_none() {
            return Err(AppError::NotFound("Variant".to_string()));
        }
        self.evaluate_pair(
            input.production_lot_id,
            input.variant_id,
            input.required_quantity,
            AlertSource::Manual,
        )
        .await
    }

    pub async fn get(&self, alert_id: Uuid) -> AppResult<InventoryAlert> {
        sqlx::query_as::<_, InventoryAlert>(&format!(
            "SELECT {} FROM inventory_alerts WHERE id = $1",
            ALERT_COLUMNS
        ))
        .bind(alert_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory alert".to_string()))
    }

    pub async fn list(&self, filter: AlertFilter) -> AppResult<Vec<InventoryAlert>> {
        let severity = match filter.severity.as_deref() {
            Some(s) => Some(AlertSeverity::parse(s).ok_or_else(|| {
                AppError::validation("severity", format!("Unknown severity '{}'", s))
            })?),
            None => None,
        };

        let alerts = sqlx::query_as::<_, InventoryAlert>(&format!(
            r#"
            SELECT {}
            FROM inventory_alerts
            WHERE ($1::uuid IS NULL OR production_lot_id = $1)
              AND ($2::uuid IS NULL OR variant_id = $2)
              AND ($3::varchar IS NULL OR severity = $3)
              AND ($4::boolean IS NULL OR user_acknowledged = $4)
              AND ($5 OR resolved_at IS NULL)
            ORDER BY created_at DESC
            "#,
            ALERT_COLUMNS
        ))
        .bind(filter.production_lot_id)
        .bind(filter.variant_id)
        .bind(severity.map(|s| s.as_str()))
        .bind(filter.acknowledged)
        .bind(filter.include_resolved)
        .fetch_all(&self.db)
        .await?;

        Ok(alerts)
    }

    /// Acknowledge one alert; other alerts and procurement are untouched
    pub async fn acknowledge(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        input: AcknowledgeInput,
    ) -> AppResult<InventoryAlert> {
        let mut tx = self.db.begin().await?;

        let acknowledged: bool = sqlx::query_scalar(
            "SELECT user_acknowledged FROM inventory_alerts WHERE id = $1 FOR UPDATE",
        )
        .bind(alert_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory alert".to_string()))?;

        if acknowledged {
            return Err(AppError::conflict(
                reason::ALREADY_ACKNOWLEDGED,
                "Alert has already been acknowledged",
            ));
        }

        let alert = sqlx::query_as::<_, InventoryAlert>(&format!(
            r#"
            UPDATE inventory_alerts
            SET user_acknowledged = TRUE,
                user_action = $2,
                action_notes = $3,
                acknowledged_by = $4,
                acknowledged_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert_id)
        .bind(input.user_action.map(|a| a.as_str()))
        .bind(&input.action_notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            alert_id = %alert_id,
            lot_id = %alert.production_lot_id,
            variant_id = %alert.variant_id,
            severity = %alert.severity,
            user_action = ?input.user_action,
            "Inventory alert acknowledged"
        );
        Ok(alert)
    }

    /// Acknowledge each alert independently and report per-id outcomes
    pub async fn bulk_acknowledge(
        &self,
        user_id: Uuid,
        input: BulkAcknowledgeInput,
    ) -> AppResult<BulkOutcome> {
        let items = input.into_items();
        if items.is_empty() {
            return Err(AppError::validation(
                "alert_ids",
                "Provide alert_ids or acknowledgments",
            ));
        }

        let mut results = Vec::with_capacity(items.len());
        for (alert_id, ack) in items {
            let result = match self.acknowledge(alert_id, user_id, ack).await {
                Ok(_) => BulkItemResult {
                    id: alert_id,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(alert_id = %alert_id, error = %e, "Bulk acknowledgment item failed");
                    BulkItemResult {
                        id: alert_id,
                        success: false,
                        error: Some(e.body()),
                    }
                }
            };
            results.push(result);
        }

        Ok(BulkOutcome::from_results(results))
    }

    /// Unacknowledged, unresolved CRITICAL alerts of a lot
    pub(crate) async fn count_outstanding_critical(
        conn: &mut PgConnection,
        lot_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM inventory_alerts
            WHERE production_lot_id = $1
              AND severity = 'CRITICAL'
              AND NOT user_acknowledged
              AND resolved_at IS NULL
            "#,
        )
        .bind(lot_id)
        .fetch_one(&mut *conn)
        .await
    }
}

async fn ensure_lot_exists(db: &PgPool, lot_id: Uuid) -> AppResult<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM production_lots WHERE id = $1)")
            .bind(lot_id)
            .fetch_one(db)
            .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Production lot".to_string()))
    }
}
