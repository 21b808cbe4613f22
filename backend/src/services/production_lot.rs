//! Production lot lifecycle: creation, state transitions and deletion
//!
//! Every transition runs in one transaction holding the lot row lock, so
//! selection replacement and recalculation for the same lot serialize behind
//! it while other lots proceed independently.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    check_closure, generate_lot_number, ClosureCheck, LotStatus, LotTransition, ProductionLot,
    ReadinessReport, RollupWarning, SubprocessStatus,
};
use shared::validation::{lot_number_rule, positive_quantity_rule};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::catalog::CatalogCache;
use super::inventory_alert::{InventoryAlert, InventoryAlertService};
use super::linkage::{LinkDetail, LinkageService};
use super::rollup::{LotTotals, RollupService};
use crate::error::{is_unique_violation, reason, AppError, AppResult};
use crate::AppState;

/// Production lot row as stored
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LotRow {
    pub id: Uuid,
    pub process_id: Uuid,
    pub lot_number: String,
    pub requested_quantity: Decimal,
    pub status: String,
    pub total_cost: Decimal,
    pub total_quantity: Decimal,
    pub cost_warnings: sqlx::types::Json<Vec<RollupWarning>>,
    pub totals_calculated_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LotRow {
    pub fn status(&self) -> AppResult<LotStatus> {
        LotStatus::parse(&self.status).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "lot {} has unknown status '{}'",
                self.id,
                self.status
            ))
        })
    }

    pub fn to_model(&self) -> AppResult<ProductionLot> {
        Ok(ProductionLot {
            id: self.id,
            process_id: self.process_id,
            lot_number: self.lot_number.clone(),
            requested_quantity: self.requested_quantity,
            status: self.status()?,
            total_cost: self.total_cost,
            total_quantity: self.total_quantity,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const LOT_COLUMNS: &str = r#"
    id, process_id, lot_number, requested_quantity, status, total_cost, total_quantity,
    cost_warnings, totals_calculated_at, notes, created_by, created_at, updated_at
"#;

/// Lock a lot row for the rest of the transaction
pub(crate) async fn lock_lot(conn: &mut PgConnection, lot_id: Uuid) -> AppResult<LotRow> {
    sqlx::query_as::<_, LotRow>(&format!(
        "SELECT {} FROM production_lots WHERE id = $1 FOR UPDATE",
        LOT_COLUMNS
    ))
    .bind(lot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Production lot".to_string()))
}

/// Entry of the lot status history
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusChange {
    pub id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub changed_by: Uuid,
    pub reason: Option<String>,
    pub override_applied: bool,
    pub changed_at: DateTime<Utc>,
}

/// Lot with its subprocess links, selections and history
#[derive(Debug, Serialize)]
pub struct LotDetail {
    #[serde(flatten)]
    pub lot: ProductionLot,
    pub notes: Option<String>,
    pub cost_warnings: Vec<RollupWarning>,
    pub totals_calculated_at: Option<DateTime<Utc>>,
    pub subprocesses: Vec<LinkDetail>,
    pub status_history: Vec<StatusChange>,
}

/// Result of a state transition
#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub lot: ProductionLot,
    pub previous_status: LotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<LotTotals>,
    pub override_applied: bool,
}

fn default_true() -> bool {
    true
}

/// Input for creating a production lot
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductionLotInput {
    pub process_id: Uuid,
    #[validate(custom = "positive_quantity_rule")]
    pub requested_quantity: Decimal,
    /// Generated when absent
    #[validate(custom = "lot_number_rule")]
    pub lot_number: Option<String>,
    #[serde(default = "default_true")]
    pub auto_link_subprocesses: bool,
    pub notes: Option<String>,
}

/// Creation result, including the alerts raised by the initial evaluation
#[derive(Debug, Serialize)]
pub struct CreatedLot {
    #[serde(flatten)]
    pub detail: LotDetail,
    pub alerts: Vec<InventoryAlert>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductionLotFilter {
    pub status: Option<String>,
    pub process_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteLotInput {
    #[serde(default)]
    pub override_critical_alerts: bool,
    pub override_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransitionNote {
    pub reason: Option<String>,
}

/// Refuse deletion unless the link check ran and found no links
pub(crate) fn guard_lot_deletion(
    link_count: Result<i64, sqlx::Error>,
    lot_id: Uuid,
) -> AppResult<()> {
    match link_count {
        Err(e) => {
            tracing::error!(lot_id = %lot_id, error = %e, "Link check failed, refusing deletion");
            Err(AppError::PreconditionUnavailable(
                "Could not verify that the lot has no subprocesses".to_string(),
            ))
        }
        Ok(count) if count > 0 => Err(AppError::conflict(
            reason::LOT_HAS_SUBPROCESSES,
            format!("Lot has {} attached subprocess(es) and cannot be deleted", count),
        )),
        Ok(_) => Ok(()),
    }
}

/// Refuse a transition unless the lot has links and every link's selections are complete
pub(crate) fn require_readiness(
    lot_id: Uuid,
    transition: LotTransition,
    link_count: i64,
    report: &ReadinessReport,
) -> AppResult<()> {
    if link_count == 0 {
        return Err(AppError::conflict(
            reason::LOT_NOT_READY,
            "Lot has no subprocesses attached",
        ));
    }
    if report.ready {
        return Ok(());
    }

    tracing::info!(
        lot_id = %lot_id,
        transition = %transition,
        issues = report.issues.len(),
        "Transition refused: selections incomplete"
    );
    let summary = report
        .issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::conflict(reason::LOT_NOT_READY, summary))
}

/// Decide the critical-alert gate on execute. Returns whether an override
/// was applied. A failed evaluation or count refuses the transition.
pub(crate) fn gate_critical_alerts(
    lot_id: Uuid,
    evaluation: AppResult<()>,
    critical: Result<i64, sqlx::Error>,
    override_requested: bool,
) -> AppResult<bool> {
    if let Err(e) = evaluation {
        tracing::error!(lot_id = %lot_id, error = %e, "Alert evaluation before execute failed");
        return Err(AppError::PreconditionUnavailable(
            "Could not evaluate inventory alerts for the lot".to_string(),
        ));
    }
    let critical = match critical {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(lot_id = %lot_id, error = %e, "Critical alert check failed");
            return Err(AppError::PreconditionUnavailable(
                "Could not verify outstanding critical alerts".to_string(),
            ));
        }
    };

    if critical == 0 {
        return Ok(false);
    }
    if !override_requested {
        tracing::info!(
            lot_id = %lot_id,
            critical,
            "Execute refused: unacknowledged critical alerts"
        );
        return Err(AppError::conflict(
            reason::CRITICAL_ALERTS_OUTSTANDING,
            format!(
                "Lot has {} unacknowledged critical inventory alert(s)",
                critical
            ),
        ));
    }
    Ok(true)
}

/// Production lot service
#[derive(Clone)]
pub struct ProductionLotService {
    db: PgPool,
    catalog: Arc<CatalogCache>,
    rollup: RollupService,
    linkage: LinkageService,
    alerts: InventoryAlertService,
}

impl ProductionLotService {
    pub fn new(
        db: PgPool,
        catalog: Arc<CatalogCache>,
        rollup: RollupService,
        linkage: LinkageService,
        alerts: InventoryAlertService,
    ) -> Self {
        Self {
            db,
            catalog,
            rollup,
            linkage,
            alerts,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.catalog.clone(),
            RollupService::from_state(state),
            LinkageService::from_state(state),
            InventoryAlertService::from_state(state),
        )
    }

    /// Create a lot in Planning, optionally linking every subprocess of its process
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateProductionLotInput,
    ) -> AppResult<CreatedLot> {
        input.validate()?;

        let subprocess_ids = self.catalog.process_subprocesses(input.process_id).await?;

        let mut tx = self.db.begin().await?;

        let lot_number = match input.lot_number {
            Some(number) => number,
            None => {
                let sequence: i64 = sqlx::query_scalar("SELECT nextval('production_lot_number_seq')")
                    .fetch_one(&mut *tx)
                    .await?;
                generate_lot_number(Utc::now().year(), sequence)
            }
        };

        let lot = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            INSERT INTO production_lots (process_id, lot_number, requested_quantity, notes, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LOT_COLUMNS
        ))
        .bind(input.process_id)
        .bind(&lot_number)
        .bind(input.requested_quantity)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(
                    reason::DUPLICATE_ENTRY,
                    format!("Lot number {} already exists", lot_number),
                )
            } else {
                AppError::from(e)
            }
        })?;

        record_status_change(&mut tx, lot.id, None, LotStatus::Planning, user_id, None, false)
            .await?;

        if input.auto_link_subprocesses && !subprocess_ids.is_empty() {
            let linked = self
                .linkage
                .attach_many_locked(&mut tx, lot.id, &subprocess_ids)
                .await?;
            tracing::debug!(lot_id = %lot.id, linked, "Auto-linked process subprocesses");
        }

        self.rollup.recalculate_locked(&mut tx, &lot).await?;

        tx.commit().await?;

        tracing::info!(lot_id = %lot.id, lot_number = %lot_number, "Production lot created");

        let alerts = self.alerts.evaluate_after_change(lot.id).await;
        let detail = self.get(lot.id).await?;
        Ok(CreatedLot { detail, alerts })
    }

    pub async fn list(&self, filter: ProductionLotFilter) -> AppResult<Vec<ProductionLot>> {
        let status = match filter.status.as_deref() {
            Some(s) => Some(
                LotStatus::parse(s)
                    .ok_or_else(|| AppError::validation("status", format!("Unknown lot status '{}'", s)))?,
            ),
            None => None,
        };

        let rows = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            SELECT {}
            FROM production_lots
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR process_id = $2)
            ORDER BY created_at DESC
            "#,
            LOT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(filter.process_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(LotRow::to_model).collect()
    }

    pub async fn get(&self, lot_id: Uuid) -> AppResult<LotDetail> {
        let lot = sqlx::query_as::<_, LotRow>(&format!(
            "SELECT {} FROM production_lots WHERE id = $1",
            LOT_COLUMNS
        ))
        .bind(lot_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production lot".to_string()))?;

        let subprocesses = self.linkage.link_details(lot_id).await?;

        let status_history = sqlx::query_as::<_, StatusChange>(
            r#"
            SELECT id, from_status, to_status, changed_by, reason, override_applied, changed_at
            FROM production_lot_status_history
            WHERE production_lot_id = $1
            ORDER BY changed_at, id
            "#,
        )
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        Ok(LotDetail {
            lot: lot.to_model()?,
            notes: lot.notes.clone(),
            cost_warnings: lot.cost_warnings.0.clone(),
            totals_calculated_at: lot.totals_calculated_at,
            subprocesses,
            status_history,
        })
    }

    async fn require_ready(
        &self,
        conn: &mut PgConnection,
        lot_id: Uuid,
        transition: LotTransition,
    ) -> AppResult<()> {
        let link_count = count_links(conn, lot_id).await?;
        let report = self.linkage.readiness_locked(conn, lot_id).await?;
        require_readiness(lot_id, transition, link_count, &report)
    }

    pub async fn readiness(&self, lot_id: Uuid) -> AppResult<ReadinessReport> {
        self.linkage.validate_readiness(lot_id).await
    }

    /// Planning -> Ready once every link has a complete selection set
    pub async fn finalize(&self, lot_id: Uuid, user_id: Uuid) -> AppResult<TransitionOutcome> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        let from = lot.status()?;
        let to = from.apply(LotTransition::Finalize)?;

        self.require_ready(&mut tx, lot_id, LotTransition::Finalize).await?;

        let totals = self.rollup.recalculate_locked(&mut tx, &lot).await?;
        let lot = set_status(&mut tx, &lot, from, to, user_id, None, false).await?;
        tx.commit().await?;

        Ok(TransitionOutcome {
            lot: lot.to_model()?,
            previous_status: from,
            totals: Some(totals),
            override_applied: false,
        })
    }

    /// Ready -> InProgress when selections are still complete and no
    /// unacknowledged CRITICAL alerts remain after a fresh evaluation
    pub async fn execute(
        &self,
        lot_id: Uuid,
        user_id: Uuid,
        input: ExecuteLotInput,
    ) -> AppResult<TransitionOutcome> {
        let override_reason = input
            .override_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if input.override_critical_alerts && override_reason.is_none() {
            return Err(AppError::validation(
                "override_reason",
                "A reason is required when overriding critical alerts",
            ));
        }

        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        let from = lot.status()?;
        let to = from.apply(LotTransition::Execute)?;

        // Selections may have changed since finalize
        self.require_ready(&mut tx, lot_id, LotTransition::Execute).await?;

        // The lot lock holds selection writers off until commit, so this
        // evaluation reflects what will run
        let evaluation = self.alerts.evaluate_lot(lot_id).await.map(|_| ());
        let critical = InventoryAlertService::count_outstanding_critical(&mut tx, lot_id).await;
        let override_applied = gate_critical_alerts(
            lot_id,
            evaluation,
            critical,
            input.override_critical_alerts,
        )?;
        if override_applied {
            tracing::warn!(
                lot_id = %lot_id,
                user_id = %user_id,
                "Critical alerts overridden on execute"
            );
        }

        let reason = if override_applied { override_reason } else { None };
        let lot = set_status(&mut tx, &lot, from, to, user_id, reason, override_applied).await?;
        tx.commit().await?;

        Ok(TransitionOutcome {
            lot: lot.to_model()?,
            previous_status: from,
            totals: None,
            override_applied,
        })
    }

    /// InProgress -> Completed (all links completed) or Failed (some link failed)
    pub async fn close(
        &self,
        lot_id: Uuid,
        user_id: Uuid,
        transition: LotTransition,
        note: TransitionNote,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        let from = lot.status()?;
        let to = from.apply(transition)?;

        let statuses: Vec<String> = sqlx::query_scalar(
            "SELECT status FROM lot_subprocesses WHERE production_lot_id = $1",
        )
        .bind(lot_id)
        .fetch_all(&mut *tx)
        .await?;
        let statuses = statuses
            .iter()
            .map(|s| {
                SubprocessStatus::parse(s).ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!("unknown subprocess status '{}'", s))
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let refusal = match check_closure(transition, &statuses) {
            ClosureCheck::Allowed => None,
            ClosureCheck::NoSubprocesses => Some("Lot has no subprocesses".to_string()),
            ClosureCheck::Incomplete { pending } => Some(format!(
                "{} subprocess(es) are not completed",
                pending
            )),
            ClosureCheck::NoFailures => {
                Some("No subprocess has failed; the lot cannot be failed".to_string())
            }
        };
        if let Some(message) = refusal {
            tracing::info!(
                lot_id = %lot_id,
                from_status = %from,
                to_status = %to,
                "{}",
                message
            );
            return Err(AppError::conflict(reason::INVALID_STATE_TRANSITION, message));
        }

        let lot = set_status(&mut tx, &lot, from, to, user_id, note.reason, false).await?;
        tx.commit().await?;

        Ok(TransitionOutcome {
            lot: lot.to_model()?,
            previous_status: from,
            totals: None,
            override_applied: false,
        })
    }

    /// Planning | Ready -> Cancelled
    pub async fn cancel(
        &self,
        lot_id: Uuid,
        user_id: Uuid,
        note: TransitionNote,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        let from = lot.status()?;
        let to = from.apply(LotTransition::Cancel)?;
        let lot = set_status(&mut tx, &lot, from, to, user_id, note.reason, false).await?;
        tx.commit().await?;

        Ok(TransitionOutcome {
            lot: lot.to_model()?,
            previous_status: from,
            totals: None,
            override_applied: false,
        })
    }

    /// Delete a lot that has no subprocess links. Alerts and recommendations
    /// referencing it are kept.
    pub async fn delete(&self, lot_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        lock_lot(&mut tx, lot_id).await?;

        let link_count = count_links(&mut tx, lot_id).await;
        guard_lot_deletion(link_count, lot_id)?;

        sqlx::query("DELETE FROM production_lots WHERE id = $1")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(lot_id = %lot_id, "Production lot deleted");
        Ok(())
    }
}

async fn count_links(conn: &mut PgConnection, lot_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM lot_subprocesses WHERE production_lot_id = $1")
        .bind(lot_id)
        .fetch_one(&mut *conn)
        .await
}

async fn set_status(
    conn: &mut PgConnection,
    lot: &LotRow,
    from: LotStatus,
    to: LotStatus,
    actor: Uuid,
    reason: Option<String>,
    override_applied: bool,
) -> AppResult<LotRow> {
    let updated = sqlx::query_as::<_, LotRow>(&format!(
        r#"
        UPDATE production_lots
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        LOT_COLUMNS
    ))
    .bind(lot.id)
    .bind(to.as_str())
    .fetch_one(&mut *conn)
    .await?;

    record_status_change(conn, lot.id, Some(from), to, actor, reason, override_applied).await?;

    tracing::info!(
        lot_id = %lot.id,
        from_status = %from,
        to_status = %to,
        override_applied,
        "Lot status changed"
    );
    Ok(updated)
}

async fn record_status_change(
    conn: &mut PgConnection,
    lot_id: Uuid,
    from: Option<LotStatus>,
    to: LotStatus,
    actor: Uuid,
    reason: Option<String>,
    override_applied: bool,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO production_lot_status_history
            (production_lot_id, from_status, to_status, changed_by, reason, override_applied)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(lot_id)
    .bind(from.map(|s| s.as_str()))
    .bind(to.as_str())
    .bind(actor)
    .bind(reason)
    .bind(override_applied)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
