//! Subprocess links and variant selections of production lots

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    evaluate_link_readiness, validate_selection_set, ProposedSelection, ReadinessReport,
    SubprocessStatus,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::catalog::CatalogCache;
use super::inventory_alert::{InventoryAlert, InventoryAlertService};
use super::production_lot::{lock_lot, LotRow};
use super::rollup::{LotTotals, RollupService};
use crate::error::{reason, AppError, AppResult};
use crate::AppState;

/// A subprocess attached to a lot
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LotSubprocessLink {
    pub id: Uuid,
    pub production_lot_id: Uuid,
    pub subprocess_id: Uuid,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LotSubprocessLink {
    fn status(&self) -> AppResult<SubprocessStatus> {
        SubprocessStatus::parse(&self.status).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "link {} has unknown status '{}'",
                self.id,
                self.status
            ))
        })
    }
}

/// A variant chosen for a subprocess link
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VariantSelection {
    pub id: Uuid,
    pub production_lot_id: Uuid,
    pub lot_subprocess_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: Decimal,
    pub quantity_override: Option<Decimal>,
    pub notes: Option<String>,
    pub selected_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Link together with its current selections
#[derive(Debug, Clone, Serialize)]
pub struct LinkDetail {
    #[serde(flatten)]
    pub link: LotSubprocessLink,
    pub subprocess_name: String,
    pub selections: Vec<VariantSelection>,
}

const LINK_COLUMNS: &str = r#"
    id, production_lot_id, subprocess_id, status, started_at, completed_at, notes, created_at
"#;

const SELECTION_COLUMNS: &str = r#"
    id, production_lot_id, lot_subprocess_id, variant_id, quantity, quantity_override,
    notes, selected_by, created_at
"#;

#[derive(Debug, Deserialize)]
pub struct AttachSubprocessInput {
    pub subprocess_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionInput {
    pub variant_id: Uuid,
    pub quantity: Decimal,
    pub quantity_override: Option<Decimal>,
    pub notes: Option<String>,
}

/// Full replacement set; an empty list clears the link's selections
#[derive(Debug, Deserialize)]
pub struct SetSelectionsInput {
    pub selections: Vec<SelectionInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkStatusInput {
    pub status: SubprocessStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttachOutcome {
    pub link: LotSubprocessLink,
    pub totals: LotTotals,
}

#[derive(Debug, Serialize)]
pub struct SelectionChange {
    pub selections: Vec<VariantSelection>,
    pub totals: LotTotals,
    pub readiness: ReadinessReport,
    /// Alerts after re-evaluating the lot; empty if evaluation could not run
    pub alerts: Vec<InventoryAlert>,
}

/// Subprocess/variant linkage manager
#[derive(Clone)]
pub struct LinkageService {
    db: PgPool,
    catalog: Arc<CatalogCache>,
    rollup: RollupService,
    alerts: InventoryAlertService,
}

impl LinkageService {
    pub fn new(
        db: PgPool,
        catalog: Arc<CatalogCache>,
        rollup: RollupService,
        alerts: InventoryAlertService,
    ) -> Self {
        Self {
            db,
            catalog,
            rollup,
            alerts,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.catalog.clone(),
            RollupService::from_state(state),
            InventoryAlertService::from_state(state),
        )
    }

    /// Attach one subprocess of the lot's process
    pub async fn attach_subprocess(
        &self,
        lot_id: Uuid,
        input: AttachSubprocessInput,
    ) -> AppResult<AttachOutcome> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        ensure_linkage_open(&lot)?;

        self.catalog.subprocess(input.subprocess_id).await?;
        let process_steps = self.catalog.process_subprocesses(lot.process_id).await?;
        if !process_steps.contains(&input.subprocess_id) {
            return Err(AppError::conflict(
                reason::SUBPROCESS_NOT_IN_PROCESS,
                "Subprocess is not part of the lot's process",
            ));
        }

        let link = sqlx::query_as::<_, LotSubprocessLink>(&format!(
            r#"
            INSERT INTO lot_subprocesses (production_lot_id, subprocess_id, notes)
            VALUES ($1, $2, $3)
            ON CONFLICT (production_lot_id, subprocess_id) DO NOTHING
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(lot_id)
        .bind(input.subprocess_id)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::conflict(
                reason::DUPLICATE_LINK,
                "Subprocess is already attached to this lot",
            )
        })?;

        let totals = self.rollup.recalculate_locked(&mut tx, &lot).await?;
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot_id,
            subprocess_id = %input.subprocess_id,
            link_id = %link.id,
            "Subprocess attached"
        );
        Ok(AttachOutcome { link, totals })
    }

    /// Bulk attach inside the caller's transaction; existing links are kept
    pub(crate) async fn attach_many_locked(
        &self,
        conn: &mut PgConnection,
        lot_id: Uuid,
        subprocess_ids: &[Uuid],
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO lot_subprocesses (production_lot_id, subprocess_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT (production_lot_id, subprocess_id) DO NOTHING
            "#,
        )
        .bind(lot_id)
        .bind(subprocess_ids)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Replace every selection of one link atomically. `link_ref` is the link
    /// id or the subprocess id of the link.
    pub async fn set_variant_selections(
        &self,
        lot_id: Uuid,
        link_ref: Uuid,
        user_id: Uuid,
        input: SetSelectionsInput,
    ) -> AppResult<SelectionChange> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        ensure_linkage_open(&lot)?;

        let link = fetch_link(&mut tx, lot_id, link_ref).await?;
        let link_id = link.id;
        let entry = self.catalog.subprocess(link.subprocess_id).await?;

        let variant_ids: Vec<Uuid> = input.selections.iter().map(|s| s.variant_id).collect();
        let known = self.catalog.variants_by_id(&variant_ids).await?;
        if let Some((index, missing)) = variant_ids
            .iter()
            .enumerate()
            .find(|(_, id)| !known.contains_key(id))
        {
            return Err(AppError::validation(
                format!("selections[{}].variant_id", index),
                format!("Variant {} does not exist", missing),
            ));
        }

        let proposed: Vec<ProposedSelection> = input
            .selections
            .iter()
            .map(|s| ProposedSelection {
                variant_id: s.variant_id,
                quantity: s.quantity,
                quantity_override: s.quantity_override,
            })
            .collect();
        validate_selection_set(&entry.template, &proposed)?;

        sqlx::query("DELETE FROM lot_variant_selections WHERE lot_subprocess_id = $1")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        let mut selections = Vec::with_capacity(input.selections.len());
        for selection in &input.selections {
            let record = sqlx::query_as::<_, VariantSelection>(&format!(
                r#"
                INSERT INTO lot_variant_selections
                    (production_lot_id, lot_subprocess_id, variant_id, quantity,
                     quantity_override, notes, selected_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {}
                "#,
                SELECTION_COLUMNS
            ))
            .bind(lot_id)
            .bind(link_id)
            .bind(selection.variant_id)
            .bind(selection.quantity)
            .bind(selection.quantity_override)
            .bind(&selection.notes)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            selections.push(record);
        }

        let totals = self.rollup.recalculate_locked(&mut tx, &lot).await?;
        let readiness = self.readiness_locked(&mut tx, lot_id).await?;
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot_id,
            link_id = %link_id,
            count = selections.len(),
            ready = readiness.ready,
            "Variant selections replaced"
        );

        let alerts = self.alerts.evaluate_after_change(lot_id).await;
        Ok(SelectionChange {
            selections,
            totals,
            readiness,
            alerts,
        })
    }

    /// Whether every link has a complete, unambiguous selection set
    pub async fn validate_readiness(&self, lot_id: Uuid) -> AppResult<ReadinessReport> {
        let mut conn = self.db.acquire().await?;
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM production_lots WHERE id = $1)")
                .bind(lot_id)
                .fetch_one(&mut *conn)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Production lot".to_string()));
        }
        self.readiness_locked(&mut conn, lot_id).await
    }

    pub(crate) async fn readiness_locked(
        &self,
        conn: &mut PgConnection,
        lot_id: Uuid,
    ) -> AppResult<ReadinessReport> {
        let links = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT id, subprocess_id
            FROM lot_subprocesses
            WHERE production_lot_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(lot_id)
        .fetch_all(&mut *conn)
        .await?;

        let selected = sqlx::query_as::<_, (Uuid, Uuid)>(
            "SELECT lot_subprocess_id, variant_id FROM lot_variant_selections WHERE production_lot_id = $1",
        )
        .bind(lot_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_link: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (link_id, variant_id) in selected {
            by_link.entry(link_id).or_default().push(variant_id);
        }

        let mut issues = Vec::new();
        for (link_id, subprocess_id) in links {
            let entry = self.catalog.subprocess(subprocess_id).await?;
            if !entry.template.requires_selections() {
                continue;
            }
            let variants = by_link.get(&link_id).map(Vec::as_slice).unwrap_or(&[]);
            issues.extend(evaluate_link_readiness(link_id, &entry.template, variants));
        }

        Ok(ReadinessReport::from_issues(issues))
    }

    /// Links of a lot with their selections, in attachment order
    pub async fn link_details(&self, lot_id: Uuid) -> AppResult<Vec<LinkDetail>> {
        let links = sqlx::query_as::<_, LotSubprocessLink>(&format!(
            "SELECT {} FROM lot_subprocesses WHERE production_lot_id = $1 ORDER BY created_at, id",
            LINK_COLUMNS
        ))
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        let selections = sqlx::query_as::<_, VariantSelection>(&format!(
            "SELECT {} FROM lot_variant_selections WHERE production_lot_id = $1 ORDER BY created_at, id",
            SELECTION_COLUMNS
        ))
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        let mut by_link: HashMap<Uuid, Vec<VariantSelection>> = HashMap::new();
        for selection in selections {
            by_link
                .entry(selection.lot_subprocess_id)
                .or_default()
                .push(selection);
        }

        let mut details = Vec::with_capacity(links.len());
        for link in links {
            let entry = self.catalog.subprocess(link.subprocess_id).await?;
            details.push(LinkDetail {
                subprocess_name: entry.template.name.clone(),
                selections: by_link.remove(&link.id).unwrap_or_default(),
                link,
            });
        }
        Ok(details)
    }

    /// Advance the execution status of one link while the lot is running
    pub async fn update_link_status(
        &self,
        lot_id: Uuid,
        link_ref: Uuid,
        input: UpdateLinkStatusInput,
    ) -> AppResult<LotSubprocessLink> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        let lot_status = lot.status()?;
        if lot_status != shared::models::LotStatus::InProgress {
            return Err(AppError::conflict(
                reason::INVALID_LOT_STATE,
                format!(
                    "Subprocess status can only change while the lot is in_progress (lot is {})",
                    lot_status
                ),
            ));
        }

        let link = fetch_link(&mut tx, lot_id, link_ref).await?;
        let link_id = link.id;
        let from = link.status()?;
        if !from.can_transition_to(input.status) {
            return Err(AppError::conflict(
                reason::INVALID_STATE_TRANSITION,
                format!("Cannot move subprocess from {} to {}", from, input.status),
            ));
        }

        let updated = sqlx::query_as::<_, LotSubprocessLink>(&format!(
            r#"
            UPDATE lot_subprocesses
            SET status = $2,
                started_at = CASE WHEN $2 = 'in_progress' THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE completed_at END,
                notes = COALESCE($3, notes)
            WHERE id = $1
            RETURNING {}
            "#,
            LINK_COLUMNS
        ))
        .bind(link_id)
        .bind(input.status.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot_id,
            link_id = %link_id,
            from_status = %from,
            to_status = %input.status,
            "Subprocess status changed"
        );
        Ok(updated)
    }
}

fn ensure_linkage_open(lot: &LotRow) -> AppResult<()> {
    let status = lot.status()?;
    if status.accepts_linkage_changes() {
        Ok(())
    } else {
        Err(AppError::conflict(
            reason::INVALID_LOT_STATE,
            format!("Lot in status {} does not accept subprocess changes", status),
        ))
    }
}

async fn fetch_link(
    conn: &mut PgConnection,
    lot_id: Uuid,
    link_ref: Uuid,
) -> AppResult<LotSubprocessLink> {
    sqlx::query_as::<_, LotSubprocessLink>(&format!(
        "SELECT {} FROM lot_subprocesses WHERE (id = $1 OR subprocess_id = $1) AND production_lot_id = $2",
        LINK_COLUMNS
    ))
    .bind(link_ref)
    .bind(lot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Subprocess link".to_string()))
}
