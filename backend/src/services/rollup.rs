//! Cost and quantity rollup for production lots

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{
    compute_rollup, LinkCostInput, PricedSelection, RollupInput, RollupResult, RollupWarning,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::catalog::CatalogCache;
use super::production_lot::{lock_lot, LotRow};
use crate::error::AppResult;
use crate::AppState;

/// Cached totals written back to the lot
#[derive(Debug, Clone, Serialize)]
pub struct LotTotals {
    pub production_lot_id: Uuid,
    pub total_cost: Decimal,
    pub total_quantity: Decimal,
    pub material_cost: Decimal,
    pub fixed_cost: Decimal,
    pub warnings: Vec<RollupWarning>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RollupService {
    db: PgPool,
    catalog: Arc<CatalogCache>,
    apply_yield_multipliers: bool,
}

impl RollupService {
    pub fn new(db: PgPool, catalog: Arc<CatalogCache>, apply_yield_multipliers: bool) -> Self {
        Self {
            db,
            catalog,
            apply_yield_multipliers,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.catalog.clone(),
            state.config.rollup.apply_yield_multipliers,
        )
    }

    /// Recompute and store totals in one transaction under the lot lock
    pub async fn recalculate(&self, lot_id: Uuid) -> AppResult<LotTotals> {
        let mut tx = self.db.begin().await?;
        let lot = lock_lot(&mut tx, lot_id).await?;
        let totals = self.recalculate_locked(&mut tx, &lot).await?;
        tx.commit().await?;
        Ok(totals)
    }

    /// Recompute totals for a lot whose row the caller already holds locked
    pub(crate) async fn recalculate_locked(
        &self,
        conn: &mut PgConnection,
        lot: &LotRow,
    ) -> AppResult<LotTotals> {
        let input = self.load_input(conn, lot).await?;
        let result = compute_rollup(&input);
        log_warnings(lot.id, &result);

        let calculated_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            UPDATE production_lots
            SET total_cost = $2,
                total_quantity = $3,
                cost_warnings = $4,
                totals_calculated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING totals_calculated_at
            "#,
        )
        .bind(lot.id)
        .bind(result.total_cost)
        .bind(result.total_quantity)
        .bind(sqlx::types::Json(&result.warnings))
        .fetch_one(&mut *conn)
        .await?;

        Ok(LotTotals {
            production_lot_id: lot.id,
            total_cost: result.total_cost,
            total_quantity: result.total_quantity,
            material_cost: result.material_cost,
            fixed_cost: result.fixed_cost,
            warnings: result.warnings,
            calculated_at,
        })
    }

    async fn load_input(&self, conn: &mut PgConnection, lot: &LotRow) -> AppResult<RollupInput> {
        let links = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT id, subprocess_id
            FROM lot_subprocesses
            WHERE production_lot_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(lot.id)
        .fetch_all(&mut *conn)
        .await?;

        let selections = sqlx::query_as::<_, (Uuid, Uuid, Decimal, Option<Decimal>)>(
            r#"
            SELECT lot_subprocess_id, variant_id, quantity, quantity_override
            FROM lot_variant_selections
            WHERE production_lot_id = $1
            "#,
        )
        .bind(lot.id)
        .fetch_all(&mut *conn)
        .await?;

        let variant_ids: Vec<Uuid> = selections.iter().map(|s| s.1).collect();
        let variants = self.catalog.variants_by_id(&variant_ids).await?;

        let mut by_link: HashMap<Uuid, Vec<PricedSelection>> = HashMap::new();
        for (link_id, variant_id, quantity, quantity_override) in selections {
            by_link.entry(link_id).or_default().push(PricedSelection {
                variant_id,
                quantity: quantity_override.unwrap_or(quantity),
                unit_cost: variants.get(&variant_id).and_then(|v| v.unit_cost),
            });
        }

        let mut link_inputs = Vec::with_capacity(links.len());
        for (link_id, subprocess_id) in links {
            let entry = self.catalog.subprocess(subprocess_id).await?;
            link_inputs.push(LinkCostInput {
                subprocess_id,
                yield_multiplier: entry.template.yield_multiplier,
                selections: by_link.remove(&link_id).unwrap_or_default(),
                fixed_costs: entry.fixed_costs.clone(),
            });
        }

        Ok(RollupInput {
            requested_quantity: lot.requested_quantity,
            apply_yield_multipliers: self.apply_yield_multipliers,
            links: link_inputs,
        })
    }
}

fn log_warnings(lot_id: Uuid, result: &RollupResult) {
    if result.warnings.contains(&RollupWarning::MissingPricing) {
        tracing::warn!(
            lot_id = %lot_id,
            total_cost = %result.total_cost,
            "No priced selections contribute to lot cost"
        );
    }
    for warning in result.warnings.iter().filter(|w| **w != RollupWarning::MissingPricing) {
        tracing::debug!(lot_id = %lot_id, ?warning, "Rollup input skipped");
    }
}
