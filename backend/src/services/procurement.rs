//! Procurement recommendations raised for inventory shortfalls

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    delivery_date_after, propose_purchase, ProcurementStatus, PurchaseProposal, MAX_LEAD_TIME_DAYS,
};
use shared::validation::{non_negative_rule, positive_quantity_rule, purchase_order_rule};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::alert_rule::active_rule;
use super::catalog::CatalogCache;
use super::inventory_alert::InventoryAlertService;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProcurementRecommendation {
    pub id: Uuid,
    pub production_lot_id: Uuid,
    pub variant_id: Uuid,
    pub inventory_alert_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub recommended_quantity: Decimal,
    pub required_delivery_date: NaiveDate,
    pub estimated_cost: Option<Decimal>,
    pub status: String,
    pub purchase_order_id: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_changed_at: Option<DateTime<Utc>>,
}

const RECOMMENDATION_COLUMNS: &str = r#"
    id, production_lot_id, variant_id, inventory_alert_id, supplier_id, recommended_quantity,
    required_delivery_date, estimated_cost, status, purchase_order_id, created_by,
    created_at, updated_at, status_changed_at
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecommendationInput {
    pub production_lot_id: Uuid,
    pub variant_id: Uuid,
    pub supplier_id: Option<Uuid>,
    #[validate(custom = "positive_quantity_rule")]
    pub recommended_quantity: Decimal,
    pub required_delivery_date: NaiveDate,
    #[validate(custom = "non_negative_rule")]
    pub estimated_cost: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct FromAlertInput {
    pub supplier_id: Option<Uuid>,
    #[validate(range(max = 3650, message = "Lead time must be at most 3650 days"))]
    pub lead_time_days: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusInput {
    pub procurement_status: ProcurementStatus,
    #[validate(custom = "purchase_order_rule")]
    pub purchase_order_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationFilter {
    pub production_lot_id: Option<Uuid>,
    pub status: Option<String>,
}

/// Recommendation raised from an alert, with the arithmetic behind it
#[derive(Debug, Serialize)]
pub struct AlertRecommendation {
    #[serde(flatten)]
    pub recommendation: ProcurementRecommendation,
    pub proposal: PurchaseProposal,
}

struct NewRecommendation {
    production_lot_id: Uuid,
    variant_id: Uuid,
    inventory_alert_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    recommended_quantity: Decimal,
    required_delivery_date: NaiveDate,
    estimated_cost: Option<Decimal>,
}

fn required_delivery_date(today: NaiveDate, lead_time_days: u32) -> AppResult<NaiveDate> {
    if lead_time_days > MAX_LEAD_TIME_DAYS {
        return Err(AppError::validation(
            "lead_time_days",
            "Lead time must be at most 3650 days",
        ));
    }
    delivery_date_after(today, lead_time_days)
        .ok_or_else(|| AppError::validation("lead_time_days", "Delivery date is out of range"))
}

#[derive(Clone)]
pub struct ProcurementService {
    db: PgPool,
    catalog: Arc<CatalogCache>,
    alerts: InventoryAlertService,
    default_lead_time_days: u32,
}

impl ProcurementService {
    pub fn new(
        db: PgPool,
        catalog: Arc<CatalogCache>,
        alerts: InventoryAlertService,
        default_lead_time_days: u32,
    ) -> Self {
        Self {
            db,
            catalog,
            alerts,
            default_lead_time_days,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.catalog.clone(),
            InventoryAlertService::from_state(state),
            state.config.procurement.default_lead_time_days,
        )
    }

    pub async fn recommend(
        &self,
        user_id: Uuid,
        input: CreateRecommendationInput,
    ) -> AppResult<ProcurementRecommendation> {
        input.validate()?;
        self.insert(
            user_id,
            NewRecommendation {
                production_lot_id: input.production_lot_id,
                variant_id: input.variant_id,
                inventory_alert_id: None,
                supplier_id: input.supplier_id,
                recommended_quantity: input.recommended_quantity,
                required_delivery_date: input.required_delivery_date,
                estimated_cost: input.estimated_cost,
            },
        )
        .await
    }

    /// Propose a purchase covering the alert's shortfall plus the reorder point
    pub async fn from_alert(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        input: FromAlertInput,
    ) -> AppResult<AlertRecommendation> {
        input.validate()?;
        let lead_time = input.lead_time_days.unwrap_or(self.default_lead_time_days);
        let delivery = required_delivery_date(Utc::now().date_naive(), lead_time)?;

        let alert = self.alerts.get(alert_id).await?;

        let mut conn = self.db.acquire().await?;
        let rule = active_rule(&mut conn, alert.variant_id).await?;
        drop(conn);

        let thresholds = rule.as_ref().map(|r| r.thresholds());
        let proposal = propose_purchase(
            alert.required_quantity,
            alert.available_quantity,
            thresholds.as_ref(),
        );
        if proposal.recommended_quantity <= Decimal::ZERO {
            return Err(AppError::validation(
                "recommended_quantity",
                "Alert shows no shortfall to procure",
            ));
        }

        let recommendation = self
            .insert(
                user_id,
                NewRecommendation {
                    production_lot_id: alert.production_lot_id,
                    variant_id: alert.variant_id,
                    inventory_alert_id: Some(alert.id),
                    supplier_id: input.supplier_id,
                    recommended_quantity: proposal.recommended_quantity,
                    required_delivery_date: delivery,
                    estimated_cost: None,
                },
            )
            .await?;

        Ok(AlertRecommendation {
            recommendation,
            proposal,
        })
    }

    async fn insert(
        &self,
        user_id: Uuid,
        new: NewRecommendation,
    ) -> AppResult<ProcurementRecommendation> {
        let lot_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM production_lots WHERE id = $1)")
                .bind(new.production_lot_id)
                .fetch_one(&self.db)
                .await?;
        if !lot_exists {
            return Err(AppError::NotFound("Production lot".to_string()));
        }

        if self.catalog.variant(new.variant_id).await?.is_none() {
            return Err(AppError::NotFound("Variant".to_string()));
        }

        let mut estimated_cost = new.estimated_cost;
        if let Some(supplier_id) = new.supplier_id {
            let unit_price = self.supplier_price(supplier_id, new.variant_id).await?;
            if estimated_cost.is_none() {
                estimated_cost = unit_price.map(|price| price * new.recommended_quantity);
            }
        }

        let recommendation = sqlx::query_as::<_, ProcurementRecommendation>(&format!(
            r#"
            INSERT INTO procurement_recommendations
                (production_lot_id, variant_id, inventory_alert_id, supplier_id,
                 recommended_quantity, required_delivery_date, estimated_cost, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(new.production_lot_id)
        .bind(new.variant_id)
        .bind(new.inventory_alert_id)
        .bind(new.supplier_id)
        .bind(new.recommended_quantity)
        .bind(new.required_delivery_date)
        .bind(estimated_cost)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            recommendation_id = %recommendation.id,
            lot_id = %recommendation.production_lot_id,
            variant_id = %recommendation.variant_id,
            quantity = %recommendation.recommended_quantity,
            delivery = %recommendation.required_delivery_date,
            "Procurement recommended"
        );

        Ok(recommendation)
    }

    /// Supplier's catalog price; NotFound when the supplier does not exist
    async fn supplier_price(
        &self,
        supplier_id: Uuid,
        variant_id: Uuid,
    ) -> AppResult<Option<Decimal>> {
        let row = sqlx::query_as::<_, (Option<Decimal>,)>(
            r#"
            SELECT p.unit_price
            FROM suppliers s
            LEFT JOIN supplier_variant_prices p
                ON p.supplier_id = s.id AND p.variant_id = $2
            WHERE s.id = $1
            "#,
        )
        .bind(supplier_id)
        .bind(variant_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        Ok(row.0)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ProcurementRecommendation> {
        sqlx::query_as::<_, ProcurementRecommendation>(&format!(
            "SELECT {} FROM procurement_recommendations WHERE id = $1",
            RECOMMENDATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Procurement recommendation".to_string()))
    }

    pub async fn list(
        &self,
        filter: RecommendationFilter,
    ) -> AppResult<Vec<ProcurementRecommendation>> {
        let status = match filter.status.as_deref() {
            Some(s) => Some(ProcurementStatus::parse(s).ok_or_else(|| {
                AppError::validation("status", format!("Unknown procurement status '{}'", s))
            })?),
            None => None,
        };

        let recommendations = sqlx::query_as::<_, ProcurementRecommendation>(&format!(
            r#"
            SELECT {}
            FROM procurement_recommendations
            WHERE ($1::uuid IS NULL OR production_lot_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(filter.production_lot_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        Ok(recommendations)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<ProcurementRecommendation> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let current: String =
            sqlx::query_scalar("SELECT status FROM procurement_recommendations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Procurement recommendation".to_string()))?;

        let from = ProcurementStatus::parse(&current).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("stored procurement status '{}' is unknown", current))
        })?;
        let to = from.transition(input.procurement_status, input.purchase_order_id.is_some())?;

        let recommendation = sqlx::query_as::<_, ProcurementRecommendation>(&format!(
            r#"
            UPDATE procurement_recommendations
            SET status = $2,
                purchase_order_id = COALESCE($3, purchase_order_id),
                status_changed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(input.purchase_order_id.as_deref().map(str::trim))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            recommendation_id = %id,
            from_status = %from,
            to_status = %to,
            "Procurement status changed"
        );

        Ok(recommendation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_input_parses_screaming_case() {
        let input: UpdateStatusInput = serde_json::from_value(serde_json::json!({
            "procurement_status": "ORDERED",
            "purchase_order_id": "PO-2026-118"
        }))
        .unwrap();
        assert_eq!(input.procurement_status, ProcurementStatus::Ordered);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_blank_purchase_order_rejected() {
        let input: UpdateStatusInput = serde_json::from_value(serde_json::json!({
            "procurement_status": "ORDERED",
            "purchase_order_id": "   "
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_recommendation_requires_positive_quantity() {
        let input: CreateRecommendationInput = serde_json::from_value(serde_json::json!({
            "production_lot_id": Uuid::new_v4(),
            "variant_id": Uuid::new_v4(),
            "recommended_quantity": 0,
            "required_delivery_date": "2026-11-02"
        }))
        .unwrap();
        let err: AppError = input.validate().unwrap_err().into();
        assert_eq!(err.body().field.as_deref(), Some("recommended_quantity"));
    }

    #[test]
    fn test_excessive_lead_time_rejected() {
        let input: FromAlertInput =
            serde_json::from_value(serde_json::json!({ "lead_time_days": 4_000_000_000u32 }))
                .unwrap();
        let err: AppError = input.validate().unwrap_err().into();
        assert_eq!(err.body().field.as_deref(), Some("lead_time_days"));

        let input: FromAlertInput =
            serde_json::from_value(serde_json::json!({ "lead_time_days": 14 })).unwrap();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_delivery_date_out_of_range_is_validation_error() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let err = required_delivery_date(today, u32::MAX).unwrap_err();
        assert_eq!(err.code(), shared::types::ErrorCode::ValidationError);
        assert_eq!(err.body().field.as_deref(), Some("lead_time_days"));

        assert!(required_delivery_date(NaiveDate::MAX, 1).is_err());

        assert_eq!(
            required_delivery_date(today, 7).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 24).unwrap()
        );
    }
}
