//! Inventory alert rules per variant

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::AlertThresholds;
use shared::validation::{non_negative_rule, percentage_rule};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::catalog::CatalogCache;
use crate::error::{is_unique_violation, reason, AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlertRule {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub safety_stock_quantity: Decimal,
    pub reorder_point_quantity: Decimal,
    pub alert_threshold_percentage: Decimal,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            safety_stock_quantity: self.safety_stock_quantity,
            reorder_point_quantity: self.reorder_point_quantity,
            alert_threshold_percentage: self.alert_threshold_percentage,
        }
    }
}

const RULE_COLUMNS: &str = r#"
    id, variant_id, safety_stock_quantity, reorder_point_quantity,
    alert_threshold_percentage, is_active, created_by, created_at, updated_at
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAlertRuleInput {
    pub variant_id: Uuid,
    #[serde(default)]
    #[validate(custom = "non_negative_rule")]
    pub safety_stock_quantity: Decimal,
    #[serde(default)]
    #[validate(custom = "non_negative_rule")]
    pub reorder_point_quantity: Decimal,
    #[serde(default)]
    #[validate(custom = "percentage_rule")]
    pub alert_threshold_percentage: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertRuleFilter {
    #[serde(default)]
    pub active_only: bool,
    pub variant_id: Option<Uuid>,
}

/// Rule created together with the rule it replaced, if any
#[derive(Debug, Serialize)]
pub struct CreatedRule {
    #[serde(flatten)]
    pub rule: AlertRule,
    pub superseded_rule_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct AlertRuleService {
    db: PgPool,
    catalog: Arc<CatalogCache>,
}

impl AlertRuleService {
    pub fn new(db: PgPool, catalog: Arc<CatalogCache>) -> Self {
        Self { db, catalog }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.db.clone(), state.catalog.clone())
    }

    /// Create a rule, deactivating the variant's current active rule in the same transaction
    pub async fn create(&self, user_id: Uuid, input: CreateAlertRuleInput) -> AppResult<CreatedRule> {
        input.validate()?;

        if self.catalog.variant(input.variant_id).await?.is_none() {
            return Err(AppError::NotFound("Variant".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let superseded_rule_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE inventory_alert_rules
            SET is_active = FALSE, updated_at = NOW()
            WHERE variant_id = $1 AND is_active
            RETURNING id
            "#,
        )
        .bind(input.variant_id)
        .fetch_optional(&mut *tx)
        .await?;

        let rule = sqlx::query_as::<_, AlertRule>(&format!(
            r#"
            INSERT INTO inventory_alert_rules
                (variant_id, safety_stock_quantity, reorder_point_quantity,
                 alert_threshold_percentage, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(input.variant_id)
        .bind(input.safety_stock_quantity)
        .bind(input.reorder_point_quantity)
        .bind(input.alert_threshold_percentage)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // A concurrent create won the partial unique index
            if is_unique_violation(&e) {
                AppError::conflict(
                    reason::DUPLICATE_ENTRY,
                    "Another active rule was created for this variant",
                )
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;

        tracing::info!(
            rule_id = %rule.id,
            variant_id = %rule.variant_id,
            safety_stock = %rule.safety_stock_quantity,
            reorder_point = %rule.reorder_point_quantity,
            superseded = ?superseded_rule_id,
            "Inventory alert rule created"
        );

        Ok(CreatedRule {
            rule,
            superseded_rule_id,
        })
    }

    pub async fn list(&self, filter: AlertRuleFilter) -> AppResult<Vec<AlertRule>> {
        let rules = sqlx::query_as::<_, AlertRule>(&format!(
            r#"
            SELECT {}
            FROM inventory_alert_rules
            WHERE ($1::uuid IS NULL OR variant_id = $1)
              AND (NOT $2 OR is_active)
            ORDER BY created_at DESC
            "#,
            RULE_COLUMNS
        ))
        .bind(filter.variant_id)
        .bind(filter.active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(rules)
    }

    /// Deactivate a rule; deactivating an inactive rule returns it unchanged
    pub async fn deactivate(&self, rule_id: Uuid) -> AppResult<AlertRule> {
        let rule = sqlx::query_as::<_, AlertRule>(&format!(
            r#"
            UPDATE inventory_alert_rules
            SET is_active = FALSE,
                updated_at = CASE WHEN is_active THEN NOW() ELSE updated_at END
            WHERE id = $1
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(rule_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert rule".to_string()))?;

        tracing::info!(rule_id = %rule.id, variant_id = %rule.variant_id, "Inventory alert rule deactivated");
        Ok(rule)
    }
}

/// The variant's active rule, if one is configured
pub(crate) async fn active_rule(
    conn: &mut PgConnection,
    variant_id: Uuid,
) -> Result<Option<AlertRule>, sqlx::Error> {
    sqlx::query_as::<_, AlertRule>(&format!(
        "SELECT {} FROM inventory_alert_rules WHERE variant_id = $1 AND is_active",
        RULE_COLUMNS
    ))
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pct: i64) -> CreateAlertRuleInput {
        serde_json::from_value(serde_json::json!({
            "variant_id": Uuid::new_v4(),
            "safety_stock_quantity": "10",
            "reorder_point_quantity": "20",
            "alert_threshold_percentage": pct,
        }))
        .unwrap()
    }

    #[test]
    fn test_percentage_is_bounded() {
        assert!(input(0).validate().is_ok());
        assert!(input(100).validate().is_ok());
        assert!(input(101).validate().is_err());
    }

    #[test]
    fn test_negative_thresholds_rejected() {
        let input: CreateAlertRuleInput = serde_json::from_value(serde_json::json!({
            "variant_id": Uuid::new_v4(),
            "safety_stock_quantity": -1,
        }))
        .unwrap();
        let err: AppError = input.validate().unwrap_err().into();
        assert_eq!(err.body().field.as_deref(), Some("safety_stock_quantity"));
    }

    #[test]
    fn test_thresholds_default_to_zero() {
        let input: CreateAlertRuleInput =
            serde_json::from_value(serde_json::json!({ "variant_id": Uuid::new_v4() })).unwrap();
        assert_eq!(input.alert_threshold_percentage, Decimal::ZERO);
        assert!(input.validate().is_ok());
    }
}
