//! Procurement recommendation lifecycle

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AlertThresholds;

/// Status of a procurement recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum ProcurementStatus {
    Recommended,
    Ordered,
    Received,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcurementTransitionError {
    #[error("cannot move recommendation from {from} to {to}")]
    NotAllowed {
        from: ProcurementStatus,
        to: ProcurementStatus,
    },

    #[error("a purchase order reference is required to mark a recommendation ORDERED")]
    PurchaseOrderRequired,

    #[error("a purchase order reference can only be set on the ORDERED transition")]
    PurchaseOrderNotAllowed,
}

impl ProcurementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementStatus::Recommended => "RECOMMENDED",
            ProcurementStatus::Ordered => "ORDERED",
            ProcurementStatus::Received => "RECEIVED",
            ProcurementStatus::Cancelled => "CANCELLED",
        }
    }

    /// Case-insensitive, for query strings and request bodies alike
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RECOMMENDED" => Some(ProcurementStatus::Recommended),
            "ORDERED" => Some(ProcurementStatus::Ordered),
            "RECEIVED" => Some(ProcurementStatus::Received),
            "CANCELLED" => Some(ProcurementStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcurementStatus::Received | ProcurementStatus::Cancelled)
    }

    pub fn allowed_next(&self) -> &'static [ProcurementStatus] {
        match self {
            ProcurementStatus::Recommended => {
                &[ProcurementStatus::Ordered, ProcurementStatus::Cancelled]
            }
            ProcurementStatus::Ordered => {
                &[ProcurementStatus::Received, ProcurementStatus::Cancelled]
            }
            ProcurementStatus::Received | ProcurementStatus::Cancelled => &[],
        }
    }

    /// Validate a status change together with the purchase order reference it carries
    pub fn transition(
        self,
        to: ProcurementStatus,
        purchase_order_supplied: bool,
    ) -> Result<ProcurementStatus, ProcurementTransitionError> {
        if !self.allowed_next().contains(&to) {
            return Err(ProcurementTransitionError::NotAllowed { from: self, to });
        }
        match (to, purchase_order_supplied) {
            (ProcurementStatus::Ordered, false) => {
                Err(ProcurementTransitionError::PurchaseOrderRequired)
            }
            (ProcurementStatus::Ordered, true) => Ok(to),
            (_, true) => Err(ProcurementTransitionError::PurchaseOrderNotAllowed),
            (_, false) => Ok(to),
        }
    }
}

impl TryFrom<String> for ProcurementStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProcurementStatus::parse(&value)
            .ok_or_else(|| format!("unknown procurement status '{}'", value))
    }
}

impl std::fmt::Display for ProcurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase proposal derived from an alert snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseProposal {
    pub shortfall: Decimal,
    pub replenishment: Decimal,
    pub recommended_quantity: Decimal,
}

/// Cover the shortfall and restore the reorder point when a rule exists
pub fn propose_purchase(
    required: Decimal,
    available: Decimal,
    thresholds: Option<&AlertThresholds>,
) -> PurchaseProposal {
    let shortfall = (required - available.max(Decimal::ZERO)).max(Decimal::ZERO);
    let replenishment = thresholds
        .map(|t| t.reorder_point_quantity.max(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO);
    PurchaseProposal {
        shortfall,
        replenishment,
        recommended_quantity: shortfall + replenishment,
    }
}

/// Longest lead time a recommendation may ask for
pub const MAX_LEAD_TIME_DAYS: u32 = 3650;

/// Delivery date a given number of days after `today`; `None` past the calendar's end
pub fn delivery_date_after(today: NaiveDate, lead_time_days: u32) -> Option<NaiveDate> {
    today.checked_add_days(Days::new(u64::from(lead_time_days)))
}
