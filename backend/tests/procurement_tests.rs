//! Procurement recommendation tests
//!
//! Tests for recommendations including:
//! - Status lifecycle and purchase order rules
//! - Purchase proposals from alert snapshots
//! - Delivery dates and reference validation

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    delivery_date_after, propose_purchase, AlertThresholds, ProcurementStatus,
    ProcurementTransitionError,
};
use shared::validation::validate_purchase_order_ref;
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

const ALL_STATUSES: [ProcurementStatus; 4] = [
    ProcurementStatus::Recommended,
    ProcurementStatus::Ordered,
    ProcurementStatus::Received,
    ProcurementStatus::Cancelled,
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Ordering needs a purchase order reference
    #[test]
    fn test_order_requires_purchase_order() {
        assert_eq!(
            ProcurementStatus::Recommended.transition(ProcurementStatus::Ordered, false),
            Err(ProcurementTransitionError::PurchaseOrderRequired)
        );
        assert_eq!(
            ProcurementStatus::Recommended.transition(ProcurementStatus::Ordered, true),
            Ok(ProcurementStatus::Ordered)
        );
    }

    /// A reference is refused on any other transition
    #[test]
    fn test_purchase_order_only_on_order() {
        assert_eq!(
            ProcurementStatus::Ordered.transition(ProcurementStatus::Received, true),
            Err(ProcurementTransitionError::PurchaseOrderNotAllowed)
        );
        assert_eq!(
            ProcurementStatus::Recommended.transition(ProcurementStatus::Cancelled, true),
            Err(ProcurementTransitionError::PurchaseOrderNotAllowed)
        );
    }

    /// Receiving skips no step
    #[test]
    fn test_cannot_receive_unordered() {
        assert!(matches!(
            ProcurementStatus::Recommended.transition(ProcurementStatus::Received, false),
            Err(ProcurementTransitionError::NotAllowed { .. })
        ));
    }

    /// Status strings match the stored values
    #[test]
    fn test_status_strings() {
        for status in ALL_STATUSES {
            assert_eq!(ProcurementStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProcurementStatus::parse("ordered"), Some(ProcurementStatus::Ordered));
        assert_eq!(ProcurementStatus::parse("SHIPPED"), None);
    }

    /// Shortfall plus reorder point
    #[test]
    fn test_proposal_with_rule() {
        let rule = AlertThresholds {
            safety_stock_quantity: dec("10"),
            reorder_point_quantity: dec("20"),
            alert_threshold_percentage: dec("0"),
        };
        let proposal = propose_purchase(dec("15"), dec("5"), Some(&rule));
        assert_eq!(proposal.shortfall, dec("10"));
        assert_eq!(proposal.replenishment, dec("20"));
        assert_eq!(proposal.recommended_quantity, dec("30"));
    }

    /// Without a rule only the shortfall is bought
    #[test]
    fn test_proposal_without_rule() {
        let proposal = propose_purchase(dec("40"), dec("12.5"), None);
        assert_eq!(proposal.recommended_quantity, dec("27.5"));

        let nothing = propose_purchase(dec("10"), dec("50"), None);
        assert_eq!(nothing.recommended_quantity, Decimal::ZERO);
    }

    /// Negative stock snapshots do not inflate the proposal
    #[test]
    fn test_proposal_clamps_negative_stock() {
        let proposal = propose_purchase(dec("8"), dec("-5"), None);
        assert_eq!(proposal.shortfall, dec("8"));
    }

    /// Delivery dates
    #[test]
    fn test_delivery_date() {
        let today = NaiveDate::from_ymd_opt(2026, 12, 28).unwrap();
        assert_eq!(
            delivery_date_after(today, 7),
            NaiveDate::from_ymd_opt(2027, 1, 4)
        );
        assert_eq!(delivery_date_after(today, 0), Some(today));
    }

    /// Lead times past the calendar's end give no date instead of panicking
    #[test]
    fn test_delivery_date_overflow() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(delivery_date_after(today, u32::MAX), None);
        assert_eq!(delivery_date_after(NaiveDate::MAX, 1), None);
    }

    /// Status strings decode the same way in JSON bodies and query strings
    #[test]
    fn test_status_json_matches_parse() {
        for raw in ["ordered", "Ordered", "ORDERED"] {
            let from_json: ProcurementStatus =
                serde_json::from_value(serde_json::Value::String(raw.to_string())).unwrap();
            assert_eq!(Some(from_json), ProcurementStatus::parse(raw));
        }
        assert!(serde_json::from_value::<ProcurementStatus>(serde_json::json!("SHIPPED")).is_err());
    }

    /// Purchase order references
    #[test]
    fn test_purchase_order_reference() {
        assert!(validate_purchase_order_ref("PO-2026-0042").is_ok());
        assert!(validate_purchase_order_ref("  ").is_err());
        assert!(validate_purchase_order_ref(&"X".repeat(65)).is_err());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000i64..100_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

proptest! {
    /// Terminal statuses accept nothing; every accepted change is in the allowed set
    #[test]
    fn prop_transition_table_closed(
        from in prop::sample::select(ALL_STATUSES.to_vec()),
        to in prop::sample::select(ALL_STATUSES.to_vec()),
        po in any::<bool>(),
    ) {
        match from.transition(to, po) {
            Ok(next) => {
                prop_assert!(!from.is_terminal());
                prop_assert!(from.allowed_next().contains(&next));
                prop_assert_eq!(po, next == ProcurementStatus::Ordered);
            }
            Err(_) => {}
        }
    }

    /// Any lead time yields a date or nothing, never a panic
    #[test]
    fn prop_delivery_date_total(lead in any::<u32>(), offset in 0i64..3_000_000) {
        let start = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(offset);
        match delivery_date_after(start, lead) {
            Some(date) => prop_assert!(date >= start),
            None => prop_assert!(lead > 0),
        }
    }

    /// Proposals cover the shortfall and are never negative
    #[test]
    fn prop_proposal_covers_shortfall(
        required in quantity_strategy(),
        available in quantity_strategy(),
        reorder in quantity_strategy(),
    ) {
        let rule = AlertThresholds {
            safety_stock_quantity: Decimal::ZERO,
            reorder_point_quantity: reorder,
            alert_threshold_percentage: Decimal::ZERO,
        };
        let proposal = propose_purchase(required, available, Some(&rule));
        prop_assert!(proposal.recommended_quantity >= Decimal::ZERO);
        prop_assert!(available.max(Decimal::ZERO) + proposal.recommended_quantity >= required);
    }
}
