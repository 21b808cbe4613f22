//! Inventory alert engine tests
//!
//! Tests for alert evaluation including:
//! - Severity ladder scenarios
//! - Severity monotonicity in required and available quantity
//! - At most one active alert per (lot, variant)
//! - Per-item isolation of bulk acknowledgment

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    classify_severity, plan_alert_write, AlertSeverity, AlertThresholds, AlertWrite, Availability,
    UserAction,
};
use shared::types::{ApiErrorBody, BulkItemResult, BulkOutcome, ErrorCode};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn thresholds(safety: &str, reorder: &str, pct: &str) -> AlertThresholds {
    AlertThresholds {
        safety_stock_quantity: dec(safety),
        reorder_point_quantity: dec(reorder),
        alert_threshold_percentage: dec(pct),
    }
}

fn known(q: &str) -> Availability {
    Availability::Known(dec(q))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Rule {safety 10, reorder 20}, requirement 15
    #[test]
    fn test_reference_scenarios() {
        let rule = thresholds("10", "20", "0");
        let required = dec("15");

        // shortfall 10 reaches safety stock
        assert_eq!(
            classify_severity(required, known("5"), Some(&rule)),
            AlertSeverity::Critical
        );
        // shortfall 3 stays below safety stock
        assert_eq!(
            classify_severity(required, known("12"), Some(&rule)),
            AlertSeverity::High
        );
        // 15 left, below the reorder point
        assert_eq!(
            classify_severity(required, known("30"), Some(&rule)),
            AlertSeverity::Medium
        );
        assert_eq!(
            classify_severity(required, known("100"), Some(&rule)),
            AlertSeverity::Ok
        );
    }

    /// No stock is always critical, with or without a rule
    #[test]
    fn test_empty_stock_is_critical() {
        let rule = thresholds("0", "0", "0");
        assert_eq!(
            classify_severity(dec("1"), known("0"), Some(&rule)),
            AlertSeverity::Critical
        );
        assert_eq!(
            classify_severity(dec("1"), known("-3"), None),
            AlertSeverity::Critical
        );
    }

    /// A failed stock lookup counts as no stock
    #[test]
    fn test_unknown_availability() {
        let unknown = Availability::Unknown;
        assert!(!unknown.is_known());
        assert_eq!(unknown.effective(), Decimal::ZERO);
        assert_eq!(
            classify_severity(dec("0.01"), unknown, None),
            AlertSeverity::Critical
        );
    }

    /// LOW is driven by the remaining percentage
    #[test]
    fn test_low_band() {
        let rule = thresholds("5", "10", "25");
        // 200 on hand, 160 required: 40 left (above reorder), 20% remaining
        assert_eq!(
            classify_severity(dec("160"), known("200"), Some(&rule)),
            AlertSeverity::Low
        );
        // 100 left, 50% remaining
        assert_eq!(
            classify_severity(dec("100"), known("200"), Some(&rule)),
            AlertSeverity::Ok
        );
    }

    /// Without a rule only real shortfalls alert
    #[test]
    fn test_without_rule() {
        assert_eq!(
            classify_severity(dec("50"), known("49"), None),
            AlertSeverity::High
        );
        assert_eq!(
            classify_severity(dec("50"), known("50"), None),
            AlertSeverity::Ok
        );
    }

    /// The dedup plan for each combination of state and severity
    #[test]
    fn test_write_plan() {
        let active = Uuid::new_v4();
        assert_eq!(plan_alert_write(None, AlertSeverity::Critical), AlertWrite::Insert);
        assert_eq!(
            plan_alert_write(Some(active), AlertSeverity::Medium),
            AlertWrite::Refresh { alert_id: active }
        );
        assert_eq!(
            plan_alert_write(Some(active), AlertSeverity::Ok),
            AlertWrite::Resolve { alert_id: active }
        );
        assert_eq!(plan_alert_write(None, AlertSeverity::Ok), AlertWrite::Noop);
    }

    /// User actions use the stored spelling
    #[test]
    fn test_user_actions() {
        assert_eq!(UserAction::PartialFulfill.as_str(), "PARTIAL_FULFILL");
        assert_eq!(UserAction::parse("delay"), Some(UserAction::Delay));
        assert_eq!(UserAction::parse("IGNORE"), None);
    }

    /// Three ids, one already acknowledged: two succeed, one fails
    #[test]
    fn test_bulk_partial_success() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let acknowledged = Uuid::new_v4();

        let outcome = BulkOutcome::from_results(vec![
            BulkItemResult {
                id: first,
                success: true,
                error: None,
            },
            BulkItemResult {
                id: acknowledged,
                success: false,
                error: Some(ApiErrorBody {
                    code: ErrorCode::Conflict,
                    message: "Alert has already been acknowledged".to_string(),
                    reason: Some("ALREADY_ACKNOWLEDGED".to_string()),
                    field: None,
                }),
            },
            BulkItemResult {
                id: second,
                success: true,
                error: None,
            },
        ]);

        assert_eq!(outcome.acknowledged_count, 2);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.failed_ids(), vec![acknowledged]);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..50_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn thresholds_strategy() -> impl Strategy<Value = Option<AlertThresholds>> {
    prop::option::of(
        (quantity_strategy(), quantity_strategy(), 0i64..=100).prop_map(|(safety, reorder, pct)| {
            AlertThresholds {
                safety_stock_quantity: safety,
                reorder_point_quantity: reorder,
                alert_threshold_percentage: Decimal::from(pct),
            }
        }),
    )
}

#[derive(Debug, Clone)]
enum Event {
    Evaluate(AlertSeverity),
    Acknowledge,
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => prop::sample::select(vec![
            AlertSeverity::Ok,
            AlertSeverity::Low,
            AlertSeverity::Medium,
            AlertSeverity::High,
            AlertSeverity::Critical,
        ])
        .prop_map(Event::Evaluate),
        1 => Just(Event::Acknowledge),
    ]
}

#[derive(Debug)]
struct StoredAlert {
    id: Uuid,
    acknowledged: bool,
    resolved: bool,
}

impl StoredAlert {
    fn is_active(&self) -> bool {
        !self.acknowledged && !self.resolved
    }
}

proptest! {
    /// Needing more never lowers the severity
    #[test]
    fn prop_severity_monotone_in_required(
        available in quantity_strategy(),
        low in quantity_strategy(),
        extra in quantity_strategy(),
        rule in thresholds_strategy(),
    ) {
        let availability = Availability::Known(available);
        let lower = classify_severity(low, availability, rule.as_ref());
        let higher = classify_severity(low + extra, availability, rule.as_ref());
        prop_assert!(higher >= lower, "{:?} then {:?}", lower, higher);
    }

    /// Having more stock never raises the severity
    #[test]
    fn prop_severity_antitone_in_available(
        required in quantity_strategy(),
        available in quantity_strategy(),
        extra in quantity_strategy(),
        rule in thresholds_strategy(),
    ) {
        let less = classify_severity(required, Availability::Known(available), rule.as_ref());
        let more = classify_severity(required, Availability::Known(available + extra), rule.as_ref());
        prop_assert!(more <= less, "{:?} then {:?}", less, more);
    }

    /// Unknown availability is never milder than any known quantity
    #[test]
    fn prop_unknown_is_worst_case(
        required in quantity_strategy(),
        available in quantity_strategy(),
        rule in thresholds_strategy(),
    ) {
        let unknown = classify_severity(required, Availability::Unknown, rule.as_ref());
        let known = classify_severity(required, Availability::Known(available), rule.as_ref());
        prop_assert!(unknown >= known);
    }

    /// Replaying evaluations and acknowledgments through the write plan keeps
    /// at most one active alert, and exactly one while a shortfall persists
    #[test]
    fn prop_at_most_one_active_alert(events in prop::collection::vec(event_strategy(), 1..40)) {
        let mut store: Vec<StoredAlert> = Vec::new();

        for event in events {
            match event {
                Event::Evaluate(severity) => {
                    let active = store.iter().find(|a| a.is_active()).map(|a| a.id);
                    match plan_alert_write(active, severity) {
                        AlertWrite::Insert => store.push(StoredAlert {
                            id: Uuid::new_v4(),
                            acknowledged: false,
                            resolved: false,
                        }),
                        AlertWrite::Refresh { alert_id } => {
                            prop_assert_eq!(Some(alert_id), active);
                        }
                        AlertWrite::Resolve { alert_id } => {
                            if let Some(alert) = store.iter_mut().find(|a| a.id == alert_id) {
                                alert.resolved = true;
                            }
                        }
                        AlertWrite::Noop => {}
                    }
                    let active_count = store.iter().filter(|a| a.is_active()).count();
                    prop_assert_eq!(active_count, usize::from(severity.requires_alert()));
                }
                Event::Acknowledge => {
                    if let Some(alert) = store.iter_mut().find(|a| a.is_active()) {
                        alert.acknowledged = true;
                    }
                }
            }
            prop_assert!(store.iter().filter(|a| a.is_active()).count() <= 1);
        }
    }
}
