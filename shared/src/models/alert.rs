//! Inventory alert severity ladder and alert deduplication rules

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Graded urgency of a stock shortfall, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum AlertSeverity {
    Ok,
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Ok => "OK",
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Critical => "CRITICAL",
        }
    }

    /// Accepts either case so query strings like `?severity=critical` work
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Some(AlertSeverity::Ok),
            "LOW" => Some(AlertSeverity::Low),
            "MEDIUM" => Some(AlertSeverity::Medium),
            "HIGH" => Some(AlertSeverity::High),
            "CRITICAL" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn requires_alert(&self) -> bool {
        *self != AlertSeverity::Ok
    }
}

impl TryFrom<String> for AlertSeverity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AlertSeverity::parse(&value).ok_or_else(|| format!("unknown severity '{}'", value))
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision recorded when a user acknowledges an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum UserAction {
    Proceed,
    Delay,
    Substitute,
    PartialFulfill,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Proceed => "PROCEED",
            UserAction::Delay => "DELAY",
            UserAction::Substitute => "SUBSTITUTE",
            UserAction::PartialFulfill => "PARTIAL_FULFILL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROCEED" => Some(UserAction::Proceed),
            "DELAY" => Some(UserAction::Delay),
            "SUBSTITUTE" => Some(UserAction::Substitute),
            "PARTIAL_FULFILL" => Some(UserAction::PartialFulfill),
            _ => None,
        }
    }
}

impl TryFrom<String> for UserAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UserAction::parse(&value).ok_or_else(|| format!("unknown user action '{}'", value))
    }
}

/// Thresholds of an active inventory alert rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub safety_stock_quantity: Decimal,
    pub reorder_point_quantity: Decimal,
    /// Percentage in [0, 100] of stock that must remain after the requirement
    pub alert_threshold_percentage: Decimal,
}

/// On-hand stock as reported by the inventory collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "quantity", rename_all = "snake_case")]
pub enum Availability {
    Known(Decimal),
    /// Lookup failed; treated as no stock
    Unknown,
}

impl Availability {
    /// Quantity used for classification and snapshots
    pub fn effective(&self) -> Decimal {
        match self {
            Availability::Known(q) => *q,
            Availability::Unknown => Decimal::ZERO,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Availability::Known(_))
    }
}

/// Classify a requirement against available stock. First matching rung wins:
/// CRITICAL, HIGH, MEDIUM, LOW, OK. Reorder point and percentage rungs apply
/// only when a rule is configured.
pub fn classify_severity(
    required: Decimal,
    availability: Availability,
    thresholds: Option<&AlertThresholds>,
) -> AlertSeverity {
    let available = availability.effective();

    if available <= Decimal::ZERO {
        return AlertSeverity::Critical;
    }

    if available < required {
        let shortfall = required - available;
        return match thresholds {
            Some(t) if shortfall >= t.safety_stock_quantity => AlertSeverity::Critical,
            _ => AlertSeverity::High,
        };
    }

    let Some(t) = thresholds else {
        return AlertSeverity::Ok;
    };

    let remaining = available - required;
    if remaining < t.reorder_point_quantity {
        return AlertSeverity::Medium;
    }

    let remaining_pct = remaining / available * Decimal::ONE_HUNDRED;
    if remaining_pct < t.alert_threshold_percentage {
        return AlertSeverity::Low;
    }

    AlertSeverity::Ok
}

/// Storage action for one (lot, variant) evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertWrite {
    /// No active alert and a shortfall exists
    Insert,
    /// Refresh the snapshot of the active unacknowledged alert
    Refresh { alert_id: Uuid },
    /// Stock is sufficient again; close the active alert
    Resolve { alert_id: Uuid },
    Noop,
}

/// Decide how to persist an evaluation given the currently active
/// unacknowledged alert for the pair, if any.
///
/// Acknowledged alerts are never active, so a shortfall after acknowledgment
/// yields `Insert`.
pub fn plan_alert_write(active_alert: Option<Uuid>, severity: AlertSeverity) -> AlertWrite {
    match (active_alert, severity.requires_alert()) {
        (None, true) => AlertWrite::Insert,
        (Some(alert_id), true) => AlertWrite::Refresh { alert_id },
        (Some(alert_id), false) => AlertWrite::Resolve { alert_id },
        (None, false) => AlertWrite::Noop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(safety: i64, reorder: i64, pct: i64) -> AlertThresholds {
        AlertThresholds {
            safety_stock_quantity: Decimal::from(safety),
            reorder_point_quantity: Decimal::from(reorder),
            alert_threshold_percentage: Decimal::from(pct),
        }
    }

    fn known(q: i64) -> Availability {
        Availability::Known(Decimal::from(q))
    }

    #[test]
    fn test_ladder_scenarios() {
        let r = rule(10, 20, 0);
        let req = Decimal::from(15);
        assert_eq!(classify_severity(req, known(5), Some(&r)), AlertSeverity::Critical);
        assert_eq!(classify_severity(req, known(12), Some(&r)), AlertSeverity::High);
        assert_eq!(classify_severity(req, known(30), Some(&r)), AlertSeverity::Medium);
        assert_eq!(classify_severity(req, known(100), Some(&r)), AlertSeverity::Ok);
    }

    #[test]
    fn test_low_band_uses_percentage() {
        // 100 on hand, 85 required leaves 15%, below a 20% threshold
        let r = rule(0, 0, 20);
        assert_eq!(
            classify_severity(Decimal::from(85), known(100), Some(&r)),
            AlertSeverity::Low
        );
        assert_eq!(
            classify_severity(Decimal::from(70), known(100), Some(&r)),
            AlertSeverity::Ok
        );
    }

    #[test]
    fn test_no_rule_only_flags_shortfalls() {
        assert_eq!(classify_severity(Decimal::from(10), known(9), None), AlertSeverity::High);
        assert_eq!(classify_severity(Decimal::from(10), known(10), None), AlertSeverity::Ok);
        assert_eq!(classify_severity(Decimal::from(1), known(0), None), AlertSeverity::Critical);
    }

    #[test]
    fn test_unknown_availability_is_conservative() {
        assert_eq!(
            classify_severity(Decimal::ONE, Availability::Unknown, None),
            AlertSeverity::Critical
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Ok < AlertSeverity::Low);
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
        assert_eq!(AlertSeverity::parse("critical"), Some(AlertSeverity::Critical));
    }

    #[test]
    fn test_plan_alert_write() {
        let id = Uuid::new_v4();
        assert_eq!(plan_alert_write(None, AlertSeverity::High), AlertWrite::Insert);
        assert_eq!(
            plan_alert_write(Some(id), AlertSeverity::Low),
            AlertWrite::Refresh { alert_id: id }
        );
        assert_eq!(
            plan_alert_write(Some(id), AlertSeverity::Ok),
            AlertWrite::Resolve { alert_id: id }
        );
        assert_eq!(plan_alert_write(None, AlertSeverity::Ok), AlertWrite::Noop);
    }
}
