//! Production lot models and the lot status state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A planned production run against a process definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionLot {
    pub id: Uuid,
    pub process_id: Uuid,
    /// Unique human-readable number (e.g., "PL-2026-00042")
    pub lot_number: String,
    pub requested_quantity: Decimal,
    pub status: LotStatus,
    /// Cached rollup, never null; zero until priced selections exist
    pub total_cost: Decimal,
    pub total_quantity: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of a production lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Planning,
    Ready,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Named transitions a lot can undergo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotTransition {
    Finalize,
    Execute,
    Complete,
    Fail,
    Cancel,
}

/// Rejected state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {transition} a lot in status {from}")]
pub struct TransitionError {
    pub from: LotStatus,
    pub transition: LotTransition,
}

impl LotStatus {
    pub const ALL: [LotStatus; 6] = [
        LotStatus::Planning,
        LotStatus::Ready,
        LotStatus::InProgress,
        LotStatus::Completed,
        LotStatus::Failed,
        LotStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Planning => "planning",
            LotStatus::Ready => "ready",
            LotStatus::InProgress => "in_progress",
            LotStatus::Completed => "completed",
            LotStatus::Failed => "failed",
            LotStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(LotStatus::Planning),
            "ready" => Some(LotStatus::Ready),
            "in_progress" => Some(LotStatus::InProgress),
            "completed" => Some(LotStatus::Completed),
            "failed" => Some(LotStatus::Failed),
            "cancelled" => Some(LotStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LotStatus::Completed | LotStatus::Failed | LotStatus::Cancelled
        )
    }

    /// Links can be attached and selections replaced until execution starts
    pub fn accepts_linkage_changes(&self) -> bool {
        matches!(self, LotStatus::Planning | LotStatus::Ready)
    }

    /// Statuses reachable from this one in a single step
    pub fn allowed_next(&self) -> &'static [LotStatus] {
        match self {
            LotStatus::Planning => &[LotStatus::Ready, LotStatus::Cancelled],
            LotStatus::Ready => &[LotStatus::InProgress, LotStatus::Cancelled],
            LotStatus::InProgress => &[LotStatus::Completed, LotStatus::Failed],
            LotStatus::Completed | LotStatus::Failed | LotStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: LotStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Apply a named transition, rejecting every unmapped pair
    pub fn apply(self, transition: LotTransition) -> Result<LotStatus, TransitionError> {
        let next = match (self, transition) {
            (LotStatus::Planning, LotTransition::Finalize) => LotStatus::Ready,
            (LotStatus::Ready, LotTransition::Execute) => LotStatus::InProgress,
            (LotStatus::InProgress, LotTransition::Complete) => LotStatus::Completed,
            (LotStatus::InProgress, LotTransition::Fail) => LotStatus::Failed,
            (LotStatus::Planning | LotStatus::Ready, LotTransition::Cancel) => {
                LotStatus::Cancelled
            }
            (from, transition) => return Err(TransitionError { from, transition }),
        };
        debug_assert!(self.can_transition_to(next));
        Ok(next)
    }
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LotTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotTransition::Finalize => "finalize",
            LotTransition::Execute => "execute",
            LotTransition::Complete => "complete",
            LotTransition::Fail => "fail",
            LotTransition::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for LotTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking whether an InProgress lot may close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureCheck {
    Allowed,
    NoSubprocesses,
    Incomplete { pending: usize },
    NoFailures,
}

/// Decide whether a lot with the given link statuses can take the closing transition
pub fn check_closure(
    transition: LotTransition,
    link_statuses: &[super::SubprocessStatus],
) -> ClosureCheck {
    use super::SubprocessStatus;

    if link_statuses.is_empty() {
        return ClosureCheck::NoSubprocesses;
    }
    match transition {
        LotTransition::Complete => {
            let pending = link_statuses
                .iter()
                .filter(|s| **s != SubprocessStatus::Completed)
                .count();
            if pending == 0 {
                ClosureCheck::Allowed
            } else {
                ClosureCheck::Incomplete { pending }
            }
        }
        LotTransition::Fail => {
            if link_statuses.contains(&SubprocessStatus::Failed) {
                ClosureCheck::Allowed
            } else {
                ClosureCheck::NoFailures
            }
        }
        _ => ClosureCheck::Allowed,
    }
}

/// Format a generated lot number
pub fn generate_lot_number(year: i32, sequence: i64) -> String {
    format!("PL-{}-{:05}", year, sequence)
}
