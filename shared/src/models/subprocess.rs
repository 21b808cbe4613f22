//! Subprocess catalog types and per-lot subprocess execution status

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subprocess step template from the process catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubprocessTemplate {
    pub id: Uuid,
    pub name: String,
    /// Output multiplier applied when yield multipliers are enabled
    pub yield_multiplier: Option<Decimal>,
    /// Variants this subprocess may consume
    pub variant_pool: Vec<Uuid>,
    pub substitute_groups: Vec<SubstituteGroup>,
}

impl SubprocessTemplate {
    pub fn requires_selections(&self) -> bool {
        !self.substitute_groups.is_empty()
    }

    pub fn in_pool(&self, variant_id: Uuid) -> bool {
        self.variant_pool.contains(&variant_id)
    }

    /// Substitute group the variant belongs to, if any
    pub fn group_of(&self, variant_id: Uuid) -> Option<&SubstituteGroup> {
        self.substitute_groups
            .iter()
            .find(|g| g.variant_ids.contains(&variant_id))
    }
}

/// A set of interchangeable variants within one subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstituteGroup {
    pub id: Uuid,
    pub name: String,
    pub rule: GroupRule,
    pub variant_ids: Vec<Uuid>,
}

/// How many variants of a substitute group a selection set must pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRule {
    #[default]
    ExactlyOne,
    AtLeastOne,
}

impl GroupRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRule::ExactlyOne => "exactly_one",
            GroupRule::AtLeastOne => "at_least_one",
        }
    }

    /// Unknown stored values fall back to the strict default
    pub fn parse(s: &str) -> Self {
        match s {
            "at_least_one" => GroupRule::AtLeastOne,
            _ => GroupRule::ExactlyOne,
        }
    }

    pub fn allows_multiple(&self) -> bool {
        matches!(self, GroupRule::AtLeastOne)
    }
}

/// A catalog variant as seen by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    /// Item-master unit cost; `None` when the item has no pricing
    pub unit_cost: Option<Decimal>,
}

/// Execution status of one subprocess within a lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubprocessStatus {
    Planning,
    InProgress,
    Completed,
    Failed,
}

impl SubprocessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubprocessStatus::Planning => "planning",
            SubprocessStatus::InProgress => "in_progress",
            SubprocessStatus::Completed => "completed",
            SubprocessStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(SubprocessStatus::Planning),
            "in_progress" => Some(SubprocessStatus::InProgress),
            "completed" => Some(SubprocessStatus::Completed),
            "failed" => Some(SubprocessStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubprocessStatus::Completed | SubprocessStatus::Failed)
    }

    pub fn allowed_next(&self) -> &'static [SubprocessStatus] {
        match self {
            SubprocessStatus::Planning => &[SubprocessStatus::InProgress, SubprocessStatus::Failed],
            SubprocessStatus::InProgress => {
                &[SubprocessStatus::Completed, SubprocessStatus::Failed]
            }
            SubprocessStatus::Completed | SubprocessStatus::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: SubprocessStatus) -> bool {
        self.allowed_next().contains(&next)
    }
}

impl std::fmt::Display for SubprocessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
