//! Variant selection validation and lot readiness evaluation

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{GroupRule, SubprocessTemplate};

/// A selection as submitted for one subprocess link, before persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedSelection {
    pub variant_id: Uuid,
    pub quantity: Decimal,
    pub quantity_override: Option<Decimal>,
}

impl ProposedSelection {
    /// Quantity that drives cost and stock requirements
    pub fn effective_quantity(&self) -> Decimal {
        self.quantity_override.unwrap_or(self.quantity)
    }
}

/// Why a replacement selection set was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection {index}: quantity must be greater than zero")]
    NonPositiveQuantity { index: usize },

    #[error("selection {index}: quantity override must be greater than zero")]
    NonPositiveOverride { index: usize },

    #[error("selection {index}: variant {variant_id} is not in the subprocess variant pool")]
    NotInPool { index: usize, variant_id: Uuid },

    #[error("selection {index}: variant {variant_id} is selected more than once")]
    DuplicateVariant { index: usize, variant_id: Uuid },

    #[error("selection {index}: substitute group '{group_name}' allows exactly one variant")]
    GroupConflict { index: usize, group_name: String },
}

impl SelectionError {
    pub fn index(&self) -> usize {
        match self {
            SelectionError::NonPositiveQuantity { index }
            | SelectionError::NonPositiveOverride { index }
            | SelectionError::NotInPool { index, .. }
            | SelectionError::DuplicateVariant { index, .. }
            | SelectionError::GroupConflict { index, .. } => *index,
        }
    }
}

/// Validate a full replacement set against the subprocess template.
///
/// An empty set is valid: it clears the subprocess's selections.
pub fn validate_selection_set(
    template: &SubprocessTemplate,
    selections: &[ProposedSelection],
) -> Result<(), SelectionError> {
    let mut seen_variants = HashSet::new();
    let mut taken_groups: HashSet<Uuid> = HashSet::new();

    for (index, selection) in selections.iter().enumerate() {
        if selection.quantity <= Decimal::ZERO {
            return Err(SelectionError::NonPositiveQuantity { index });
        }
        if matches!(selection.quantity_override, Some(q) if q <= Decimal::ZERO) {
            return Err(SelectionError::NonPositiveOverride { index });
        }
        if !template.in_pool(selection.variant_id) {
            return Err(SelectionError::NotInPool {
                index,
                variant_id: selection.variant_id,
            });
        }
        if !seen_variants.insert(selection.variant_id) {
            return Err(SelectionError::DuplicateVariant {
                index,
                variant_id: selection.variant_id,
            });
        }
        if let Some(group) = template.group_of(selection.variant_id) {
            if !taken_groups.insert(group.id) && !group.rule.allows_multiple() {
                return Err(SelectionError::GroupConflict {
                    index,
                    group_name: group.name.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Kind of readiness problem found on a subprocess link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadinessIssueKind {
    MissingSelection,
    AmbiguousSelection { selected: usize },
}

/// A readiness problem on one subprocess link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessIssue {
    pub link_id: Uuid,
    pub subprocess_id: Uuid,
    pub subprocess_name: String,
    pub group_id: Uuid,
    pub group_name: String,
    #[serde(flatten)]
    pub kind: ReadinessIssueKind,
    pub message: String,
}

/// Readiness verdict for a whole lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub issues: Vec<ReadinessIssue>,
}

impl ReadinessReport {
    pub fn from_issues(issues: Vec<ReadinessIssue>) -> Self {
        Self {
            ready: issues.is_empty(),
            issues,
        }
    }
}

/// Check one link's selections against every substitute group of its subprocess
pub fn evaluate_link_readiness(
    link_id: Uuid,
    template: &SubprocessTemplate,
    selected_variants: &[Uuid],
) -> Vec<ReadinessIssue> {
    let mut per_group: HashMap<Uuid, usize> = HashMap::new();
    for variant_id in selected_variants {
        if let Some(group) = template.group_of(*variant_id) {
            *per_group.entry(group.id).or_default() += 1;
        }
    }

    template
        .substitute_groups
        .iter()
        .filter_map(|group| {
            let selected = per_group.get(&group.id).copied().unwrap_or(0);
            let kind = match (group.rule, selected) {
                (_, 0) => ReadinessIssueKind::MissingSelection,
                (GroupRule::ExactlyOne, 1) | (GroupRule::AtLeastOne, _) => return None,
                (GroupRule::ExactlyOne, n) => ReadinessIssueKind::AmbiguousSelection { selected: n },
            };
            let message = match &kind {
                ReadinessIssueKind::MissingSelection => format!(
                    "Subprocess '{}' has no selection for group '{}'",
                    template.name, group.name
                ),
                ReadinessIssueKind::AmbiguousSelection { selected } => format!(
                    "Subprocess '{}' has {} selections for exactly-one group '{}'",
                    template.name, selected, group.name
                ),
            };
            Some(ReadinessIssue {
                link_id,
                subprocess_id: template.id,
                subprocess_name: template.name.clone(),
                group_id: group.id,
                group_name: group.name.clone(),
                kind,
                message,
            })
        })
        .collect()
}
