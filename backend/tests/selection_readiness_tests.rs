//! Variant selection and readiness tests
//!
//! Tests for selection replacement and lot readiness including:
//! - Pool membership and substitute group rules
//! - Empty replacement sets
//! - Readiness verdicts per group rule

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    evaluate_link_readiness, validate_selection_set, GroupRule, ProposedSelection,
    ReadinessIssueKind, ReadinessReport, SelectionError, SubprocessTemplate, SubstituteGroup,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Fixture {
    template: SubprocessTemplate,
    flour_a: Uuid,
    flour_b: Uuid,
    yeast: Uuid,
    salt: Uuid,
}

/// Dough mixing: one flour (exactly one), yeast in an at-least-one group, salt ungrouped
fn fixture() -> Fixture {
    let flour_a = Uuid::new_v4();
    let flour_b = Uuid::new_v4();
    let yeast = Uuid::new_v4();
    let salt = Uuid::new_v4();
    let template = SubprocessTemplate {
        id: Uuid::new_v4(),
        name: "Dough mixing".to_string(),
        yield_multiplier: None,
        variant_pool: vec![flour_a, flour_b, yeast, salt],
        substitute_groups: vec![
            SubstituteGroup {
                id: Uuid::new_v4(),
                name: "Flour".to_string(),
                rule: GroupRule::ExactlyOne,
                variant_ids: vec![flour_a, flour_b],
            },
            SubstituteGroup {
                id: Uuid::new_v4(),
                name: "Leavening".to_string(),
                rule: GroupRule::AtLeastOne,
                variant_ids: vec![yeast],
            },
        ],
    };
    Fixture {
        template,
        flour_a,
        flour_b,
        yeast,
        salt,
    }
}

fn pick(variant_id: Uuid, quantity: &str) -> ProposedSelection {
    ProposedSelection {
        variant_id,
        quantity: dec(quantity),
        quantity_override: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A complete valid set is accepted
    #[test]
    fn test_valid_set() {
        let f = fixture();
        let set = [pick(f.flour_a, "25"), pick(f.yeast, "0.5"), pick(f.salt, "0.4")];
        assert!(validate_selection_set(&f.template, &set).is_ok());
    }

    /// The empty set clears a link and is always valid
    #[test]
    fn test_empty_set_is_valid() {
        let f = fixture();
        assert!(validate_selection_set(&f.template, &[]).is_ok());
    }

    /// Variants outside the pool are rejected with their index
    #[test]
    fn test_variant_outside_pool() {
        let f = fixture();
        let stranger = Uuid::new_v4();
        let set = [pick(f.flour_a, "25"), pick(stranger, "1")];
        let err = validate_selection_set(&f.template, &set).unwrap_err();
        assert_eq!(
            err,
            SelectionError::NotInPool {
                index: 1,
                variant_id: stranger
            }
        );
        assert_eq!(err.index(), 1);
    }

    /// Two variants from an exactly-one group conflict
    #[test]
    fn test_exactly_one_group_conflict() {
        let f = fixture();
        let set = [pick(f.flour_a, "10"), pick(f.flour_b, "10")];
        let err = validate_selection_set(&f.template, &set).unwrap_err();
        assert!(matches!(err, SelectionError::GroupConflict { index: 1, .. }));
    }

    /// Quantities and overrides must be positive
    #[test]
    fn test_non_positive_quantities() {
        let f = fixture();
        let set = [pick(f.flour_a, "0")];
        assert_eq!(
            validate_selection_set(&f.template, &set),
            Err(SelectionError::NonPositiveQuantity { index: 0 })
        );

        let mut overridden = pick(f.flour_a, "10");
        overridden.quantity_override = Some(dec("-1"));
        assert_eq!(
            validate_selection_set(&f.template, &[overridden]),
            Err(SelectionError::NonPositiveOverride { index: 0 })
        );
    }

    /// The same variant twice is a duplicate
    #[test]
    fn test_duplicate_variant() {
        let f = fixture();
        let set = [pick(f.salt, "1"), pick(f.salt, "2")];
        assert!(matches!(
            validate_selection_set(&f.template, &set),
            Err(SelectionError::DuplicateVariant { index: 1, .. })
        ));
    }

    /// The override drives the effective quantity
    #[test]
    fn test_effective_quantity() {
        let mut selection = pick(Uuid::new_v4(), "10");
        assert_eq!(selection.effective_quantity(), dec("10"));
        selection.quantity_override = Some(dec("12.5"));
        assert_eq!(selection.effective_quantity(), dec("12.5"));
    }

    /// Readiness reports every unsatisfied group
    #[test]
    fn test_readiness_missing_groups() {
        let f = fixture();
        let link_id = Uuid::new_v4();

        let issues = evaluate_link_readiness(link_id, &f.template, &[f.salt]);
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .all(|i| i.kind == ReadinessIssueKind::MissingSelection && i.link_id == link_id));

        let issues = evaluate_link_readiness(link_id, &f.template, &[f.flour_b, f.yeast]);
        assert!(issues.is_empty());
        assert!(ReadinessReport::from_issues(issues).ready);
    }

    /// Two picks in an exactly-one group are ambiguous
    #[test]
    fn test_readiness_ambiguous_selection() {
        let f = fixture();
        let issues = evaluate_link_readiness(
            Uuid::new_v4(),
            &f.template,
            &[f.flour_a, f.flour_b, f.yeast],
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].kind,
            ReadinessIssueKind::AmbiguousSelection { selected: 2 }
        );
        assert_eq!(issues[0].group_name, "Flour");
    }

    /// Subprocesses without groups are always ready
    #[test]
    fn test_ungrouped_subprocess_is_ready() {
        let template = SubprocessTemplate {
            id: Uuid::new_v4(),
            name: "Proofing".to_string(),
            yield_multiplier: None,
            variant_pool: vec![],
            substitute_groups: vec![],
        };
        assert!(!template.requires_selections());
        assert!(evaluate_link_readiness(Uuid::new_v4(), &template, &[]).is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// A set that passes validation never reports an ambiguous group
    #[test]
    fn prop_valid_sets_are_never_ambiguous(
        mask in prop::collection::vec(any::<bool>(), 4),
        quantity in 1i64..10_000,
    ) {
        let f = fixture();
        let candidates = [f.flour_a, f.flour_b, f.yeast, f.salt];
        let set: Vec<ProposedSelection> = candidates
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(id, _)| ProposedSelection {
                variant_id: *id,
                quantity: Decimal::new(quantity, 2),
                quantity_override: None,
            })
            .collect();

        if validate_selection_set(&f.template, &set).is_ok() {
            let selected: Vec<Uuid> = set.iter().map(|s| s.variant_id).collect();
            let issues = evaluate_link_readiness(Uuid::new_v4(), &f.template, &selected);
            prop_assert!(issues
                .iter()
                .all(|i| i.kind == ReadinessIssueKind::MissingSelection));
        }
    }

    /// Readiness depends on the selected variants, not their order
    #[test]
    fn prop_readiness_is_order_independent(reverse in any::<bool>()) {
        let f = fixture();
        let mut selected = vec![f.flour_a, f.yeast, f.salt];
        if reverse {
            selected.reverse();
        }
        let issues = evaluate_link_readiness(Uuid::new_v4(), &f.template, &selected);
        prop_assert!(issues.is_empty());
    }
}
