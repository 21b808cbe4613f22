//! Cost and quantity rollup tests
//!
//! Tests for lot totals including:
//! - Non-negative totals for any input
//! - Idempotent recalculation
//! - Warnings for skipped inputs

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{compute_rollup, LinkCostInput, PricedSelection, RollupInput, RollupWarning};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn selection(quantity: &str, unit_cost: Option<&str>) -> PricedSelection {
    PricedSelection {
        variant_id: Uuid::new_v4(),
        quantity: dec(quantity),
        unit_cost: unit_cost.map(dec),
    }
}

fn link(selections: Vec<PricedSelection>, fixed_costs: &[&str]) -> LinkCostInput {
    LinkCostInput {
        subprocess_id: Uuid::new_v4(),
        yield_multiplier: None,
        selections,
        fixed_costs: fixed_costs.iter().map(|c| dec(c)).collect(),
    }
}

fn input(links: Vec<LinkCostInput>) -> RollupInput {
    RollupInput {
        requested_quantity: dec("100"),
        apply_yield_multipliers: false,
        links,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Material cost is quantity times unit cost, plus fixed costs
    #[test]
    fn test_material_and_fixed_costs() {
        let result = compute_rollup(&input(vec![
            link(
                vec![selection("10", Some("2.50")), selection("4", Some("10"))],
                &["15"],
            ),
            link(vec![selection("1.5", Some("8"))], &[]),
        ]));

        assert_eq!(result.material_cost, dec("77"));
        assert_eq!(result.fixed_cost, dec("15"));
        assert_eq!(result.total_cost, dec("92"));
        assert_eq!(result.priced_selections, 3);
        assert!(result.warnings.is_empty());
    }

    /// A lot with nothing priced rolls up to zero with a warning
    #[test]
    fn test_no_pricing_yields_zero_with_warning() {
        let result = compute_rollup(&input(vec![link(vec![selection("5", None)], &[])]));

        assert_eq!(result.total_cost, Decimal::ZERO);
        assert_eq!(result.warnings[0], RollupWarning::MissingPricing);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, RollupWarning::UnpricedVariant { .. })));
    }

    /// An empty lot costs nothing but keeps its requested quantity
    #[test]
    fn test_empty_lot() {
        let result = compute_rollup(&input(vec![]));
        assert_eq!(result.total_cost, Decimal::ZERO);
        assert_eq!(result.total_quantity, dec("100"));
    }

    /// Negative unit costs and cost items are skipped
    #[test]
    fn test_negative_inputs_are_skipped() {
        let result = compute_rollup(&input(vec![link(
            vec![selection("3", Some("-4")), selection("2", Some("5"))],
            &["-20", "7"],
        )]));

        assert_eq!(result.total_cost, dec("17"));
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, RollupWarning::InvalidUnitCost { .. })));
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, RollupWarning::InvalidCostItem { .. })));
    }

    /// Yield multipliers only apply when enabled
    #[test]
    fn test_yield_multipliers() {
        let mut first = link(vec![], &[]);
        first.yield_multiplier = Some(dec("0.9"));
        let mut second = link(vec![], &[]);
        second.yield_multiplier = Some(dec("0.5"));

        let mut rollup = input(vec![first, second]);
        assert_eq!(compute_rollup(&rollup).total_quantity, dec("100"));

        rollup.apply_yield_multipliers = true;
        assert_eq!(compute_rollup(&rollup).total_quantity, dec("45"));
    }

    /// Invalid multipliers are ignored with a warning
    #[test]
    fn test_invalid_yield_multiplier() {
        let mut bad = link(vec![], &[]);
        bad.yield_multiplier = Some(Decimal::ZERO);
        let mut rollup = input(vec![bad]);
        rollup.apply_yield_multipliers = true;

        let result = compute_rollup(&rollup);
        assert_eq!(result.total_quantity, dec("100"));
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, RollupWarning::InvalidYieldMultiplier { .. })));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-10_000i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn selection_strategy() -> impl Strategy<Value = PricedSelection> {
    (amount_strategy(), prop::option::of(amount_strategy())).prop_map(|(quantity, unit_cost)| {
        PricedSelection {
            variant_id: Uuid::new_v4(),
            quantity,
            unit_cost,
        }
    })
}

fn link_strategy() -> impl Strategy<Value = LinkCostInput> {
    (
        prop::collection::vec(selection_strategy(), 0..5),
        prop::collection::vec(amount_strategy(), 0..3),
        prop::option::of(amount_strategy()),
    )
        .prop_map(|(selections, fixed_costs, yield_multiplier)| LinkCostInput {
            subprocess_id: Uuid::new_v4(),
            yield_multiplier,
            selections,
            fixed_costs,
        })
}

fn rollup_strategy() -> impl Strategy<Value = RollupInput> {
    (
        amount_strategy(),
        any::<bool>(),
        prop::collection::vec(link_strategy(), 0..6),
    )
        .prop_map(|(requested_quantity, apply_yield_multipliers, links)| RollupInput {
            requested_quantity,
            apply_yield_multipliers,
            links,
        })
}

proptest! {
    /// Totals are never negative, whatever the catalog data looks like
    #[test]
    fn prop_totals_non_negative(rollup in rollup_strategy()) {
        let result = compute_rollup(&rollup);
        prop_assert!(result.total_cost >= Decimal::ZERO);
        prop_assert!(result.total_quantity >= Decimal::ZERO);
        prop_assert_eq!(result.total_cost, result.material_cost + result.fixed_cost);
    }

    /// Recalculating unchanged inputs gives the same totals
    #[test]
    fn prop_rollup_is_idempotent(rollup in rollup_strategy()) {
        let first = compute_rollup(&rollup);
        let second = compute_rollup(&rollup);
        prop_assert_eq!(first, second);
    }
}
