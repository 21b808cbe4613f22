//! Cost and quantity rollup for production lots

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the rollup needs for one lot, read in a single snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupInput {
    pub requested_quantity: Decimal,
    pub apply_yield_multipliers: bool,
    pub links: Vec<LinkCostInput>,
}

/// Cost inputs of one linked subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCostInput {
    pub subprocess_id: Uuid,
    pub yield_multiplier: Option<Decimal>,
    pub selections: Vec<PricedSelection>,
    /// Fixed labor/overhead amounts attached to the subprocess
    pub fixed_costs: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedSelection {
    pub variant_id: Uuid,
    /// Override when present, otherwise the selected quantity
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
}

/// Non-blocking findings surfaced alongside the totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RollupWarning {
    /// Zero total with no priced selections contributing
    MissingPricing,
    UnpricedVariant { variant_id: Uuid },
    InvalidUnitCost { variant_id: Uuid },
    InvalidCostItem { subprocess_id: Uuid },
    InvalidYieldMultiplier { subprocess_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupResult {
    pub total_cost: Decimal,
    pub total_quantity: Decimal,
    pub material_cost: Decimal,
    pub fixed_cost: Decimal,
    pub priced_selections: usize,
    pub warnings: Vec<RollupWarning>,
}

/// Compute lot totals. Never returns negative totals; bad inputs are skipped
/// and reported as warnings.
pub fn compute_rollup(input: &RollupInput) -> RollupResult {
    let mut material_cost = Decimal::ZERO;
    let mut fixed_cost = Decimal::ZERO;
    let mut priced_selections = 0;
    let mut warnings = Vec::new();
    let mut multiplier = Decimal::ONE;

    for link in &input.links {
        for selection in &link.selections {
            match selection.unit_cost {
                Some(cost) if cost >= Decimal::ZERO && selection.quantity > Decimal::ZERO => {
                    material_cost += selection.quantity * cost;
                    priced_selections += 1;
                }
                Some(_) => warnings.push(RollupWarning::InvalidUnitCost {
                    variant_id: selection.variant_id,
                }),
                None => warnings.push(RollupWarning::UnpricedVariant {
                    variant_id: selection.variant_id,
                }),
            }
        }

        for amount in &link.fixed_costs {
            if *amount >= Decimal::ZERO {
                fixed_cost += *amount;
            } else {
                warnings.push(RollupWarning::InvalidCostItem {
                    subprocess_id: link.subprocess_id,
                });
            }
        }

        if input.apply_yield_multipliers {
            match link.yield_multiplier {
                Some(m) if m > Decimal::ZERO => multiplier *= m,
                Some(_) => warnings.push(RollupWarning::InvalidYieldMultiplier {
                    subprocess_id: link.subprocess_id,
                }),
                None => {}
            }
        }
    }

    let total_cost = material_cost + fixed_cost;
    if total_cost.is_zero() && priced_selections == 0 {
        warnings.insert(0, RollupWarning::MissingPricing);
    }

    let total_quantity = (input.requested_quantity.max(Decimal::ZERO) * multiplier).normalize();

    RollupResult {
        total_cost: total_cost.normalize(),
        total_quantity,
        material_cost: material_cost.normalize(),
        fixed_cost: fixed_cost.normalize(),
        priced_selections,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(selections: Vec<PricedSelection>, fixed: Vec<i64>, y: Option<Decimal>) -> LinkCostInput {
        LinkCostInput {
            subprocess_id: Uuid::new_v4(),
            yield_multiplier: y,
            selections,
            fixed_costs: fixed.into_iter().map(Decimal::from).collect(),
        }
    }

    fn priced(qty: i64, cost: Option<i64>) -> PricedSelection {
        PricedSelection {
            variant_id: Uuid::new_v4(),
            quantity: Decimal::from(qty),
            unit_cost: cost.map(Decimal::from),
        }
    }

    #[test]
    fn test_material_plus_fixed() {
        let input = RollupInput {
            requested_quantity: Decimal::from(100),
            apply_yield_multipliers: false,
            links: vec![
                link(vec![priced(10, Some(3)), priced(2, Some(50))], vec![40], None),
                link(vec![priced(5, Some(1))], vec![], None),
            ],
        };
        let result = compute_rollup(&input);
        assert_eq!(result.material_cost, Decimal::from(135));
        assert_eq!(result.fixed_cost, Decimal::from(40));
        assert_eq!(result.total_cost, Decimal::from(175));
        assert_eq!(result.total_quantity, Decimal::from(100));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_no_pricing_is_zero_with_warning() {
        let input = RollupInput {
            requested_quantity: Decimal::from(10),
            apply_yield_multipliers: false,
            links: vec![link(vec![priced(4, None)], vec![], None)],
        };
        let result = compute_rollup(&input);
        assert_eq!(result.total_cost, Decimal::ZERO);
        assert_eq!(result.warnings[0], RollupWarning::MissingPricing);
        assert!(matches!(result.warnings[1], RollupWarning::UnpricedVariant { .. }));
    }

    #[test]
    fn test_yield_multipliers_only_when_enabled() {
        let links = vec![
            link(vec![], vec![], Some(Decimal::new(5, 1))),
            link(vec![], vec![], Some(Decimal::from(3))),
        ];
        let mut input = RollupInput {
            requested_quantity: Decimal::from(10),
            apply_yield_multipliers: false,
            links,
        };
        assert_eq!(compute_rollup(&input).total_quantity, Decimal::from(10));
        input.apply_yield_multipliers = true;
        assert_eq!(compute_rollup(&input).total_quantity, Decimal::from(15));
    }

    #[test]
    fn test_negative_inputs_never_reduce_totals() {
        let input = RollupInput {
            requested_quantity: Decimal::from(-5),
            apply_yield_multipliers: true,
            links: vec![link(
                vec![priced(2, Some(-7))],
                vec![-100],
                Some(Decimal::from(-2)),
            )],
        };
        let result = compute_rollup(&input);
        assert_eq!(result.total_cost, Decimal::ZERO);
        assert_eq!(result.total_quantity, Decimal::ZERO);
        assert_eq!(result.warnings.len(), 4);
    }
}
