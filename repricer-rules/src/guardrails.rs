use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::PricingContext;

/// What happens when a constraint is violated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    /// Revert to the current price.
    Block,
    /// Clamp to the nearest compliant price.
    Adjust,
    /// Record the violation but let the price through.
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    MinPriceAbsolute(Decimal),
    /// Minimum price expressed as cost plus a flat amount.
    MinPriceCostPlus(Decimal),
    MaxPriceAbsolute(Decimal),
    /// Maximum price expressed as a multiple of cost.
    MaxPriceMultiplier(Decimal),
    /// Maximum relative change per evaluation, as a fraction (0.10 = 10%).
    MaxPriceChangePercent(Decimal),
    /// Minimum margin as a fraction of the sale price.
    MinMarginPercent(Decimal),
    /// Only listings on these fulfillment channels ("fba", "fbm", "fbf")
    /// may be repriced under this strategy.
    FulfillmentFilter(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConstraint {
    pub id: Uuid,
    pub name: String,
    pub kind: ConstraintKind,
    pub action: ViolationAction,
    pub is_active: bool,
}

/// Outcome of checking one constraint against one candidate price.
#[derive(Debug, Clone)]
pub struct ConstraintCheck {
    pub passed: bool,
    pub message: String,
    pub suggested_price: Option<Decimal>,
}

impl ConstraintCheck {
    fn ok() -> Self {
        Self {
            passed: true,
            message: "constraint satisfied".to_string(),
            suggested_price: None,
        }
    }
}

impl SafetyConstraint {
    pub fn check(&self, price: Decimal, ctx: &PricingContext) -> ConstraintCheck {
        match &self.kind {
            ConstraintKind::MinPriceAbsolute(threshold) => {
                if price < *threshold {
                    return ConstraintCheck {
                        passed: false,
                        message: format!("price {} below minimum {}", price, threshold),
                        suggested_price: Some(*threshold),
                    };
                }
            }
            ConstraintKind::MinPriceCostPlus(amount) => {
                let min_price = ctx.cost + *amount;
                if price < min_price {
                    return ConstraintCheck {
                        passed: false,
                        message: format!("price {} below cost plus {}", price, amount),
                        suggested_price: Some(min_price),
                    };
                }
            }
            ConstraintKind::MaxPriceAbsolute(threshold) => {
                if price > *threshold {
                    return ConstraintCheck {
                        passed: false,
                        message: format!("price {} above maximum {}", price, threshold),
                        suggested_price: Some(*threshold),
                    };
                }
            }
            ConstraintKind::MaxPriceMultiplier(multiplier) => {
                let cap = ctx.cost * *multiplier;
                if price > cap {
                    return ConstraintCheck {
                        passed: false,
                        message: format!("price {} above {}x cost", price, multiplier),
                        suggested_price: Some(cap),
                    };
                }
            }
            ConstraintKind::MaxPriceChangePercent(threshold) => {
                if ctx.current_price > Decimal::ZERO {
                    let change = (price - ctx.current_price).abs() / ctx.current_price;
                    if change > *threshold {
                        let max_change = ctx.current_price * *threshold;
                        let suggested = if price > ctx.current_price {
                            ctx.current_price + max_change
                        } else {
                            ctx.current_price - max_change
                        };
                        return ConstraintCheck {
                            passed: false,
                            message: format!(
                                "price change {:.4} exceeds maximum {}",
                                change, threshold
                            ),
                            suggested_price: Some(suggested),
                        };
                    }
                }
            }
            ConstraintKind::FulfillmentFilter(allowed) => {
                if let Some(fulfillment) = ctx.fulfillment {
                    if !allowed.iter().any(|f| f == fulfillment.as_str()) {
                        return ConstraintCheck {
                            passed: false,
                            message: format!(
                                "fulfillment {} not eligible for repricing",
                                fulfillment.as_str()
                            ),
                            suggested_price: None,
                        };
                    }
                }
            }
            ConstraintKind::MinMarginPercent(threshold) => {
                if price > Decimal::ZERO {
                    let margin = (price - ctx.cost) / price;
                    if margin < *threshold {
                        // Smallest price that yields the required margin
                        let min_price = ctx.cost / (Decimal::ONE - *threshold);
                        return ConstraintCheck {
                            passed: false,
                            message: format!(
                                "margin {:.4} below minimum {}",
                                margin, threshold
                            ),
                            suggested_price: Some(min_price),
                        };
                    }
                }
            }
        }

        ConstraintCheck::ok()
    }
}

#[derive(Debug, Clone)]
pub struct GuardrailOutcome {
    pub final_price: Decimal,
    pub passed: bool,
    pub warnings: Vec<String>,
}

/// Run the configured constraints over a candidate price, then enforce the
/// listing bounds and the non-negotiable margin floor (cost + fees + target
/// margin). The floor rejects outright: no constraint action can weaken it.
pub fn apply_guardrails(
    proposed: Decimal,
    ctx: &PricingContext,
    constraints: &[SafetyConstraint],
) -> GuardrailOutcome {
    let mut price = proposed;
    let mut passed = true;
    let mut warnings = Vec::new();

    for constraint in constraints.iter().filter(|c| c.is_active) {
        let check = constraint.check(price, ctx);
        if check.passed {
            continue;
        }

        passed = false;
        match constraint.action {
            ViolationAction::Block => {
                price = ctx.current_price;
                warnings.push(format!(
                    "constraint '{}' blocked price change: {}",
                    constraint.name, check.message
                ));
            }
            ViolationAction::Adjust => {
                // No compliant price to clamp to means Adjust falls back to
                // reverting, same as Block.
                price = check.suggested_price.unwrap_or(ctx.current_price);
                warnings.push(format!(
                    "constraint '{}' adjusted price: {}",
                    constraint.name, check.message
                ));
            }
            ViolationAction::Warn => {
                warnings.push(format!(
                    "constraint '{}': {}",
                    constraint.name, check.message
                ));
            }
        }
    }

    // Listing bounds clamp rather than block.
    if let Some(min) = ctx.min_price {
        if price < min {
            warnings.push(format!("raised to listing minimum {}", min));
            price = min;
        }
    }
    if let Some(max) = ctx.max_price {
        if price > max {
            warnings.push(format!("lowered to listing maximum {}", max));
            price = max;
        }
    }

    // The absolute floor. A candidate below it is rejected, never clamped:
    // an operator who wants clamping configures a MinMarginPercent/Adjust
    // constraint above.
    let floor = ctx.margin_floor();
    if price < floor {
        warnings.push(format!(
            "price {} violates margin floor {}, change rejected",
            price, floor
        ));
        price = ctx.current_price;
        passed = false;
    } else if ctx.max_price.is_some_and(|max| floor > max) {
        warnings.push(format!(
            "margin floor {} exceeds listing maximum, change rejected",
            floor
        ));
        price = ctx.current_price;
        passed = false;
    }

    GuardrailOutcome {
        final_price: price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        passed,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn constraint(kind: ConstraintKind, action: ViolationAction) -> SafetyConstraint {
        SafetyConstraint {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            kind,
            action,
            is_active: true,
        }
    }

    fn ctx() -> PricingContext {
        PricingContext {
            current_price: dec!(29.99),
            cost: dec!(15.00),
            fees: dec!(0.00),
            target_margin: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_min_margin_passes_at_healthy_price() {
        let c = constraint(
            ConstraintKind::MinMarginPercent(dec!(0.15)),
            ViolationAction::Warn,
        );
        let check = c.check(dec!(20.00), &ctx());
        assert!(check.passed);
    }

    #[test]
    fn test_min_margin_suggests_compliant_price() {
        let c = constraint(
            ConstraintKind::MinMarginPercent(dec!(0.25)),
            ViolationAction::Adjust,
        );
        // 16.67 gives roughly 10% margin on a 15.00 cost
        let check = c.check(dec!(16.67), &ctx());
        assert!(!check.passed);
        // 15 / (1 - 0.25) = 20
        assert_eq!(check.suggested_price, Some(dec!(20.00)));
    }

    #[test]
    fn test_max_price_change_clamps_to_band() {
        let c = constraint(
            ConstraintKind::MaxPriceChangePercent(dec!(0.10)),
            ViolationAction::Adjust,
        );
        // ~20% jump from 29.99
        let check = c.check(dec!(35.99), &ctx());
        assert!(!check.passed);
        assert_eq!(check.suggested_price, Some(dec!(32.989)));
    }

    #[test]
    fn test_block_reverts_to_current_price() {
        let constraints = vec![constraint(
            ConstraintKind::MaxPriceAbsolute(dec!(40.00)),
            ViolationAction::Block,
        )];
        let outcome = apply_guardrails(dec!(45.00), &ctx(), &constraints);

        assert!(!outcome.passed);
        assert_eq!(outcome.final_price, dec!(29.99));
    }

    #[test]
    fn test_margin_floor_rejects_below_floor_price() {
        let context = PricingContext {
            current_price: dec!(29.99),
            cost: dec!(15.00),
            fees: dec!(5.00),
            target_margin: 0.2,
            ..Default::default()
        };
        // floor is (15 + 5) / 0.8 = 25.00
        let outcome = apply_guardrails(dec!(24.00), &context, &[]);

        assert!(!outcome.passed);
        assert_eq!(outcome.final_price, dec!(29.99));
        assert!(outcome.warnings.iter().any(|w| w.contains("margin floor")));
    }

    #[test]
    fn test_warn_constraint_cannot_override_floor() {
        let context = PricingContext {
            current_price: dec!(29.99),
            cost: dec!(15.00),
            fees: dec!(5.00),
            target_margin: 0.2,
            ..Default::default()
        };
        let constraints = vec![constraint(
            ConstraintKind::MinPriceAbsolute(dec!(24.50)),
            ViolationAction::Warn,
        )];
        let outcome = apply_guardrails(dec!(24.00), &context, &constraints);

        assert!(!outcome.passed);
        assert_eq!(outcome.final_price, dec!(29.99));
    }

    #[test]
    fn test_fulfillment_filter_blocks_ineligible_channel() {
        use repricer_catalog::FulfillmentMethod;

        let context = PricingContext {
            fulfillment: Some(FulfillmentMethod::Fbm),
            ..ctx()
        };
        let constraints = vec![constraint(
            ConstraintKind::FulfillmentFilter(vec!["fba".to_string()]),
            ViolationAction::Block,
        )];
        let outcome = apply_guardrails(dec!(27.50), &context, &constraints);

        assert!(!outcome.passed);
        assert_eq!(outcome.final_price, dec!(29.99));

        let fba = PricingContext {
            fulfillment: Some(FulfillmentMethod::Fba),
            ..ctx()
        };
        let outcome = apply_guardrails(dec!(27.50), &fba, &constraints);
        assert!(outcome.passed);
        assert_eq!(outcome.final_price, dec!(27.50));
    }

    #[test]
    fn test_listing_bounds_clamp() {
        let context = PricingContext {
            current_price: dec!(29.99),
            cost: dec!(10.00),
            max_price: Some(dec!(34.99)),
            target_margin: 0.0,
            ..Default::default()
        };
        let outcome = apply_guardrails(dec!(38.00), &context, &[]);

        assert!(outcome.passed);
        assert_eq!(outcome.final_price, dec!(34.99));
    }
}
