use rust_decimal_macros::dec;
use uuid::Uuid;

use repricer_rules::context::PricingContext;
use repricer_rules::engine::RepricingEngine;
use repricer_rules::guardrails::{ConstraintKind, SafetyConstraint, ViolationAction};
use repricer_rules::rules::{
    Operator, PricingRule, RuleAction, RuleCondition, RuleSet, RuleSetScope, Signal,
};
use repricer_rules::strategy::{
    ConditionalStrategy, PricingStrategy, StrategyBundle, StrategyKind,
};
use repricer_rules::rules::SignalCondition;

fn rule(name: &str, priority: i32, condition: Option<RuleCondition>, action: RuleAction) -> PricingRule {
    PricingRule {
        id: Uuid::new_v4(),
        name: name.to_string(),
        priority,
        is_active: true,
        condition,
        action,
        weight: 0.9,
    }
}

fn rule_set(name: &str, scope: RuleSetScope, rules: Vec<PricingRule>) -> RuleSet {
    RuleSet {
        id: Uuid::new_v4(),
        name: name.to_string(),
        priority: 100,
        is_active: true,
        scope,
        rules,
    }
}

fn strategy(name: &str, is_default: bool, rule_sets: Vec<RuleSet>) -> PricingStrategy {
    PricingStrategy {
        id: Uuid::new_v4(),
        name: name.to_string(),
        kind: StrategyKind::RuleBased,
        is_active: true,
        is_default,
        rule_sets,
        constraints: vec![SafetyConstraint {
            id: Uuid::new_v4(),
            name: "max-daily-swing".to_string(),
            kind: ConstraintKind::MaxPriceChangePercent(dec!(0.20)),
            action: ViolationAction::Adjust,
            is_active: true,
        }],
        optimizer: None,
        experiment_fraction: 0.0,
        switches: Vec::new(),
    }
}

/// Marketplace seller with a crowded market: the competitive strategy
/// undercuts the lowest eligible offer and the result clears every guardrail.
#[test]
fn competitive_strategy_undercuts_and_clears_guardrails() {
    let bundle = StrategyBundle {
        strategies: vec![strategy(
            "competitive",
            true,
            vec![rule_set(
                "amazon-electronics",
                RuleSetScope {
                    marketplaces: vec!["amazon_us".to_string()],
                    ..Default::default()
                },
                vec![rule(
                    "undercut-lowest",
                    10,
                    Some(RuleCondition::signal(
                        Signal::CompetitorCount,
                        Operator::Gte(1.0),
                    )),
                    RuleAction::UndercutCompetitorAmount(dec!(0.25)),
                )],
            )],
        )],
    };

    let ctx = PricingContext {
        marketplace: "amazon_us".to_string(),
        current_price: dec!(34.99),
        cost: dec!(18.00),
        fees: dec!(6.00),
        target_margin: 0.15,
        competitor_prices: vec![dec!(33.40), dec!(35.10), dec!(36.00)],
        ..Default::default()
    };

    let decision = RepricingEngine::default().evaluate(&bundle, None, &ctx);

    // 33.40 - 0.25 = 33.15, floor is (18 + 6) / 0.85 = 28.24
    assert_eq!(decision.new_price, dec!(33.15));
    assert!(decision.guardrails_passed);
    assert!(decision.price_changed());
    assert_eq!(decision.rules_applied, vec!["undercut-lowest".to_string()]);
    assert!(decision.reason.contains("undercut-lowest"));
}

/// A rule set scoped to another marketplace must not contribute rules.
#[test]
fn out_of_scope_rule_sets_do_not_fire() {
    let bundle = StrategyBundle {
        strategies: vec![strategy(
            "competitive",
            true,
            vec![rule_set(
                "flipkart-only",
                RuleSetScope {
                    marketplaces: vec!["flipkart_in".to_string()],
                    ..Default::default()
                },
                vec![rule(
                    "undercut-lowest",
                    10,
                    None,
                    RuleAction::UndercutCompetitorPercent(dec!(2)),
                )],
            )],
        )],
    };

    let ctx = PricingContext {
        marketplace: "amazon_us".to_string(),
        current_price: dec!(20.00),
        cost: dec!(5.00),
        target_margin: 0.1,
        competitor_prices: vec![dec!(19.00)],
        ..Default::default()
    };

    let decision = RepricingEngine::default().evaluate(&bundle, None, &ctx);
    assert_eq!(decision.new_price, dec!(20.00));
    assert_eq!(decision.reason, "no rules applied");
}

/// Aged inventory triggers the conditional switch into the clearance
/// strategy, which discounts but still respects the margin floor.
#[test]
fn conditional_switch_routes_aged_inventory_to_clearance() {
    let clearance = PricingStrategy {
        constraints: Vec::new(),
        ..strategy(
            "clearance",
            false,
            vec![rule_set(
                "age-discount",
                RuleSetScope::default(),
                vec![rule(
                    "aged-stock-discount",
                    10,
                    None,
                    RuleAction::DecreasePercent(dec!(10)),
                )],
            )],
        )
    };
    let clearance_id = clearance.id;

    let mut competitive = strategy(
        "competitive",
        true,
        vec![rule_set(
            "hold",
            RuleSetScope::default(),
            vec![rule("hold-price", 10, None, RuleAction::IncreaseAmount(dec!(0)))],
        )],
    );
    competitive.switches.push(ConditionalStrategy {
        id: Uuid::new_v4(),
        priority: 10,
        is_active: true,
        condition: SignalCondition {
            signal: Signal::InventoryAgeDays,
            op: Operator::Gt(90.0),
        },
        target_strategy_id: clearance_id,
    });

    let bundle = StrategyBundle {
        strategies: vec![competitive, clearance],
    };

    let aged = PricingContext {
        current_price: dec!(40.00),
        cost: dec!(12.00),
        fees: dec!(4.00),
        target_margin: 0.2,
        inventory_age_days: 120,
        ..Default::default()
    };

    let decision = RepricingEngine::default().evaluate(&bundle, None, &aged);
    assert_eq!(decision.strategy_name, "clearance");
    // 40.00 - 10% = 36.00, floor is (12 + 4) / 0.8 = 20.00
    assert_eq!(decision.new_price, dec!(36.00));
    assert!(decision.guardrails_passed);

    let fresh = PricingContext {
        inventory_age_days: 10,
        ..aged
    };
    let decision = RepricingEngine::default().evaluate(&bundle, None, &fresh);
    assert_eq!(decision.strategy_name, "competitive");
}

/// The absolute invariant: no strategy output may land under
/// cost + fees + target margin, whatever the rules say.
#[test]
fn margin_floor_is_never_crossed() {
    let bundle = StrategyBundle {
        strategies: vec![strategy(
            "race-to-bottom",
            true,
            vec![rule_set(
                "all",
                RuleSetScope::default(),
                vec![rule(
                    "slash",
                    10,
                    None,
                    RuleAction::SetPrice(dec!(1.00)),
                )],
            )],
        )],
    };

    let ctx = PricingContext {
        current_price: dec!(30.00),
        cost: dec!(15.00),
        fees: dec!(5.20),
        target_margin: 0.2,
        ..Default::default()
    };

    // The max-change constraint clamps 1.00 up to 24.00, which is still
    // under the (15 + 5.20) / 0.8 = 25.25 floor.
    let decision = RepricingEngine::default().evaluate(&bundle, None, &ctx);

    assert!(!decision.guardrails_passed);
    assert_eq!(decision.new_price, dec!(30.00));
    assert!(decision.warnings.iter().any(|w| w.contains("margin floor")));
}

/// Rules chain in priority order over the running candidate price.
#[test]
fn rules_compound_in_priority_order() {
    let bundle = StrategyBundle {
        strategies: vec![strategy(
            "seasonal",
            true,
            vec![rule_set(
                "all",
                RuleSetScope::default(),
                vec![
                    rule(
                        "weekend-premium",
                        20,
                        None,
                        RuleAction::IncreasePercent(dec!(10)),
                    ),
                    rule(
                        "base-markup",
                        10,
                        None,
                        RuleAction::IncreaseAmount(dec!(2.00)),
                    ),
                ],
            )],
        )],
    };

    let ctx = PricingContext {
        current_price: dec!(100.00),
        cost: dec!(40.00),
        target_margin: 0.1,
        ..Default::default()
    };

    let decision = RepricingEngine::default().evaluate(&bundle, None, &ctx);
    // base-markup first (priority 10): 102.00, then +10%: 112.20, a 12.2%
    // swing that stays inside the 20% max-change constraint
    assert_eq!(decision.new_price, dec!(112.20));
    assert_eq!(
        decision.rules_applied,
        vec!["base-markup".to_string(), "weekend-premium".to_string()]
    );
}
