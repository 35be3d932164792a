use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{ContextSignals, PricingContext};
use crate::guardrails::apply_guardrails;
use crate::optimizer::{OptimizerConfig, PriceOptimizer};
use crate::rules::RuleSet;
use crate::strategy::{PricingStrategy, StrategyBundle, StrategyKind};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Optimizer settings used when a strategy does not carry its own.
    pub optimizer: OptimizerConfig,
}

/// The outcome of evaluating one listing against one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingDecision {
    pub listing_id: Uuid,
    pub strategy_id: Option<Uuid>,
    pub strategy_name: String,
    pub current_price: Decimal,
    pub new_price: Decimal,
    pub confidence: f64,
    pub reason: String,
    pub rules_applied: Vec<String>,
    pub guardrails_passed: bool,
    pub warnings: Vec<String>,
    pub metadata: serde_json::Value,
    pub evaluated_at: DateTime<Utc>,
}

impl PricingDecision {
    pub fn price_changed(&self) -> bool {
        self.new_price != self.current_price
    }

    /// Relative change magnitude, for the approval threshold.
    pub fn change_fraction(&self) -> f64 {
        if self.current_price.is_zero() {
            return 0.0;
        }
        ((self.new_price - self.current_price).abs() / self.current_price)
            .to_f64()
            .unwrap_or(0.0)
    }
}

/// Context Evaluator -> Strategy Selector -> rules or optimizer -> Guardrail
/// Filter. Emission is the caller's job.
pub struct RepricingEngine {
    config: EngineConfig,
}

impl RepricingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        bundle: &StrategyBundle,
        requested_strategy: Option<Uuid>,
        ctx: &PricingContext,
    ) -> PricingDecision {
        let signals = ContextSignals::derive(ctx);

        let strategy = match bundle.select(requested_strategy, ctx, &signals) {
            Some(strategy) => strategy,
            None => {
                return PricingDecision {
                    listing_id: ctx.listing_id,
                    strategy_id: None,
                    strategy_name: String::new(),
                    current_price: ctx.current_price,
                    new_price: ctx.current_price,
                    confidence: 0.0,
                    reason: "no active pricing strategy".to_string(),
                    rules_applied: Vec::new(),
                    guardrails_passed: false,
                    warnings: vec!["no pricing strategy available".to_string()],
                    metadata: serde_json::json!({}),
                    evaluated_at: ctx.evaluated_at,
                };
            }
        };

        let use_optimizer = match strategy.kind {
            StrategyKind::RuleBased => false,
            StrategyKind::Optimizer => true,
            StrategyKind::Hybrid => experiment_gate(strategy.experiment_fraction),
        };

        let mut warnings = Vec::new();
        let mut metadata = serde_json::json!({
            "competitor_count": signals.competitor_count,
            "price_rank": signals.price_rank,
        });

        let (candidate, confidence, reason, rules_applied) = if use_optimizer {
            match self.run_optimizer(strategy, ctx, &signals, &mut metadata) {
                Ok(result) => result,
                Err(message) => {
                    // Optimizer could not produce a price; fall back to the
                    // strategy's rules, as the source platform fell back to
                    // its simpler path.
                    warnings.push(message);
                    self.run_rules(strategy, ctx, &signals, &mut warnings)
                }
            }
        } else {
            self.run_rules(strategy, ctx, &signals, &mut warnings)
        };

        let outcome = apply_guardrails(candidate, ctx, &strategy.constraints);
        warnings.extend(outcome.warnings);

        tracing::info!(
            listing = %ctx.listing_id,
            strategy = %strategy.name,
            current = %ctx.current_price,
            proposed = %outcome.final_price,
            passed = outcome.passed,
            "repricing evaluated"
        );

        PricingDecision {
            listing_id: ctx.listing_id,
            strategy_id: Some(strategy.id),
            strategy_name: strategy.name.clone(),
            current_price: ctx.current_price,
            new_price: outcome.final_price,
            confidence,
            reason,
            rules_applied,
            guardrails_passed: outcome.passed,
            warnings,
            metadata,
            evaluated_at: ctx.evaluated_at,
        }
    }

    /// Evaluate many contexts without side effects.
    pub fn simulate(
        &self,
        bundle: &StrategyBundle,
        requested_strategy: Option<Uuid>,
        contexts: &[PricingContext],
    ) -> Vec<PricingDecision> {
        contexts
            .iter()
            .map(|ctx| self.evaluate(bundle, requested_strategy, ctx))
            .collect()
    }

    fn run_rules(
        &self,
        strategy: &PricingStrategy,
        ctx: &PricingContext,
        signals: &ContextSignals,
        warnings: &mut Vec<String>,
    ) -> (Decimal, f64, String, Vec<String>) {
        let rules = RuleSet::collect_applicable(&strategy.rule_sets, ctx);

        let mut candidate = ctx.current_price;
        let mut confidence: f64 = 1.0;
        let mut reasons = Vec::new();
        let mut applied = Vec::new();

        for rule in rules {
            if !rule.applies(ctx, signals) {
                continue;
            }

            match rule.action.apply(candidate, ctx, signals) {
                Some(next) if next != candidate => {
                    tracing::debug!(
                        rule = %rule.name,
                        from = %candidate,
                        to = %next,
                        "rule applied"
                    );
                    reasons.push(format!("{}: {}", rule.name, rule.action.describe()));
                    applied.push(rule.name.clone());
                    confidence *= rule.weight;
                    candidate = next;
                }
                Some(_) => {}
                None => {
                    warnings.push(format!(
                        "rule '{}' skipped: no pricing reference in context",
                        rule.name
                    ));
                }
            }
        }

        let reason = if reasons.is_empty() {
            "no rules applied".to_string()
        } else {
            reasons.join("; ")
        };

        (candidate, confidence.min(1.0), reason, applied)
    }

    fn run_optimizer(
        &self,
        strategy: &PricingStrategy,
        ctx: &PricingContext,
        signals: &ContextSignals,
        metadata: &mut serde_json::Value,
    ) -> Result<(Decimal, f64, String, Vec<String>), String> {
        let config = strategy
            .optimizer
            .clone()
            .unwrap_or_else(|| self.config.optimizer.clone());

        let best = PriceOptimizer::new(config)
            .optimize(ctx, signals)
            .map_err(|e| format!("optimizer unavailable: {}", e))?;

        metadata["expected_demand"] = serde_json::json!(best.expected_demand);
        metadata["expected_sales"] = serde_json::json!(best.expected_sales);
        metadata["expected_revenue"] = serde_json::json!(best.expected_revenue);
        metadata["expected_profit"] = serde_json::json!(best.expected_profit);
        metadata["buy_box_probability"] = serde_json::json!(best.buy_box_probability);
        metadata["optimization_score"] = serde_json::json!(best.score);

        let reason = format!("optimizer selected {} (score {:.2})", best.price, best.score);

        Ok((
            best.price,
            best.buy_box_probability.clamp(0.0, 1.0),
            reason,
            vec!["price_optimizer".to_string()],
        ))
    }
}

impl Default for RepricingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Route a fraction of hybrid evaluations through the optimizer.
fn experiment_gate(fraction: f64) -> bool {
    if fraction <= 0.0 {
        return false;
    }
    if fraction >= 1.0 {
        return true;
    }
    use rand::Rng;
    rand::thread_rng().gen_bool(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrails::{ConstraintKind, SafetyConstraint, ViolationAction};
    use crate::rules::{Operator, PricingRule, RuleAction, RuleCondition, RuleSetScope, Signal};
    use rust_decimal_macros::dec;

    fn undercut_strategy() -> PricingStrategy {
        PricingStrategy {
            id: Uuid::new_v4(),
            name: "competitive".to_string(),
            kind: StrategyKind::RuleBased,
            is_active: true,
            is_default: true,
            rule_sets: vec![RuleSet {
                id: Uuid::new_v4(),
                name: "undercut".to_string(),
                priority: 100,
                is_active: true,
                scope: RuleSetScope::default(),
                rules: vec![PricingRule {
                    id: Uuid::new_v4(),
                    name: "undercut-lowest".to_string(),
                    priority: 10,
                    is_active: true,
                    condition: Some(RuleCondition::signal(
                        Signal::CompetitorCount,
                        Operator::Gte(1.0),
                    )),
                    action: RuleAction::UndercutCompetitorPercent(dec!(1)),
                    weight: 0.9,
                }],
            }],
            constraints: vec![SafetyConstraint {
                id: Uuid::new_v4(),
                name: "max-swing".to_string(),
                kind: ConstraintKind::MaxPriceChangePercent(dec!(0.25)),
                action: ViolationAction::Adjust,
                is_active: true,
            }],
            optimizer: None,
            experiment_fraction: 0.0,
            switches: Vec::new(),
        }
    }

    #[test]
    fn test_no_strategy_yields_no_change() {
        let engine = RepricingEngine::default();
        let ctx = PricingContext {
            current_price: dec!(29.99),
            ..Default::default()
        };

        let decision = engine.evaluate(&StrategyBundle::default(), None, &ctx);
        assert_eq!(decision.new_price, dec!(29.99));
        assert_eq!(decision.confidence, 0.0);
        assert!(!decision.guardrails_passed);
        assert_eq!(decision.reason, "no active pricing strategy");
    }

    #[test]
    fn test_undercut_applies_and_passes_guardrails() {
        let engine = RepricingEngine::default();
        let bundle = StrategyBundle {
            strategies: vec![undercut_strategy()],
        };
        let ctx = PricingContext {
            current_price: dec!(29.99),
            cost: dec!(15.00),
            fees: dec!(4.00),
            target_margin: 0.2,
            competitor_prices: vec![dec!(28.50), dec!(31.00)],
            ..Default::default()
        };

        let decision = engine.evaluate(&bundle, None, &ctx);
        // 28.50 * 0.99 = 28.215 -> 28.22, above the 23.75 floor
        assert_eq!(decision.new_price, dec!(28.22));
        assert!(decision.guardrails_passed);
        assert_eq!(decision.rules_applied, vec!["undercut-lowest".to_string()]);
        assert!((decision.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_floor_rejects_deep_undercut() {
        let engine = RepricingEngine::default();
        let bundle = StrategyBundle {
            strategies: vec![undercut_strategy()],
        };
        let ctx = PricingContext {
            current_price: dec!(25.00),
            cost: dec!(15.00),
            fees: dec!(4.00),
            target_margin: 0.2,
            // undercutting this competitor would land below the 23.75 floor
            competitor_prices: vec![dec!(21.00)],
            ..Default::default()
        };

        let decision = engine.evaluate(&bundle, None, &ctx);
        assert_eq!(decision.new_price, dec!(25.00));
        assert!(!decision.guardrails_passed);
        assert!(decision
            .warnings
            .iter()
            .any(|w| w.contains("margin floor")));
    }

    #[test]
    fn test_simulate_is_side_effect_free_batch() {
        let engine = RepricingEngine::default();
        let bundle = StrategyBundle {
            strategies: vec![undercut_strategy()],
        };
        let contexts = vec![
            PricingContext {
                current_price: dec!(10.00),
                cost: dec!(2.00),
                competitor_prices: vec![dec!(9.00)],
                target_margin: 0.1,
                ..Default::default()
            },
            PricingContext {
                current_price: dec!(50.00),
                cost: dec!(20.00),
                target_margin: 0.1,
                ..Default::default()
            },
        ];

        let decisions = engine.simulate(&bundle, None, &contexts);
        assert_eq!(decisions.len(), 2);
        // Second context has no competitors: nothing to undercut
        assert_eq!(decisions[1].new_price, dec!(50.00));
        assert_eq!(decisions[1].reason, "no rules applied");
    }

    #[test]
    fn test_hybrid_full_fraction_uses_optimizer() {
        let engine = RepricingEngine::default();
        let mut strategy = undercut_strategy();
        strategy.kind = StrategyKind::Hybrid;
        strategy.experiment_fraction = 1.0;
        let bundle = StrategyBundle {
            strategies: vec![strategy],
        };
        let ctx = PricingContext {
            current_price: dec!(25.00),
            cost: dec!(10.00),
            fees: dec!(2.00),
            min_price: Some(dec!(13.00)),
            max_price: Some(dec!(30.00)),
            buy_box_price: Some(dec!(24.00)),
            sales_velocity: 3.0,
            target_margin: 0.1,
            ..Default::default()
        };

        let decision = engine.evaluate(&bundle, None, &ctx);
        assert_eq!(decision.rules_applied, vec!["price_optimizer".to_string()]);
        assert!(decision.metadata["optimization_score"].is_number());
    }
}
