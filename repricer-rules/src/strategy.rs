use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{ContextSignals, PricingContext};
use crate::guardrails::SafetyConstraint;
use crate::optimizer::OptimizerConfig;
use crate::rules::{RuleSet, SignalCondition};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RuleBased,
    Optimizer,
    /// Rule-based with a fraction of evaluations routed to the optimizer.
    Hybrid,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RuleBased => "rule_based",
            StrategyKind::Optimizer => "optimizer",
            StrategyKind::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingStrategy {
    pub id: Uuid,
    pub name: String,
    pub kind: StrategyKind,
    pub is_active: bool,
    pub is_default: bool,
    pub rule_sets: Vec<RuleSet>,
    pub constraints: Vec<SafetyConstraint>,
    pub optimizer: Option<OptimizerConfig>,
    /// Hybrid only: fraction of evaluations sent through the optimizer.
    pub experiment_fraction: f64,
    /// Ordered switches away from this strategy.
    pub switches: Vec<ConditionalStrategy>,
}

/// Context-triggered strategy switching: when the condition holds, the
/// evaluation runs under the target strategy instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalStrategy {
    pub id: Uuid,
    pub priority: i32,
    pub is_active: bool,
    pub condition: SignalCondition,
    pub target_strategy_id: Uuid,
}

/// Everything the engine needs for one organization's evaluations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyBundle {
    pub strategies: Vec<PricingStrategy>,
}

impl StrategyBundle {
    pub fn get(&self, id: Uuid) -> Option<&PricingStrategy> {
        self.strategies.iter().find(|s| s.id == id && s.is_active)
    }

    pub fn default_strategy(&self) -> Option<&PricingStrategy> {
        self.strategies.iter().find(|s| s.is_active && s.is_default)
    }

    /// Resolve the strategy for an evaluation: the requested (or default)
    /// strategy, redirected by its first matching conditional switch. One
    /// hop only, so a misconfigured pair of switches cannot loop.
    pub fn select(
        &self,
        requested: Option<Uuid>,
        ctx: &PricingContext,
        signals: &ContextSignals,
    ) -> Option<&PricingStrategy> {
        let base = match requested {
            Some(id) => self.get(id)?,
            None => self.default_strategy()?,
        };

        let mut switches: Vec<&ConditionalStrategy> =
            base.switches.iter().filter(|s| s.is_active).collect();
        switches.sort_by_key(|s| s.priority);

        for switch in switches {
            if switch.condition.matches(ctx, signals) {
                if let Some(target) = self.get(switch.target_strategy_id) {
                    tracing::debug!(
                        from = %base.name,
                        to = %target.name,
                        "conditional strategy switch"
                    );
                    return Some(target);
                }
            }
        }

        Some(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Operator, Signal};

    fn strategy(name: &str, is_default: bool) -> PricingStrategy {
        PricingStrategy {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: StrategyKind::RuleBased,
            is_active: true,
            is_default,
            rule_sets: Vec::new(),
            constraints: Vec::new(),
            optimizer: None,
            experiment_fraction: 0.0,
            switches: Vec::new(),
        }
    }

    #[test]
    fn test_select_default_strategy() {
        let bundle = StrategyBundle {
            strategies: vec![strategy("aggressive", false), strategy("standard", true)],
        };
        let ctx = PricingContext::default();
        let signals = ContextSignals::derive(&ctx);

        let selected = bundle.select(None, &ctx, &signals).unwrap();
        assert_eq!(selected.name, "standard");
    }

    #[test]
    fn test_conditional_switch_on_low_inventory() {
        let clearance = strategy("clearance", false);
        let clearance_id = clearance.id;

        let mut standard = strategy("standard", true);
        standard.switches.push(ConditionalStrategy {
            id: Uuid::new_v4(),
            priority: 10,
            is_active: true,
            condition: SignalCondition {
                signal: Signal::InventoryLevel,
                op: Operator::Lte(5.0),
            },
            target_strategy_id: clearance_id,
        });

        let bundle = StrategyBundle {
            strategies: vec![standard, clearance],
        };

        let low_stock = PricingContext {
            inventory_level: 3,
            ..Default::default()
        };
        let signals = ContextSignals::derive(&low_stock);
        assert_eq!(
            bundle.select(None, &low_stock, &signals).unwrap().name,
            "clearance"
        );

        let healthy = PricingContext {
            inventory_level: 80,
            ..Default::default()
        };
        let signals = ContextSignals::derive(&healthy);
        assert_eq!(
            bundle.select(None, &healthy, &signals).unwrap().name,
            "standard"
        );
    }

    #[test]
    fn test_inactive_strategy_not_selectable() {
        let mut inactive = strategy("standard", true);
        inactive.is_active = false;
        let bundle = StrategyBundle {
            strategies: vec![inactive],
        };

        let ctx = PricingContext::default();
        let signals = ContextSignals::derive(&ctx);
        assert!(bundle.select(None, &ctx, &signals).is_none());
    }
}
