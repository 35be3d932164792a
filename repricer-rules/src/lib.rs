pub mod context;
pub mod engine;
pub mod guardrails;
pub mod optimizer;
pub mod rules;
pub mod strategy;

pub use context::{ContextSignals, PricingContext};
pub use engine::{PricingDecision, RepricingEngine};
pub use guardrails::{SafetyConstraint, ViolationAction};
pub use rules::{PricingRule, RuleAction, RuleCondition, RuleSet};
pub use strategy::{ConditionalStrategy, PricingStrategy, StrategyBundle, StrategyKind};
