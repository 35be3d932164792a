use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{ContextSignals, PricingContext};

/// A context signal a condition can test. Signals that are not available in
/// a given context (e.g. ACOS without ad data) make the condition fail, the
/// same way the original engine treated an unevaluable condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    CurrentPrice,
    Cost,
    CurrentMargin,
    InventoryLevel,
    InventoryAgeDays,
    SalesVelocity,
    CompetitorCount,
    CompetitorMin,
    CompetitorAvg,
    PriceRank,
    DemandScore,
    SeasonalityFactor,
    Acos,
    HourOfDay,
    DayOfWeek,
    HasBuyBox,
}

impl Signal {
    pub fn value(&self, ctx: &PricingContext, signals: &ContextSignals) -> Option<f64> {
        match self {
            Signal::CurrentPrice => ctx.current_price.to_f64(),
            Signal::Cost => ctx.cost.to_f64(),
            Signal::CurrentMargin => Some(signals.current_margin),
            Signal::InventoryLevel => Some(ctx.inventory_level as f64),
            Signal::InventoryAgeDays => Some(ctx.inventory_age_days as f64),
            Signal::SalesVelocity => Some(ctx.sales_velocity),
            Signal::CompetitorCount => Some(signals.competitor_count as f64),
            Signal::CompetitorMin => signals.competitor_min.and_then(|d| d.to_f64()),
            Signal::CompetitorAvg => signals.competitor_avg.and_then(|d| d.to_f64()),
            Signal::PriceRank => Some(signals.price_rank as f64),
            Signal::DemandScore => Some(ctx.demand_score),
            Signal::SeasonalityFactor => Some(ctx.seasonality_factor),
            Signal::Acos => ctx.acos,
            Signal::HourOfDay => Some(signals.hour_of_day as f64),
            Signal::DayOfWeek => Some(signals.day_of_week as f64),
            Signal::HasBuyBox => Some(if ctx.has_buy_box { 1.0 } else { 0.0 }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq(f64),
    Ne(f64),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<f64>),
    NotIn(Vec<f64>),
    Between(f64, f64),
}

impl Operator {
    pub fn matches(&self, value: f64) -> bool {
        match self {
            Operator::Eq(v) => value == *v,
            Operator::Ne(v) => value != *v,
            Operator::Gt(v) => value > *v,
            Operator::Gte(v) => value >= *v,
            Operator::Lt(v) => value < *v,
            Operator::Lte(v) => value <= *v,
            Operator::In(vs) => vs.contains(&value),
            Operator::NotIn(vs) => !vs.contains(&value),
            Operator::Between(lo, hi) => value >= *lo && value <= *hi,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalCondition {
    pub signal: Signal,
    pub op: Operator,
}

impl SignalCondition {
    pub fn matches(&self, ctx: &PricingContext, signals: &ContextSignals) -> bool {
        match self.signal.value(ctx, signals) {
            Some(value) => self.op.matches(value),
            None => false,
        }
    }
}

/// Typed condition tree: signal comparisons composed with All/Any
/// combinators. There is no free-form expression language; everything a
/// rule can test is a combination of these nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    Signal(SignalCondition),
    All(Vec<RuleCondition>),
    Any(Vec<RuleCondition>),
}

impl RuleCondition {
    pub fn matches(&self, ctx: &PricingContext, signals: &ContextSignals) -> bool {
        match self {
            RuleCondition::Signal(c) => c.matches(ctx, signals),
            RuleCondition::All(cs) => cs.iter().all(|c| c.matches(ctx, signals)),
            RuleCondition::Any(cs) => cs.iter().any(|c| c.matches(ctx, signals)),
        }
    }

    pub fn signal(signal: Signal, op: Operator) -> Self {
        RuleCondition::Signal(SignalCondition { signal, op })
    }
}

/// What a rule does to the running candidate price. Competitor-relative
/// actions resolve against the lowest eligible landed price (or the buy-box
/// price) and return None when no reference exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    IncreasePercent(Decimal),
    DecreasePercent(Decimal),
    IncreaseAmount(Decimal),
    DecreaseAmount(Decimal),
    SetPrice(Decimal),
    MatchLowestCompetitor,
    UndercutCompetitorAmount(Decimal),
    UndercutCompetitorPercent(Decimal),
    MatchBuyBox,
    /// Reprice to the margin target, margin as a fraction of sale price.
    CostPlusMargin(Decimal),
}

impl RuleAction {
    pub fn apply(
        &self,
        candidate: Decimal,
        ctx: &PricingContext,
        signals: &ContextSignals,
    ) -> Option<Decimal> {
        let hundred = Decimal::ONE_HUNDRED;

        match self {
            RuleAction::IncreasePercent(pct) => {
                Some(candidate * (Decimal::ONE + *pct / hundred))
            }
            RuleAction::DecreasePercent(pct) => {
                Some(candidate * (Decimal::ONE - *pct / hundred))
            }
            RuleAction::IncreaseAmount(amount) => Some(candidate + *amount),
            RuleAction::DecreaseAmount(amount) => Some(candidate - *amount),
            RuleAction::SetPrice(price) => Some(*price),
            RuleAction::MatchLowestCompetitor => signals.competitor_min,
            RuleAction::UndercutCompetitorAmount(amount) => {
                signals.competitor_min.map(|min| min - *amount)
            }
            RuleAction::UndercutCompetitorPercent(pct) => signals
                .competitor_min
                .map(|min| min * (Decimal::ONE - *pct / hundred)),
            RuleAction::MatchBuyBox => ctx.buy_box_price,
            RuleAction::CostPlusMargin(margin) => {
                if *margin >= Decimal::ONE {
                    return None;
                }
                Some(ctx.cost / (Decimal::ONE - *margin))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RuleAction::IncreasePercent(p) => format!("increase {}%", p),
            RuleAction::DecreasePercent(p) => format!("decrease {}%", p),
            RuleAction::IncreaseAmount(a) => format!("increase by {}", a),
            RuleAction::DecreaseAmount(a) => format!("decrease by {}", a),
            RuleAction::SetPrice(p) => format!("set price {}", p),
            RuleAction::MatchLowestCompetitor => "match lowest competitor".to_string(),
            RuleAction::UndercutCompetitorAmount(a) => format!("undercut competitor by {}", a),
            RuleAction::UndercutCompetitorPercent(p) => format!("undercut competitor by {}%", p),
            RuleAction::MatchBuyBox => "match buy box".to_string(),
            RuleAction::CostPlusMargin(m) => format!("cost plus margin {}", m),
        }
    }
}

/// Individual pricing rule. Lower priority runs earlier, as in the source
/// platform's rule ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub condition: Option<RuleCondition>,
    pub action: RuleAction,
    /// Multiplied into the decision confidence when the rule fires.
    pub weight: f64,
}

impl PricingRule {
    pub fn applies(&self, ctx: &PricingContext, signals: &ContextSignals) -> bool {
        if !self.is_active {
            return false;
        }
        match &self.condition {
            Some(condition) => condition.matches(ctx, signals),
            None => true,
        }
    }
}

/// Scope filter deciding whether a rule set participates in an evaluation.
/// Empty membership lists match anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetScope {
    pub marketplaces: Vec<String>,
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub inventory_min: Option<i32>,
    pub inventory_max: Option<i32>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
}

impl RuleSetScope {
    pub fn applies_to(&self, ctx: &PricingContext) -> bool {
        if !self.marketplaces.is_empty() && !self.marketplaces.contains(&ctx.marketplace) {
            return false;
        }

        if !self.categories.is_empty() {
            match &ctx.category {
                Some(category) if self.categories.contains(category) => {}
                _ => return false,
            }
        }

        if !self.brands.is_empty() {
            match &ctx.brand {
                Some(brand) if self.brands.contains(brand) => {}
                _ => return false,
            }
        }

        if let Some(min) = self.inventory_min {
            if ctx.inventory_level < min {
                return false;
            }
        }
        if let Some(max) = self.inventory_max {
            if ctx.inventory_level > max {
                return false;
            }
        }

        if let Some(min) = self.price_min {
            if ctx.current_price < min {
                return false;
            }
        }
        if let Some(max) = self.price_max {
            if ctx.current_price > max {
                return false;
            }
        }

        true
    }
}

/// Ordered collection of pricing rules sharing a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub scope: RuleSetScope,
    pub rules: Vec<PricingRule>,
}

impl RuleSet {
    /// Active rules of every applicable rule set, in priority order.
    pub fn collect_applicable<'a>(
        rule_sets: &'a [RuleSet],
        ctx: &PricingContext,
    ) -> Vec<&'a PricingRule> {
        let mut sets: Vec<&RuleSet> = rule_sets
            .iter()
            .filter(|rs| rs.is_active && rs.scope.applies_to(ctx))
            .collect();
        sets.sort_by_key(|rs| rs.priority);

        let mut rules: Vec<&PricingRule> = sets
            .iter()
            .flat_map(|rs| rs.rules.iter().filter(|r| r.is_active))
            .collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ctx_with_competitors() -> (PricingContext, ContextSignals) {
        let ctx = PricingContext {
            current_price: dec!(100.00),
            cost: dec!(60.00),
            competitor_prices: vec![dec!(95.00), dec!(98.50)],
            buy_box_price: Some(dec!(96.00)),
            ..Default::default()
        };
        let signals = ContextSignals::derive(&ctx);
        (ctx, signals)
    }

    #[test]
    fn test_percentage_adjustments() {
        let (ctx, signals) = ctx_with_competitors();

        let up = RuleAction::IncreasePercent(dec!(10)).apply(dec!(100.00), &ctx, &signals);
        assert_eq!(up, Some(dec!(110.00)));

        let down = RuleAction::DecreasePercent(dec!(15)).apply(dec!(100.00), &ctx, &signals);
        assert_eq!(down, Some(dec!(85.00)));
    }

    #[test]
    fn test_amount_adjustments() {
        let (ctx, signals) = ctx_with_competitors();

        let up = RuleAction::IncreaseAmount(dec!(5.50)).apply(dec!(100.00), &ctx, &signals);
        assert_eq!(up, Some(dec!(105.50)));

        let set = RuleAction::SetPrice(dec!(89.99)).apply(dec!(100.00), &ctx, &signals);
        assert_eq!(set, Some(dec!(89.99)));
    }

    #[test]
    fn test_competitor_relative_actions() {
        let (ctx, signals) = ctx_with_competitors();

        assert_eq!(
            RuleAction::MatchLowestCompetitor.apply(dec!(100.00), &ctx, &signals),
            Some(dec!(95.00))
        );
        assert_eq!(
            RuleAction::UndercutCompetitorAmount(dec!(0.50)).apply(dec!(100.00), &ctx, &signals),
            Some(dec!(94.50))
        );
        assert_eq!(
            RuleAction::UndercutCompetitorPercent(dec!(1)).apply(dec!(100.00), &ctx, &signals),
            Some(dec!(94.0500))
        );
        assert_eq!(
            RuleAction::MatchBuyBox.apply(dec!(100.00), &ctx, &signals),
            Some(dec!(96.00))
        );
    }

    #[test]
    fn test_competitor_actions_skip_without_reference() {
        let ctx = PricingContext {
            current_price: dec!(100.00),
            ..Default::default()
        };
        let signals = ContextSignals::derive(&ctx);

        assert_eq!(
            RuleAction::MatchLowestCompetitor.apply(dec!(100.00), &ctx, &signals),
            None
        );
        assert_eq!(
            RuleAction::MatchBuyBox.apply(dec!(100.00), &ctx, &signals),
            None
        );
    }

    #[test]
    fn test_cost_plus_margin() {
        let (ctx, signals) = ctx_with_competitors();

        // 60 / (1 - 0.25) = 80
        assert_eq!(
            RuleAction::CostPlusMargin(dec!(0.25)).apply(dec!(100.00), &ctx, &signals),
            Some(dec!(80.00))
        );
        assert_eq!(
            RuleAction::CostPlusMargin(dec!(1)).apply(dec!(100.00), &ctx, &signals),
            None
        );
    }

    #[test]
    fn test_condition_tree() {
        let (ctx, signals) = ctx_with_competitors();

        let stale_and_crowded = RuleCondition::All(vec![
            RuleCondition::signal(Signal::CompetitorCount, Operator::Gte(2.0)),
            RuleCondition::signal(Signal::CurrentMargin, Operator::Gt(0.3)),
        ]);
        assert!(stale_and_crowded.matches(&ctx, &signals));

        // ACOS is unavailable: the condition must fail, not panic
        let acos = RuleCondition::signal(Signal::Acos, Operator::Lt(0.3));
        assert!(!acos.matches(&ctx, &signals));
    }

    #[test]
    fn test_scope_filtering() {
        let ctx = PricingContext {
            marketplace: "amazon_us".to_string(),
            category: Some("electronics".to_string()),
            current_price: dec!(29.99),
            inventory_level: 100,
            ..Default::default()
        };

        let matching = RuleSetScope {
            marketplaces: vec!["amazon_us".to_string()],
            categories: vec!["electronics".to_string()],
            ..Default::default()
        };
        assert!(matching.applies_to(&ctx));

        let wrong_marketplace = RuleSetScope {
            marketplaces: vec!["flipkart_in".to_string()],
            ..Default::default()
        };
        assert!(!wrong_marketplace.applies_to(&ctx));

        let inventory_band = RuleSetScope {
            inventory_min: Some(200),
            ..Default::default()
        };
        assert!(!inventory_band.applies_to(&ctx));
    }

    #[test]
    fn test_collect_applicable_orders_by_priority() {
        let ctx = PricingContext::default();

        let rule = |name: &str, priority: i32| PricingRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            priority,
            is_active: true,
            condition: None,
            action: RuleAction::IncreaseAmount(dec!(1)),
            weight: 1.0,
        };

        let sets = vec![
            RuleSet {
                id: Uuid::new_v4(),
                name: "late".to_string(),
                priority: 200,
                is_active: true,
                scope: RuleSetScope::default(),
                rules: vec![rule("b", 50)],
            },
            RuleSet {
                id: Uuid::new_v4(),
                name: "early".to_string(),
                priority: 100,
                is_active: true,
                scope: RuleSetScope::default(),
                rules: vec![rule("a", 10), rule("c", 90)],
            },
        ];

        let collected = RuleSet::collect_applicable(&sets, &ctx);
        let names: Vec<&str> = collected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
