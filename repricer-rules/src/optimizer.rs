use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::context::{ContextSignals, PricingContext};

/// Configuration for the constrained price scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Hard margin constraint applied to the candidate range, as a fraction
    /// of the sale price.
    pub min_margin: f64,
    /// Number of price points scanned between the effective bounds.
    pub candidates: usize,
    /// Demand curve exponent: demand scales with (current/price)^elasticity.
    pub elasticity: f64,
    pub profit_weight: f64,
    pub revenue_weight: f64,
    pub buy_box_weight: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_margin: 0.1,
            candidates: 20,
            elasticity: 1.5,
            profit_weight: 0.6,
            revenue_weight: 0.3,
            buy_box_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedPrice {
    pub price: Decimal,
    pub expected_demand: f64,
    pub expected_sales: f64,
    pub expected_revenue: f64,
    pub expected_profit: f64,
    pub buy_box_probability: f64,
    pub score: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("Cannot satisfy margin constraint within price range")]
    InfeasibleBounds,

    #[error("Context has no usable price data")]
    EmptyContext,
}

/// Scans candidate prices between the margin-respecting minimum and the
/// listing maximum, scoring each by expected profit, revenue and buy-box
/// probability.
pub struct PriceOptimizer {
    config: OptimizerConfig,
}

impl PriceOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn optimize(
        &self,
        ctx: &PricingContext,
        _signals: &ContextSignals,
    ) -> Result<OptimizedPrice, OptimizerError> {
        let current = ctx.current_price.to_f64().ok_or(OptimizerError::EmptyContext)?;
        let cost = ctx.cost.to_f64().unwrap_or(0.0);
        let fees = ctx.fees.to_f64().unwrap_or(0.0);
        if current <= 0.0 {
            return Err(OptimizerError::EmptyContext);
        }

        // The margin constraint dominates any configured minimum.
        let margin_min = if self.config.min_margin < 1.0 {
            cost / (1.0 - self.config.min_margin)
        } else {
            cost
        };
        let configured_min = ctx
            .min_price
            .and_then(|d| d.to_f64())
            .unwrap_or_else(|| ctx.margin_floor().to_f64().unwrap_or(cost));
        let min_bound = margin_min.max(configured_min);

        let max_bound = ctx
            .max_price
            .and_then(|d| d.to_f64())
            .unwrap_or(current * 1.5);

        if min_bound > max_bound {
            return Err(OptimizerError::InfeasibleBounds);
        }

        let steps = self.config.candidates.max(2);
        let mut best: Option<OptimizedPrice> = None;

        for i in 0..steps {
            let price = min_bound + (max_bound - min_bound) * (i as f64) / ((steps - 1) as f64);

            let demand = self.estimate_demand(ctx, price);
            let buy_box_probability = self.buy_box_probability(ctx, price);
            let expected_sales = demand * buy_box_probability;
            let expected_revenue = price * expected_sales;
            let expected_profit = (price - cost - fees) * expected_sales;

            let score = expected_profit * self.config.profit_weight
                + expected_revenue * self.config.revenue_weight
                + buy_box_probability * 100.0 * self.config.buy_box_weight;

            if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
                best = Some(OptimizedPrice {
                    price: Decimal::try_from(price)
                        .unwrap_or(ctx.current_price)
                        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
                    expected_demand: demand,
                    expected_sales,
                    expected_revenue,
                    expected_profit,
                    buy_box_probability,
                    score,
                });
            }
        }

        best.ok_or(OptimizerError::EmptyContext)
    }

    /// Elasticity-style demand estimate anchored on observed velocity.
    fn estimate_demand(&self, ctx: &PricingContext, price: f64) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        let current = ctx.current_price.to_f64().unwrap_or(price);
        let base = ctx.sales_velocity.max(0.1) * ctx.demand_score * ctx.seasonality_factor;
        base * (current / price).powf(self.config.elasticity)
    }

    /// Logistic estimate of winning the buy box at a given price. With no
    /// buy-box reference the probability defaults to 0.5, matching the
    /// source platform's fallback.
    fn buy_box_probability(&self, ctx: &PricingContext, price: f64) -> f64 {
        let reference = ctx
            .buy_box_price
            .and_then(|d| d.to_f64())
            .filter(|p| *p > 0.0);

        match reference {
            Some(bb) => {
                let edge = (bb - price) / bb;
                1.0 / (1.0 + (-12.0 * edge).exp())
            }
            None => 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ctx() -> PricingContext {
        PricingContext {
            current_price: dec!(25.00),
            cost: dec!(10.00),
            fees: dec!(3.00),
            min_price: Some(dec!(12.00)),
            max_price: Some(dec!(30.00)),
            buy_box_price: Some(dec!(24.00)),
            sales_velocity: 4.0,
            target_margin: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_optimizer_stays_within_bounds() {
        let optimizer = PriceOptimizer::new(OptimizerConfig::default());
        let context = ctx();
        let signals = ContextSignals::derive(&context);

        let best = optimizer.optimize(&context, &signals).unwrap();
        assert!(best.price >= dec!(12.00));
        assert!(best.price <= dec!(30.00));
        assert!(best.score > 0.0);
    }

    #[test]
    fn test_buy_box_probability_favors_undercutting() {
        let optimizer = PriceOptimizer::new(OptimizerConfig::default());
        let context = ctx();

        let below = optimizer.buy_box_probability(&context, 22.0);
        let at = optimizer.buy_box_probability(&context, 24.0);
        let above = optimizer.buy_box_probability(&context, 26.0);

        assert!(below > at);
        assert!(at > above);
        assert!((at - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_bounds_error() {
        let optimizer = PriceOptimizer::new(OptimizerConfig {
            min_margin: 0.8,
            ..Default::default()
        });
        // cost 10 at 80% margin needs a 50.00 price, above the 30.00 cap
        let context = ctx();
        let signals = ContextSignals::derive(&context);

        let err = optimizer.optimize(&context, &signals).unwrap_err();
        assert!(matches!(err, OptimizerError::InfeasibleBounds));
    }
}
