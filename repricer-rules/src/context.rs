use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repricer_catalog::{
    eligible_landed_prices, CompetitorOffer, FeeSchedule, FulfillmentMethod, Listing, Product,
};

/// Point-in-time snapshot of everything the engine is allowed to look at
/// when pricing one listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingContext {
    pub listing_id: Uuid,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub current_price: Decimal,
    pub cost: Decimal,
    /// Total marketplace fees at the current price.
    pub fees: Decimal,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub inventory_level: i32,
    pub inventory_age_days: i32,
    pub fulfillment: Option<FulfillmentMethod>,
    /// Landed competitor prices, blacklisted sellers already excluded.
    pub competitor_prices: Vec<Decimal>,
    pub buy_box_price: Option<Decimal>,
    pub has_buy_box: bool,
    /// Units sold per day over the trailing window.
    pub sales_velocity: f64,
    pub acos: Option<f64>,
    pub seasonality_factor: f64,
    pub demand_score: f64,
    /// Required margin as a fraction of the sale price.
    pub target_margin: f64,
    pub evaluated_at: DateTime<Utc>,
    pub custom_attributes: serde_json::Value,
}

impl Default for PricingContext {
    fn default() -> Self {
        Self {
            listing_id: Uuid::nil(),
            organization_id: Uuid::nil(),
            marketplace: String::new(),
            category: None,
            brand: None,
            current_price: Decimal::ZERO,
            cost: Decimal::ZERO,
            fees: Decimal::ZERO,
            min_price: None,
            max_price: None,
            inventory_level: 0,
            inventory_age_days: 0,
            fulfillment: None,
            competitor_prices: Vec::new(),
            buy_box_price: None,
            has_buy_box: false,
            sales_velocity: 0.0,
            acos: None,
            seasonality_factor: 1.0,
            demand_score: 1.0,
            target_margin: 0.2,
            evaluated_at: Utc::now(),
            custom_attributes: serde_json::json!({}),
        }
    }
}

impl PricingContext {
    /// Assemble a context from persisted catalog state. Fees default to zero
    /// when no schedule covers the marketplace/category.
    pub fn for_listing(
        listing: &Listing,
        product: &Product,
        offers: &[CompetitorOffer],
        fee_schedule: Option<&FeeSchedule>,
        target_margin: f64,
    ) -> Self {
        let now = Utc::now();
        let fees = fee_schedule
            .filter(|s| s.is_effective_at(now))
            .map(|s| s.calculate(listing.current_price, 1).total)
            .unwrap_or(Decimal::ZERO);

        let inventory_age_days = (now - listing.created_at).num_days().max(0) as i32;

        Self {
            listing_id: listing.id,
            organization_id: listing.organization_id,
            marketplace: listing.marketplace.clone(),
            category: product.category.clone(),
            brand: product.brand.clone(),
            current_price: listing.current_price,
            cost: product.cost_price,
            fees,
            min_price: product.min_price,
            max_price: product.max_price,
            inventory_level: listing.quantity,
            inventory_age_days,
            fulfillment: Some(listing.fulfillment),
            competitor_prices: eligible_landed_prices(offers),
            buy_box_price: listing.buy_box_price,
            has_buy_box: listing.has_buy_box,
            sales_velocity: listing.attributes["sales_velocity"].as_f64().unwrap_or(0.0),
            acos: listing.attributes["acos"].as_f64(),
            seasonality_factor: listing.attributes["seasonality_factor"]
                .as_f64()
                .unwrap_or(1.0),
            demand_score: listing.attributes["demand_score"].as_f64().unwrap_or(1.0),
            target_margin,
            evaluated_at: now,
            custom_attributes: listing.attributes.clone(),
        }
    }

    /// Minimum price that honors cost + fees + target margin, where margin
    /// is a fraction of the sale price.
    pub fn margin_floor(&self) -> Decimal {
        let landed_cost = self.cost + self.fees;
        if self.target_margin <= 0.0 || self.target_margin >= 1.0 {
            return landed_cost;
        }
        let divisor = Decimal::try_from(1.0 - self.target_margin).unwrap_or(Decimal::ONE);
        landed_cost / divisor
    }
}

/// Signals derived from a context once per evaluation and shared by rule
/// conditions, strategy switches and the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSignals {
    pub competitor_min: Option<Decimal>,
    pub competitor_max: Option<Decimal>,
    pub competitor_avg: Option<Decimal>,
    pub competitor_count: u32,
    /// 1 = cheapest offer in the market including ours.
    pub price_rank: u32,
    pub price_percentile: f64,
    pub current_margin: f64,
    pub hour_of_day: u32,
    /// 1 = Monday .. 7 = Sunday
    pub day_of_week: u32,
    pub is_weekend: bool,
}

impl ContextSignals {
    pub fn derive(ctx: &PricingContext) -> Self {
        let prices = &ctx.competitor_prices;

        let competitor_min = prices.iter().min().copied();
        let competitor_max = prices.iter().max().copied();
        let competitor_avg = if prices.is_empty() {
            None
        } else {
            Some(prices.iter().sum::<Decimal>() / Decimal::from(prices.len() as u64))
        };

        let cheaper = prices.iter().filter(|p| **p < ctx.current_price).count();
        let price_rank = cheaper as u32 + 1;
        let price_percentile = if prices.is_empty() {
            0.5
        } else {
            cheaper as f64 / prices.len() as f64
        };

        let current_margin = if ctx.current_price > Decimal::ZERO {
            ((ctx.current_price - ctx.cost) / ctx.current_price)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let day_of_week = ctx.evaluated_at.weekday().number_from_monday();

        Self {
            competitor_min,
            competitor_max,
            competitor_avg,
            competitor_count: prices.len() as u32,
            price_rank,
            price_percentile,
            current_margin,
            hour_of_day: ctx.evaluated_at.hour(),
            day_of_week,
            is_weekend: day_of_week > 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signals_with_competitors() {
        let ctx = PricingContext {
            current_price: dec!(29.99),
            cost: dec!(15.00),
            competitor_prices: vec![dec!(27.50), dec!(28.99), dec!(31.00)],
            ..Default::default()
        };

        let signals = ContextSignals::derive(&ctx);
        assert_eq!(signals.competitor_min, Some(dec!(27.50)));
        assert_eq!(signals.competitor_max, Some(dec!(31.00)));
        assert_eq!(signals.competitor_count, 3);
        // Two offers are cheaper than us
        assert_eq!(signals.price_rank, 3);
        assert!((signals.price_percentile - 2.0 / 3.0).abs() < 1e-9);
        assert!((signals.current_margin - 0.4998).abs() < 0.001);
    }

    #[test]
    fn test_signals_without_competitors() {
        let ctx = PricingContext {
            current_price: dec!(10.00),
            ..Default::default()
        };

        let signals = ContextSignals::derive(&ctx);
        assert_eq!(signals.competitor_min, None);
        assert_eq!(signals.competitor_count, 0);
        assert_eq!(signals.price_rank, 1);
        assert_eq!(signals.price_percentile, 0.5);
    }

    #[test]
    fn test_margin_floor_covers_cost_fees_and_margin() {
        let ctx = PricingContext {
            cost: dec!(15.00),
            fees: dec!(5.00),
            target_margin: 0.2,
            ..Default::default()
        };

        // (15 + 5) / (1 - 0.2) = 25.00
        assert_eq!(ctx.margin_floor(), dec!(25.00));
    }
}
