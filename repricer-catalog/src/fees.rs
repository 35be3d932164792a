use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::product::Marketplace;

/// Fee schedule for a marketplace, optionally narrowed to a category.
/// Referral rate is a fraction of the sale price; the rest are flat amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub marketplace: String,
    pub category: Option<String>,
    pub referral_fee_rate: Decimal,
    pub variable_closing_fee: Decimal,
    pub per_item_fee: Decimal,
    pub fulfillment_fee_per_unit: Decimal,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeBreakdown {
    pub referral_fee: Decimal,
    pub closing_fee: Decimal,
    pub per_item_fee: Decimal,
    pub fulfillment_fee: Decimal,
    pub total: Decimal,
}

impl FeeSchedule {
    /// Fees owed to the marketplace for selling `quantity` units at `price`.
    pub fn calculate(&self, price: Decimal, quantity: i32) -> FeeBreakdown {
        let qty = Decimal::from(quantity);

        let referral_fee = price * self.referral_fee_rate * qty;
        let closing_fee = self.variable_closing_fee * qty;
        let per_item_fee = self.per_item_fee * qty;
        let fulfillment_fee = self.fulfillment_fee_per_unit * qty;

        FeeBreakdown {
            referral_fee,
            closing_fee,
            per_item_fee,
            fulfillment_fee,
            total: referral_fee + closing_fee + per_item_fee + fulfillment_fee,
        }
    }

    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        if at < self.effective_from {
            return false;
        }
        match self.effective_until {
            Some(until) => at < until,
            None => true,
        }
    }

    /// Fallback schedule carrying only the marketplace's default referral
    /// rate, for categories with no configured schedule.
    pub fn referral_only(marketplace: &Marketplace) -> Self {
        Self {
            marketplace: marketplace.code.clone(),
            category: None,
            referral_fee_rate: marketplace.referral_fee_rate,
            variable_closing_fee: Decimal::ZERO,
            per_item_fee: Decimal::ZERO,
            fulfillment_fee_per_unit: Decimal::ZERO,
            effective_from: DateTime::<Utc>::MIN_UTC,
            effective_until: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn schedule() -> FeeSchedule {
        FeeSchedule {
            marketplace: "amazon_us".to_string(),
            category: None,
            referral_fee_rate: dec!(0.15),
            variable_closing_fee: dec!(1.80),
            per_item_fee: dec!(0.99),
            fulfillment_fee_per_unit: dec!(3.22),
            effective_from: Utc::now() - chrono::Duration::days(30),
            effective_until: None,
        }
    }

    #[test]
    fn test_fee_calculation_single_unit() {
        let fees = schedule().calculate(dec!(100.00), 1);

        assert_eq!(fees.referral_fee, dec!(15.0000));
        assert_eq!(fees.closing_fee, dec!(1.80));
        assert_eq!(fees.per_item_fee, dec!(0.99));
        assert_eq!(fees.fulfillment_fee, dec!(3.22));
        assert_eq!(fees.total, dec!(21.0100));
    }

    #[test]
    fn test_fee_calculation_scales_with_quantity() {
        let fees = schedule().calculate(dec!(50.00), 3);

        assert_eq!(fees.referral_fee, dec!(22.5000));
        assert_eq!(fees.fulfillment_fee, dec!(9.66));
        assert_eq!(fees.total, dec!(40.5300));
    }
}
