use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing lifecycle on a marketplace
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Inactive,
    Pending,
    Rejected,
    Suppressed,
}

/// Who ships the unit; affects fees and guardrail scope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMethod {
    /// Fulfilled by merchant
    Fbm,
    /// Fulfilled by Amazon
    Fba,
    /// Fulfilled by Flipkart
    Fbf,
}

impl FulfillmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Fbm => "fbm",
            FulfillmentMethod::Fba => "fba",
            FulfillmentMethod::Fbf => "fbf",
        }
    }
}

/// Seller-side product record: cost, bounds and inventory live here, not on
/// the per-marketplace listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku: String,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub asin: Option<String>,
    pub upc: Option<String>,
    pub cost_price: Decimal,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub total_inventory: i32,
    pub reserved_inventory: i32,
    pub is_active: bool,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn available_inventory(&self) -> i32 {
        self.total_inventory - self.reserved_inventory
    }
}

/// Marketplace definition, e.g. amazon_us or flipkart_in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marketplace {
    pub code: String,
    pub name: String,
    pub country: String,
    pub currency: String,
    pub referral_fee_rate: Decimal,
    pub is_active: bool,
}

/// A product offered on one marketplace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub product_id: Uuid,
    pub marketplace: String,
    pub marketplace_sku: String,
    pub marketplace_product_id: Option<String>,
    pub title: String,
    pub current_price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub fulfillment: FulfillmentMethod,
    pub status: ListingStatus,
    pub has_buy_box: bool,
    pub buy_box_price: Option<Decimal>,
    pub lowest_price: Option<Decimal>,
    pub sales_rank: Option<i32>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_repriceable(&self) -> bool {
        self.status == ListingStatus::Active && self.quantity > 0
    }

    pub fn ensure_repriceable(&self) -> Result<(), CatalogError> {
        if !self.is_repriceable() {
            return Err(CatalogError::NotRepriceable(format!(
                "{} ({:?}, qty {})",
                self.marketplace_sku, self.status, self.quantity
            )));
        }
        Ok(())
    }
}

/// A competing seller's offer against one of our listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorOffer {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub seller_id: String,
    pub seller_name: String,
    pub price: Decimal,
    pub shipping_price: Decimal,
    pub condition: String,
    pub fulfillment: FulfillmentMethod,
    pub rating: Option<f64>,
    pub feedback_count: i32,
    pub is_blacklisted: bool,
    pub is_whitelisted: bool,
    pub last_seen_at: DateTime<Utc>,
}

impl CompetitorOffer {
    /// Price the buyer actually pays.
    pub fn landed_price(&self) -> Decimal {
        self.price + self.shipping_price
    }
}

/// Landed prices of offers we are allowed to price against, cheapest first.
/// Blacklisted sellers are never used as a pricing reference.
pub fn eligible_landed_prices(offers: &[CompetitorOffer]) -> Vec<Decimal> {
    let mut prices: Vec<Decimal> = offers
        .iter()
        .filter(|o| !o.is_blacklisted)
        .map(|o| o.landed_price())
        .collect();
    prices.sort();
    prices
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Listing not repriceable: {0}")]
    NotRepriceable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn offer(price: Decimal, shipping: Decimal, blacklisted: bool) -> CompetitorOffer {
        CompetitorOffer {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            seller_id: "A1".to_string(),
            seller_name: "Some Seller".to_string(),
            price,
            shipping_price: shipping,
            condition: "new".to_string(),
            fulfillment: FulfillmentMethod::Fbm,
            rating: None,
            feedback_count: 0,
            is_blacklisted: blacklisted,
            is_whitelisted: false,
            last_seen_at: Utc::now(),
        }
    }

    #[test]
    fn test_landed_price_ordering_excludes_blacklisted() {
        let offers = vec![
            offer(dec!(25.00), dec!(4.99), false),
            offer(dec!(22.00), dec!(0.00), true), // cheapest, but blacklisted
            offer(dec!(24.50), dec!(0.00), false),
        ];

        let prices = eligible_landed_prices(&offers);
        assert_eq!(prices, vec![dec!(24.50), dec!(29.99)]);
    }
}
