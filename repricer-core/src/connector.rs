use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A competing offer as reported by a marketplace pricing feed, before it is
/// attached to a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorQuote {
    pub seller_id: String,
    pub seller_name: String,
    pub price: Decimal,
    pub shipping_price: Decimal,
    pub condition: String,
    pub fulfillment: String,
    pub is_buy_box_winner: bool,
}

/// The Price Emitter seam: everything the engine needs from an external
/// marketplace. Implemented per marketplace in repricer-market.
#[async_trait]
pub trait MarketplaceConnector: Send + Sync {
    /// Push a new price for a listing to the marketplace.
    async fn submit_price(
        &self,
        marketplace: &str,
        marketplace_sku: &str,
        price: Decimal,
        currency: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Fetch the current competing offers for a listing.
    async fn fetch_competitive_pricing(
        &self,
        marketplace: &str,
        marketplace_sku: &str,
    ) -> Result<Vec<CompetitorQuote>, Box<dyn std::error::Error + Send + Sync>>;
}
