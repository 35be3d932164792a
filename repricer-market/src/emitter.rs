use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::amazon::AmazonSpApiClient;
use crate::error::MarketError;
use crate::flipkart::FlipkartClient;
use repricer_core::connector::{CompetitorQuote, MarketplaceConnector};

/// Concrete Price Emitter: routes submissions to whichever marketplace
/// client is configured for the listing's marketplace code.
pub struct MarketplacePriceEmitter {
    amazon: Option<Arc<AmazonSpApiClient>>,
    flipkart: Option<Arc<FlipkartClient>>,
}

impl MarketplacePriceEmitter {
    pub fn new(
        amazon: Option<Arc<AmazonSpApiClient>>,
        flipkart: Option<Arc<FlipkartClient>>,
    ) -> Self {
        Self { amazon, flipkart }
    }

    fn amazon_client(&self, marketplace: &str) -> Result<&AmazonSpApiClient, MarketError> {
        self.amazon
            .as_deref()
            .ok_or_else(|| MarketError::MissingCredentials(marketplace.to_string()))
    }

    fn flipkart_client(&self, marketplace: &str) -> Result<&FlipkartClient, MarketError> {
        self.flipkart
            .as_deref()
            .ok_or_else(|| MarketError::MissingCredentials(marketplace.to_string()))
    }
}

#[async_trait]
impl MarketplaceConnector for MarketplacePriceEmitter {
    async fn submit_price(
        &self,
        marketplace: &str,
        marketplace_sku: &str,
        price: Decimal,
        currency: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(marketplace_id) = marketplace.strip_prefix("amazon_") {
            self.amazon_client(marketplace)?
                .submit_price(marketplace_id, marketplace_sku, price, currency)
                .await?;
        } else if marketplace.starts_with("flipkart") {
            self.flipkart_client(marketplace)?
                .update_listing_price(marketplace_sku, price, currency)
                .await?;
        } else {
            return Err(Box::new(MarketError::UnsupportedMarketplace(
                marketplace.to_string(),
            )));
        }

        info!(%marketplace, sku = %marketplace_sku, %price, "price submitted");
        Ok(())
    }

    async fn fetch_competitive_pricing(
        &self,
        marketplace: &str,
        marketplace_sku: &str,
    ) -> Result<Vec<CompetitorQuote>, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(marketplace_id) = marketplace.strip_prefix("amazon_") {
            let quotes = self
                .amazon_client(marketplace)?
                .get_competitive_pricing(marketplace_id, marketplace_sku)
                .await?;
            return Ok(quotes);
        }

        // Flipkart exposes no public competing-offers feed; competitor data
        // for those listings arrives through the regular listing sync.
        Ok(Vec::new())
    }
}
