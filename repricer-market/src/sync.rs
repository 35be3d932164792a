use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use repricer_catalog::{CompetitorOffer, FulfillmentMethod, InventoryTracker, Listing};
use repricer_core::connector::{CompetitorQuote, MarketplaceConnector};
use repricer_core::execution::SyncJob;
use repricer_core::repository::{ListingRepository, SyncJobRepository};

/// Pulls marketplace state (competing offers, inventory) back into the
/// platform. Every batch run is recorded as a SyncJob.
pub struct SyncService {
    listings: Arc<dyn ListingRepository>,
    sync_jobs: Arc<dyn SyncJobRepository>,
    connector: Arc<dyn MarketplaceConnector>,
}

impl SyncService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        sync_jobs: Arc<dyn SyncJobRepository>,
        connector: Arc<dyn MarketplaceConnector>,
    ) -> Self {
        Self {
            listings,
            sync_jobs,
            connector,
        }
    }

    /// Fetch and persist the current competing offers for one listing.
    pub async fn refresh_competitor_offers(
        &self,
        listing: &Listing,
    ) -> Result<Vec<CompetitorOffer>, Box<dyn std::error::Error + Send + Sync>> {
        let quotes = self
            .connector
            .fetch_competitive_pricing(&listing.marketplace, &listing.marketplace_sku)
            .await?;

        let offers: Vec<CompetitorOffer> = quotes
            .iter()
            .map(|q| offer_from_quote(listing.id, q))
            .collect();

        self.listings
            .replace_competitor_offers(listing.id, &offers)
            .await?;

        Ok(offers)
    }

    /// Batch refresh of competitor pricing across an organization's listings
    /// on one marketplace.
    pub async fn sync_competitor_pricing(
        &self,
        organization_id: Uuid,
        marketplace: &str,
    ) -> Result<SyncJob, Box<dyn std::error::Error + Send + Sync>> {
        let mut job = SyncJob::start(organization_id, marketplace, "competitor_pricing");
        self.sync_jobs.create(&job).await?;
        info!(%organization_id, %marketplace, job = %job.id, "competitor pricing sync started");

        let listings = self
            .listings
            .list_listings(organization_id, Some(marketplace), 500)
            .await?;

        let mut records = 0u32;
        let mut failures = 0u32;

        for listing in &listings {
            match self.refresh_competitor_offers(listing).await {
                Ok(offers) => records += offers.len() as u32,
                Err(e) => {
                    failures += 1;
                    warn!(listing = %listing.id, error = %e, "competitor refresh failed");
                }
            }
        }

        if failures > 0 && records == 0 {
            job.fail(format!("all {} listings failed to refresh", failures));
        } else {
            job.complete(records);
        }
        self.sync_jobs.update(&job).await?;

        info!(job = %job.id, records, failures, "competitor pricing sync finished");
        Ok(job)
    }

    /// Reconcile listing quantities against a marketplace inventory report:
    /// seed from the reported totals, subtract units held by pending orders,
    /// then write back the available quantity per listing.
    pub async fn reconcile_inventory(
        &self,
        organization_id: Uuid,
        marketplace: &str,
        reported_totals: &[(String, i32)],
        pending_orders: &[(String, i32)],
    ) -> Result<SyncJob, Box<dyn std::error::Error + Send + Sync>> {
        let mut job = SyncJob::start(organization_id, marketplace, "inventory");
        self.sync_jobs.create(&job).await?;

        let listings = self
            .listings
            .list_listings(organization_id, Some(marketplace), 500)
            .await?;
        let by_sku: HashMap<&str, &Listing> = listings
            .iter()
            .map(|l| (l.marketplace_sku.as_str(), l))
            .collect();

        let mut tracker = InventoryTracker::new();
        for (sku, total) in reported_totals {
            if let Some(listing) = by_sku.get(sku.as_str()) {
                tracker.seed(listing.id, *total);
            }
        }

        for (sku, units) in pending_orders {
            if let Some(listing) = by_sku.get(sku.as_str()) {
                if let Err(e) = tracker.reserve(&listing.id, *units) {
                    warn!(sku = %sku, error = %e, "order reservation exceeds reported inventory");
                }
            }
        }

        let mut records = 0u32;
        for listing in &listings {
            if let Some(position) = tracker.get(&listing.id) {
                match self
                    .listings
                    .update_listing_quantity(
                        organization_id,
                        listing.id,
                        position.available_quantity,
                    )
                    .await
                {
                    Ok(()) => records += 1,
                    Err(e) => {
                        error!(listing = %listing.id, error = %e, "quantity update failed")
                    }
                }
            }
        }

        job.complete(records);
        self.sync_jobs.update(&job).await?;
        Ok(job)
    }
}

fn offer_from_quote(listing_id: Uuid, quote: &CompetitorQuote) -> CompetitorOffer {
    CompetitorOffer {
        id: Uuid::new_v4(),
        listing_id,
        seller_id: quote.seller_id.clone(),
        seller_name: quote.seller_name.clone(),
        price: quote.price,
        shipping_price: quote.shipping_price,
        condition: quote.condition.clone(),
        fulfillment: match quote.fulfillment.as_str() {
            "fba" => FulfillmentMethod::Fba,
            "fbf" => FulfillmentMethod::Fbf,
            _ => FulfillmentMethod::Fbm,
        },
        rating: None,
        feedback_count: 0,
        is_blacklisted: false,
        is_whitelisted: false,
        last_seen_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_offer_mapping_preserves_landed_price_parts() {
        let listing_id = Uuid::new_v4();
        let quote = CompetitorQuote {
            seller_id: "S1".to_string(),
            seller_name: "Seller One".to_string(),
            price: dec!(21.99),
            shipping_price: dec!(2.49),
            condition: "new".to_string(),
            fulfillment: "fba".to_string(),
            is_buy_box_winner: false,
        };

        let offer = offer_from_quote(listing_id, &quote);
        assert_eq!(offer.listing_id, listing_id);
        assert_eq!(offer.landed_price(), dec!(24.48));
        assert_eq!(offer.fulfillment, FulfillmentMethod::Fba);
        assert!(!offer.is_blacklisted);
    }
}
