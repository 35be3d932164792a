use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::execution::{ApprovalStatus, RuleExecution, SyncJob};
use repricer_catalog::{CompetitorOffer, FeeSchedule, Listing, Product};
use repricer_rules::strategy::StrategyBundle;

/// Repository trait for listing and market data access. All reads and writes
/// are scoped to an organization.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn get_listing(
        &self,
        organization_id: Uuid,
        listing_id: Uuid,
    ) -> Result<Option<Listing>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_listings(
        &self,
        organization_id: Uuid,
        marketplace: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Listing>, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_product(
        &self,
        organization_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, Box<dyn std::error::Error + Send + Sync>>;

    /// Update the listing price and append a price-history row.
    async fn update_listing_price(
        &self,
        organization_id: Uuid,
        listing_id: Uuid,
        price: Decimal,
        source: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn update_listing_quantity(
        &self,
        organization_id: Uuid,
        listing_id: Uuid,
        quantity: i32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn competitor_offers(
        &self,
        listing_id: Uuid,
    ) -> Result<Vec<CompetitorOffer>, Box<dyn std::error::Error + Send + Sync>>;

    async fn replace_competitor_offers(
        &self,
        listing_id: Uuid,
        offers: &[CompetitorOffer],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// The price emitted immediately before the current one, for rollback.
    async fn previous_price(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<Decimal>, Box<dyn std::error::Error + Send + Sync>>;

    /// Active listings whose last sync is older than the cutoff, across all
    /// organizations. Drives the scheduled repricing sweep.
    async fn stale_listings(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Listing>, Box<dyn std::error::Error + Send + Sync>>;

    async fn fee_schedule(
        &self,
        organization_id: Uuid,
        marketplace: &str,
        category: Option<&str>,
    ) -> Result<Option<FeeSchedule>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for pricing strategies, rules, constraints and
/// conditional switches.
#[async_trait]
pub trait StrategyRepository: Send + Sync {
    async fn load_bundle(
        &self,
        organization_id: Uuid,
    ) -> Result<StrategyBundle, Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for the engine audit log and the approval queue.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn record(
        &self,
        execution: &RuleExecution,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;

    async fn get(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Option<RuleExecution>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_pending(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RuleExecution>, Box<dyn std::error::Error + Send + Sync>>;

    async fn set_approval(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
        status: ApprovalStatus,
        emitted: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Repository trait for marketplace sync jobs.
#[async_trait]
pub trait SyncJobRepository: Send + Sync {
    async fn create(
        &self,
        job: &SyncJob,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;

    async fn update(
        &self,
        job: &SyncJob,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
