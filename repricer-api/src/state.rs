use std::sync::Arc;
use tokio::sync::broadcast;

use crate::metrics::Metrics;
use crate::middleware::resiliency::Resiliency;
use repricer_core::connector::MarketplaceConnector;
use repricer_core::repository::{
    ExecutionRepository, ListingRepository, StrategyRepository, SyncJobRepository,
};
use repricer_market::SyncService;
use repricer_rules::engine::RepricingEngine;
use repricer_shared::models::events::PriceChangedEvent;
use repricer_store::app_config::EngineSettings;
use repricer_store::{DbClient, EventProducer, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbClient>,
    pub redis: Arc<RedisClient>,
    pub kafka: Arc<EventProducer>,
    pub listings: Arc<dyn ListingRepository>,
    pub strategies: Arc<dyn StrategyRepository>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub sync_jobs: Arc<dyn SyncJobRepository>,
    pub connector: Arc<dyn MarketplaceConnector>,
    pub sync: Arc<SyncService>,
    pub engine: Arc<RepricingEngine>,
    pub engine_settings: EngineSettings,
    pub auth: AuthConfig,
    pub sse_tx: broadcast::Sender<PriceChangedEvent>,
    pub resiliency: Arc<Resiliency>,
    pub metrics: Arc<Metrics>,
}
