use serde::Deserialize;
use std::env;

use repricer_shared::Masked;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub engine: EngineSettings,
    pub marketplaces: MarketplaceSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub price_events_topic: String,
    pub competitor_events_topic: String,
    pub consumer_group: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Engine-wide defaults; per-strategy settings override these.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    /// Required margin fraction used when a listing has no explicit target.
    #[serde(default = "default_target_margin")]
    pub default_target_margin: f64,
    /// Relative price changes above this fraction park for human approval.
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold_pct: f64,
    /// How long a per-listing reprice lock lives in Redis.
    #[serde(default = "default_lock_ttl")]
    pub reprice_lock_ttl_seconds: u64,
    /// Scheduled sweep cadence.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// A listing is stale once its last sync is older than this.
    #[serde(default = "default_stale_after")]
    pub sweep_stale_after_seconds: u64,
    /// Listings picked up per sweep.
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch_size: i64,
}

fn default_target_margin() -> f64 {
    0.2
}
fn default_approval_threshold() -> f64 {
    0.15
}
fn default_lock_ttl() -> u64 {
    120
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_stale_after() -> u64 {
    900
}
fn default_sweep_batch() -> i64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceSettings {
    #[serde(default)]
    pub sandbox: bool,
    pub amazon: Option<AmazonSettings>,
    pub flipkart: Option<FlipkartSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AmazonSettings {
    pub client_id: String,
    pub client_secret: Masked<String>,
    pub refresh_token: Masked<String>,
    pub seller_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlipkartSettings {
    pub app_id: String,
    pub app_secret: Masked<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Base configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables, e.g. REPRICER__DATABASE__URL
            .add_source(config::Environment::with_prefix("REPRICER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
