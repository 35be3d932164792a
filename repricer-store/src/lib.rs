pub mod app_config;
pub mod database;
pub mod events;
pub mod execution_repo;
pub mod listing_repo;
pub mod redis_repo;
pub mod strategy_repo;
pub mod sync_repo;

pub use database::DbClient;
pub use events::EventProducer;
pub use execution_repo::PgExecutionRepository;
pub use listing_repo::PgListingRepository;
pub use redis_repo::RedisClient;
pub use strategy_repo::PgStrategyRepository;
pub use sync_repo::PgSyncJobRepository;
