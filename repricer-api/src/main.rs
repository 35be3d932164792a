use std::net::SocketAddr;
use std::sync::Arc;

use repricer_api::{app, metrics::Metrics, middleware::resiliency::Resiliency, state::{AppState, AuthConfig}};
use repricer_market::{
    AmazonCredentials, AmazonSpApiClient, FlipkartClient, FlipkartCredentials,
    MarketplacePriceEmitter, SyncService,
};
use repricer_rules::engine::{EngineConfig, RepricingEngine};
use repricer_store::{
    DbClient, EventProducer, PgExecutionRepository, PgListingRepository, PgStrategyRepository,
    PgSyncJobRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "repricer_api=debug,repricer_rules=debug,tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = repricer_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Repricer API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let db = Arc::new(db);

    // Redis
    let redis = RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis = Arc::new(redis);

    // Kafka
    let kafka = EventProducer::new(&config.kafka.brokers, &config.kafka.price_events_topic)
        .expect("Failed to create Kafka producer");
    let kafka = Arc::new(kafka);

    // Repositories
    let listings = Arc::new(PgListingRepository::new(db.pool.clone()));
    let strategies = Arc::new(PgStrategyRepository::new(db.pool.clone()));
    let executions = Arc::new(PgExecutionRepository::new(db.pool.clone()));
    let sync_jobs = Arc::new(PgSyncJobRepository::new(db.pool.clone()));

    // Marketplace clients from configured credentials
    let sandbox = config.marketplaces.sandbox;
    let amazon = config.marketplaces.amazon.as_ref().map(|settings| {
        Arc::new(AmazonSpApiClient::new(
            AmazonCredentials {
                client_id: settings.client_id.clone(),
                client_secret: settings.client_secret.clone(),
                refresh_token: settings.refresh_token.clone(),
                seller_id: settings.seller_id.clone(),
            },
            sandbox,
        ))
    });
    let flipkart = config.marketplaces.flipkart.as_ref().map(|settings| {
        Arc::new(FlipkartClient::new(
            FlipkartCredentials {
                app_id: settings.app_id.clone(),
                app_secret: settings.app_secret.clone(),
            },
            sandbox,
        ))
    });
    let connector = Arc::new(MarketplacePriceEmitter::new(amazon, flipkart));

    let sync = Arc::new(SyncService::new(
        listings.clone(),
        sync_jobs.clone(),
        connector.clone(),
    ));

    // SSE broadcast channel for dashboard price updates
    let (sse_tx, _) = tokio::sync::broadcast::channel(100);

    let app_state = AppState {
        db: db.clone(),
        redis: redis.clone(),
        kafka: kafka.clone(),
        listings,
        strategies,
        executions,
        sync_jobs,
        connector,
        sync,
        engine: Arc::new(RepricingEngine::new(EngineConfig::default())),
        engine_settings: config.engine.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        sse_tx,
        resiliency: Arc::new(Resiliency::new()),
        metrics: Arc::new(Metrics::new()),
    };

    // Background workers: event-driven repricing and the scheduled sweep
    tokio::spawn(repricer_api::worker::start_competitor_worker(
        config.kafka.brokers.clone(),
        config.kafka.consumer_group.clone(),
        config.kafka.competitor_events_topic.clone(),
        app_state.clone(),
    ));
    tokio::spawn(repricer_api::worker::start_sweep_worker(app_state.clone()));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
