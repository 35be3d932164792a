use chrono::{Duration as ChronoDuration, Utc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::repricing::execute_reprice;
use crate::state::AppState;
use repricer_shared::models::events::CompetitorPricesUpdatedEvent;

/// Kafka-driven repricing: whenever a competitor price update lands for a
/// listing, refresh its offers and re-evaluate under the reprice lock.
pub async fn start_competitor_worker(brokers: String, group_id: String, topic: String, state: AppState) {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", &group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("Consumer creation failed");

    consumer
        .subscribe(&[topic.as_str()])
        .expect("Can't subscribe to competitor events");

    info!("Competitor worker started, listening on {}...", topic);

    loop {
        match consumer.recv().await {
            Err(e) => error!("Kafka error: {}", e),
            Ok(m) => {
                let payload = match m.payload_view::<str>() {
                    Some(Ok(payload)) => payload,
                    Some(Err(e)) => {
                        error!("Error reading payload: {}", e);
                        continue;
                    }
                    None => continue,
                };

                match serde_json::from_str::<CompetitorPricesUpdatedEvent>(payload) {
                    Ok(event) => {
                        if let Err(e) = handle_competitor_update(&state, &event).await {
                            error!(listing = %event.listing_id, "reprice failed: {}", e);
                        }
                    }
                    Err(e) => warn!("Skipping malformed competitor event: {}", e),
                }
            }
        }
    }
}

async fn handle_competitor_update(
    state: &AppState,
    event: &CompetitorPricesUpdatedEvent,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let locked = state
        .redis
        .acquire_reprice_lock(
            event.listing_id,
            "competitor-worker",
            state.engine_settings.reprice_lock_ttl_seconds,
        )
        .await
        .unwrap_or(true);

    if !locked {
        // Another evaluation is in flight; this event's data will be picked
        // up by the next one.
        return Ok(());
    }

    let result = async {
        if let Some(listing) = state
            .listings
            .get_listing(event.organization_id, event.listing_id)
            .await?
        {
            // Skip the marketplace round trip when a fresh snapshot exists;
            // event bursts for one listing collapse into a single fetch.
            let cached = state
                .redis
                .get_competitor_snapshot(event.listing_id)
                .await
                .unwrap_or(None);

            if cached.is_none() {
                let offers = state.sync.refresh_competitor_offers(&listing).await?;
                if let Ok(snapshot) = serde_json::to_string(&offers) {
                    let _ = state
                        .redis
                        .set_competitor_snapshot(event.listing_id, &snapshot, 60)
                        .await;
                }
            }

            execute_reprice(
                state,
                event.organization_id,
                event.listing_id,
                None,
                "engine",
            )
            .await
            .map_err(|e| format!("{:?}", e))?;
        }
        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    }
    .await;

    let _ = state.redis.release_reprice_lock(event.listing_id).await;
    result
}

/// Scheduled sweep over stale listings, the Celery-beat analog: refresh
/// competitor offers and re-evaluate anything that has not been touched
/// within the staleness window.
pub async fn start_sweep_worker(state: AppState) {
    let settings = state.engine_settings.clone();
    let mut ticker = interval(Duration::from_secs(settings.sweep_interval_seconds));

    info!(
        "Sweep worker started: every {}s, staleness {}s",
        settings.sweep_interval_seconds, settings.sweep_stale_after_seconds
    );

    loop {
        ticker.tick().await;

        let cutoff = Utc::now() - ChronoDuration::seconds(settings.sweep_stale_after_seconds as i64);
        let stale = match state
            .listings
            .stale_listings(cutoff, settings.sweep_batch_size)
            .await
        {
            Ok(stale) => stale,
            Err(e) => {
                error!("Failed to load stale listings: {}", e);
                continue;
            }
        };

        if stale.is_empty() {
            continue;
        }
        info!("Sweep picked up {} stale listings", stale.len());

        for listing in stale {
            let locked = state
                .redis
                .acquire_reprice_lock(
                    listing.id,
                    "sweep-worker",
                    settings.reprice_lock_ttl_seconds,
                )
                .await
                .unwrap_or(true);
            if !locked {
                continue;
            }

            if let Err(e) = state.sync.refresh_competitor_offers(&listing).await {
                warn!(listing = %listing.id, "competitor refresh failed: {}", e);
            }

            match execute_reprice(&state, listing.organization_id, listing.id, None, "engine").await
            {
                Ok(outcome) => {
                    if outcome.emitted {
                        info!(
                            listing = %listing.id,
                            price = %outcome.decision.new_price,
                            "sweep repriced listing"
                        );
                    }
                }
                Err(e) => warn!(listing = %listing.id, "sweep reprice failed: {:?}", e),
            }

            let _ = state.redis.release_reprice_lock(listing.id).await;
        }
    }
}
