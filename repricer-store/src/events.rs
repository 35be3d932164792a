use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

use repricer_shared::models::events::{
    PriceChangedEvent, RepriceEvaluatedEvent, SyncCompletedEvent,
};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    price_topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, price_topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            price_topic: price_topic.to_string(),
        })
    }

    pub async fn publish_price_changed(
        &self,
        event: &PriceChangedEvent,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        self.publish(&self.price_topic, "price.changed", &payload)
            .await
    }

    pub async fn publish_reprice_evaluated(
        &self,
        event: &RepriceEvaluatedEvent,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        self.publish(&self.price_topic, "reprice.evaluated", &payload)
            .await
    }

    pub async fn publish_sync_completed(
        &self,
        event: &SyncCompletedEvent,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        self.publish(&self.price_topic, "sync.completed", &payload)
            .await
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent {} to {}: partition {} offset {}",
                    key, topic, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send {} to {}: {}", key, topic, e);
                Err(e)
            }
        }
    }
}
