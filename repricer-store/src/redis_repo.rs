use redis::{AsyncCommands, RedisResult};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// One in-flight reprice per listing. SET NX EX: the lock is taken only
    /// if nobody holds it, and the TTL bounds recovery after a crash.
    pub async fn acquire_reprice_lock(
        &self,
        listing_id: Uuid,
        owner: &str,
        ttl_seconds: u64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("reprice:lock:{}", listing_id);

        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(owner)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        let acquired = result.is_some();
        debug!(listing = %listing_id, acquired, "reprice lock");
        Ok(acquired)
    }

    pub async fn release_reprice_lock(&self, listing_id: Uuid) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("reprice:lock:{}", listing_id);
        conn.del(key).await
    }

    /// Cache the latest competitor snapshot so event-driven evaluations
    /// avoid a marketplace round trip.
    pub async fn set_competitor_snapshot(
        &self,
        listing_id: Uuid,
        snapshot_json: &str,
        ttl_seconds: u64,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("competitors:{}", listing_id);
        conn.set_ex(key, snapshot_json, ttl_seconds).await
    }

    pub async fn get_competitor_snapshot(&self, listing_id: Uuid) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("competitors:{}", listing_id);
        conn.get(key).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }

    /// Connectivity probe for the readiness endpoint.
    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await
    }
}
