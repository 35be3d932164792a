use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health/live
/// Liveness probe: the process is up. No dependency checks here.
pub async fn liveness() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /health/ready
/// Readiness probe: verifies Postgres and Redis before the pod takes
/// traffic. Degraded dependencies turn the response into a 503.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut healthy = true;
    let mut checks = serde_json::Map::new();

    match state.db.ping().await {
        Ok(()) => {
            checks.insert("database".to_string(), json!({ "status": "healthy" }));
        }
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            healthy = false;
            checks.insert(
                "database".to_string(),
                json!({ "status": "unhealthy", "error": e.to_string() }),
            );
        }
    }

    match state.redis.ping().await {
        Ok(()) => {
            checks.insert("cache".to_string(), json!({ "status": "healthy" }));
        }
        Err(e) => {
            tracing::error!("Cache health check failed: {}", e);
            healthy = false;
            checks.insert(
                "cache".to_string(),
                json!({ "status": "unhealthy", "error": e.to_string() }),
            );
        }
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "timestamp": Utc::now().to_rfc3339(),
            "checks": checks,
        })),
    )
}
