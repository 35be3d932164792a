use axum::{
    extract::State,
    http::Method,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod health;
pub mod listings;
pub mod metrics;
pub mod middleware;
pub mod repricing;
pub mod sse;
pub mod state;
pub mod strategies;
pub mod webhooks;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Everything under /v1 is organization-scoped
    let v1 = Router::new()
        .route("/v1/repricing/evaluate", post(repricing::evaluate))
        .route("/v1/repricing/simulate", post(repricing::simulate))
        .route("/v1/repricing/apply", post(repricing::apply))
        .route("/v1/repricing/approvals", get(repricing::list_approvals))
        .route(
            "/v1/repricing/approvals/{id}/approve",
            post(repricing::approve),
        )
        .route(
            "/v1/repricing/approvals/{id}/reject",
            post(repricing::reject),
        )
        .route("/v1/listings", get(listings::list_listings))
        .route("/v1/listings/{id}", get(listings::get_listing))
        .route("/v1/listings/{id}/competitors", get(listings::list_competitors))
        .route("/v1/listings/{id}/price/rollback", post(repricing::rollback))
        .route("/v1/strategies", get(strategies::list_strategies))
        .route("/v1/events/prices", get(sse::price_events))
        .route(
            "/v1/webhooks/{marketplace}/inventory",
            post(webhooks::inventory_webhook),
        )
        .route(
            "/v1/sync/{marketplace}/competitors",
            post(webhooks::trigger_competitor_sync),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::org_auth_middleware,
        ));

    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(v1)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::resiliency::circuit_breaker_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, impl IntoResponse> {
    let ip = addr.ip().to_string();
    let key = format!("ratelimit:{}", ip);

    match state.redis.check_rate_limit(&key, 300, 60).await {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err((
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded",
        )),
        Err(_) => Ok(next.run(req).await), // Fail open
    }
}
