use axum::{extract::State, http::StatusCode};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// Prometheus metrics for the repricing engine.
pub struct Metrics {
    pub registry: Registry,
    pub evaluations_total: IntCounter,
    pub prices_emitted_total: IntCounter,
    pub guardrail_rejections_total: IntCounter,
    pub approvals_pending_total: IntCounter,
    pub emission_failures_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let evaluations_total =
            IntCounter::new("reprice_evaluations_total", "Repricing evaluations run").unwrap();
        let prices_emitted_total =
            IntCounter::new("reprice_prices_emitted_total", "Price changes emitted").unwrap();
        let guardrail_rejections_total = IntCounter::new(
            "reprice_guardrail_rejections_total",
            "Decisions rejected by guardrails",
        )
        .unwrap();
        let approvals_pending_total = IntCounter::new(
            "reprice_approvals_pending_total",
            "Decisions parked for human approval",
        )
        .unwrap();
        let emission_failures_total = IntCounterVec::new(
            Opts::new(
                "reprice_emission_failures_total",
                "Failed marketplace price submissions",
            ),
            &["marketplace"],
        )
        .unwrap();

        registry
            .register(Box::new(evaluations_total.clone()))
            .unwrap();
        registry
            .register(Box::new(prices_emitted_total.clone()))
            .unwrap();
        registry
            .register(Box::new(guardrail_rejections_total.clone()))
            .unwrap();
        registry
            .register(Box::new(approvals_pending_total.clone()))
            .unwrap();
        registry
            .register(Box::new(emission_failures_total.clone()))
            .unwrap();

        Self {
            registry,
            evaluations_total,
            prices_emitted_total,
            guardrail_rejections_total,
            approvals_pending_total,
            emission_failures_total,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let families = state.metrics.registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
