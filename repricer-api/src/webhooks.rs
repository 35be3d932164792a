use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::auth::OrgClaims;
use crate::state::AppState;
use repricer_shared::models::events::SyncCompletedEvent;

#[derive(Debug, Deserialize)]
pub struct InventoryWebhookPayload {
    /// Reported total quantity per marketplace SKU.
    pub totals: Vec<SkuQuantity>,
    /// Units currently held by pending orders, per SKU.
    #[serde(default)]
    pub pending_orders: Vec<SkuQuantity>,
}

#[derive(Debug, Deserialize)]
pub struct SkuQuantity {
    pub sku: String,
    pub quantity: i32,
}

/// POST /v1/webhooks/:marketplace/inventory
/// Marketplace inventory report: reconcile listing quantities.
pub async fn inventory_webhook(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(marketplace): Path<String>,
    Json(payload): Json<InventoryWebhookPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let totals: Vec<(String, i32)> = payload
        .totals
        .into_iter()
        .map(|s| (s.sku, s.quantity))
        .collect();
    let pending: Vec<(String, i32)> = payload
        .pending_orders
        .into_iter()
        .map(|s| (s.sku, s.quantity))
        .collect();

    let job = state
        .sync
        .reconcile_inventory(claims.organization_id, &marketplace, &totals, &pending)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let _ = state
        .kafka
        .publish_sync_completed(&SyncCompletedEvent {
            job_id: job.id,
            organization_id: claims.organization_id,
            marketplace: marketplace.clone(),
            records_processed: job.records_processed,
            status: job.status.as_str().to_string(),
            completed_at: Utc::now().timestamp(),
        })
        .await;

    Ok(Json(json!({
        "job_id": job.id,
        "status": job.status.as_str(),
        "records_processed": job.records_processed,
    })))
}

/// POST /v1/sync/:marketplace/competitors
/// Batch refresh of competitor pricing for the caller's listings.
pub async fn trigger_competitor_sync(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(marketplace): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = state
        .sync
        .sync_competitor_pricing(claims.organization_id, &marketplace)
        .await
        .map_err(|e| AppError::UpstreamError(e.to_string()))?;

    let _ = state
        .kafka
        .publish_sync_completed(&SyncCompletedEvent {
            job_id: job.id,
            organization_id: claims.organization_id,
            marketplace: marketplace.clone(),
            records_processed: job.records_processed,
            status: job.status.as_str().to_string(),
            completed_at: Utc::now().timestamp(),
        })
        .await;

    Ok(Json(json!({
        "job_id": job.id,
        "status": job.status.as_str(),
        "records_processed": job.records_processed,
    })))
}
