use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::OrgClaims;
use crate::state::AppState;
use repricer_catalog::Listing;
use repricer_core::execution::{ApprovalStatus, RuleExecution};
use repricer_rules::context::PricingContext;
use repricer_rules::engine::PricingDecision;
use repricer_shared::models::events::{PriceChangedEvent, RepriceEvaluatedEvent};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub listing_id: Uuid,
    pub strategy_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub listing_ids: Vec<Uuid>,
    pub strategy_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub listing_id: Uuid,
    pub strategy: String,
    pub current_price: rust_decimal::Decimal,
    pub new_price: rust_decimal::Decimal,
    pub confidence: f64,
    pub reason: String,
    pub rules_applied: Vec<String>,
    pub guardrails_passed: bool,
    pub warnings: Vec<String>,
}

impl From<&PricingDecision> for DecisionResponse {
    fn from(decision: &PricingDecision) -> Self {
        Self {
            listing_id: decision.listing_id,
            strategy: decision.strategy_name.clone(),
            current_price: decision.current_price,
            new_price: decision.new_price,
            confidence: decision.confidence,
            reason: decision.reason.clone(),
            rules_applied: decision.rules_applied.clone(),
            guardrails_passed: decision.guardrails_passed,
            warnings: decision.warnings.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub execution_id: Uuid,
    pub status: String,
    #[serde(flatten)]
    pub decision: DecisionResponse,
}

// ============================================================================
// Shared repricing flow (handlers + background worker)
// ============================================================================

/// Whether a decision can go straight to the marketplace or needs a human.
pub fn decide_approval(decision: &PricingDecision, approval_threshold: f64) -> ApprovalStatus {
    if decision.change_fraction() > approval_threshold {
        ApprovalStatus::PendingApproval
    } else {
        ApprovalStatus::AutoApplied
    }
}

/// Assemble the pricing context for a listing from persisted state.
pub async fn build_context(
    state: &AppState,
    organization_id: Uuid,
    listing_id: Uuid,
) -> Result<(Listing, PricingContext), AppError> {
    let listing = state
        .listings
        .get_listing(organization_id, listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("listing {}", listing_id)))?;

    let product = state
        .listings
        .get_product(organization_id, listing.product_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("product {}", listing.product_id)))?;

    let offers = state
        .listings
        .competitor_offers(listing.id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let fee_schedule = state
        .listings
        .fee_schedule(
            organization_id,
            &listing.marketplace,
            product.category.as_deref(),
        )
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let ctx = PricingContext::for_listing(
        &listing,
        &product,
        &offers,
        fee_schedule.as_ref(),
        state.engine_settings.default_target_margin,
    );

    Ok((listing, ctx))
}

pub struct RepriceOutcome {
    pub execution_id: Uuid,
    pub decision: PricingDecision,
    pub approval: ApprovalStatus,
    pub emitted: bool,
}

/// Evaluate one listing and, when allowed, push the new price to the
/// marketplace. The single entry point used by the apply endpoint, the
/// event-driven worker and the scheduled sweep.
pub async fn execute_reprice(
    state: &AppState,
    organization_id: Uuid,
    listing_id: Uuid,
    strategy_id: Option<Uuid>,
    source: &str,
) -> Result<RepriceOutcome, AppError> {
    let (listing, ctx) = build_context(state, organization_id, listing_id).await?;

    listing
        .ensure_repriceable()
        .map_err(|e| AppError::ConflictError(e.to_string()))?;

    let bundle = state
        .strategies
        .load_bundle(organization_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let decision = state.engine.evaluate(&bundle, strategy_id, &ctx);
    state.metrics.evaluations_total.inc();

    let _ = state
        .kafka
        .publish_reprice_evaluated(&RepriceEvaluatedEvent {
            listing_id,
            organization_id,
            strategy: decision.strategy_name.clone(),
            current_price: decision.current_price,
            proposed_price: decision.new_price,
            confidence: decision.confidence,
            guardrails_passed: decision.guardrails_passed,
            evaluated_at: Utc::now().timestamp(),
        })
        .await;

    // Nothing to emit: either guardrails rejected the change or the rules
    // landed on the current price.
    if !decision.guardrails_passed || !decision.price_changed() {
        if !decision.guardrails_passed {
            state.metrics.guardrail_rejections_total.inc();
        }
        let execution = RuleExecution::from_decision(
            organization_id,
            &listing.marketplace,
            &decision,
            ApprovalStatus::AutoApplied,
        );
        let execution_id = state
            .executions
            .record(&execution)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        return Ok(RepriceOutcome {
            execution_id,
            decision,
            approval: ApprovalStatus::AutoApplied,
            emitted: false,
        });
    }

    let approval = decide_approval(&decision, state.engine_settings.approval_threshold_pct);

    if approval == ApprovalStatus::PendingApproval {
        state.metrics.approvals_pending_total.inc();
        let execution = RuleExecution::from_decision(
            organization_id,
            &listing.marketplace,
            &decision,
            ApprovalStatus::PendingApproval,
        );
        let execution_id = state
            .executions
            .record(&execution)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        tracing::info!(
            listing = %listing_id,
            change = decision.change_fraction(),
            "price change parked for approval"
        );
        return Ok(RepriceOutcome {
            execution_id,
            decision,
            approval: ApprovalStatus::PendingApproval,
            emitted: false,
        });
    }

    emit_price(state, &listing, decision.new_price, source).await?;

    let mut execution = RuleExecution::from_decision(
        organization_id,
        &listing.marketplace,
        &decision,
        ApprovalStatus::AutoApplied,
    );
    execution.emitted = true;
    let execution_id = state
        .executions
        .record(&execution)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(RepriceOutcome {
        execution_id,
        decision,
        approval: ApprovalStatus::AutoApplied,
        emitted: true,
    })
}

/// Submit to the marketplace, persist the new price, and fan out events.
async fn emit_price(
    state: &AppState,
    listing: &Listing,
    price: rust_decimal::Decimal,
    source: &str,
) -> Result<(), AppError> {
    state
        .connector
        .submit_price(
            &listing.marketplace,
            &listing.marketplace_sku,
            price,
            &listing.currency,
        )
        .await
        .map_err(|e| {
            state
                .metrics
                .emission_failures_total
                .with_label_values(&[listing.marketplace.as_str()])
                .inc();
            AppError::UpstreamError(e.to_string())
        })?;

    state
        .listings
        .update_listing_price(listing.organization_id, listing.id, price, source)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    state.metrics.prices_emitted_total.inc();

    let event = PriceChangedEvent {
        listing_id: listing.id,
        organization_id: listing.organization_id,
        marketplace: listing.marketplace.clone(),
        old_price: listing.current_price,
        new_price: price,
        source: source.to_string(),
        changed_at: Utc::now().timestamp(),
    };
    let _ = state.kafka.publish_price_changed(&event).await;
    let _ = state.sse_tx.send(event);

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/repricing/evaluate
/// Dry-run evaluation of one listing; nothing is written or emitted.
pub async fn evaluate(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    let (_, ctx) = build_context(&state, claims.organization_id, req.listing_id).await?;

    let bundle = state
        .strategies
        .load_bundle(claims.organization_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let decision = state.engine.evaluate(&bundle, req.strategy_id, &ctx);
    state.metrics.evaluations_total.inc();

    Ok(Json(DecisionResponse::from(&decision)))
}

/// POST /v1/repricing/simulate
/// Batch dry-run across listings.
pub async fn simulate(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<Vec<DecisionResponse>>, AppError> {
    if req.listing_ids.is_empty() {
        return Err(AppError::ValidationError(
            "listing_ids must not be empty".to_string(),
        ));
    }
    if req.listing_ids.len() > 200 {
        return Err(AppError::ValidationError(
            "at most 200 listings per simulation".to_string(),
        ));
    }

    let bundle = state
        .strategies
        .load_bundle(claims.organization_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let mut contexts = Vec::with_capacity(req.listing_ids.len());
    for listing_id in &req.listing_ids {
        let (_, ctx) = build_context(&state, claims.organization_id, *listing_id).await?;
        contexts.push(ctx);
    }

    let decisions = state.engine.simulate(&bundle, req.strategy_id, &contexts);
    Ok(Json(decisions.iter().map(DecisionResponse::from).collect()))
}

/// POST /v1/repricing/apply
/// Evaluate and emit, honoring the approval threshold.
pub async fn apply(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<ApplyResponse>, AppError> {
    let locked = state
        .redis
        .acquire_reprice_lock(
            req.listing_id,
            &claims.sub,
            state.engine_settings.reprice_lock_ttl_seconds,
        )
        .await
        .unwrap_or(true); // Fail open: a broken lock store must not stop pricing

    if !locked {
        return Err(AppError::ConflictError(format!(
            "listing {} is already being repriced",
            req.listing_id
        )));
    }

    let outcome = execute_reprice(
        &state,
        claims.organization_id,
        req.listing_id,
        req.strategy_id,
        "engine",
    )
    .await;

    let _ = state.redis.release_reprice_lock(req.listing_id).await;
    let outcome = outcome?;

    Ok(Json(ApplyResponse {
        execution_id: outcome.execution_id,
        status: if outcome.emitted {
            "emitted".to_string()
        } else {
            outcome.approval.as_str().to_string()
        },
        decision: DecisionResponse::from(&outcome.decision),
    }))
}

// ============================================================================
// Approvals
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PendingApprovalResponse {
    pub execution_id: Uuid,
    pub listing_id: Uuid,
    pub strategy: String,
    pub original_price: rust_decimal::Decimal,
    pub calculated_price: rust_decimal::Decimal,
    pub reason: String,
    pub executed_at: chrono::DateTime<Utc>,
}

/// GET /v1/repricing/approvals
pub async fn list_approvals(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
) -> Result<Json<Vec<PendingApprovalResponse>>, AppError> {
    let pending = state
        .executions
        .list_pending(claims.organization_id, 100)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(
        pending
            .into_iter()
            .map(|e| PendingApprovalResponse {
                execution_id: e.id,
                listing_id: e.listing_id,
                strategy: e.strategy_name,
                original_price: e.original_price,
                calculated_price: e.calculated_price,
                reason: e.reason,
                executed_at: e.executed_at,
            })
            .collect(),
    ))
}

/// POST /v1/repricing/approvals/:id/approve
/// Human sign-off: emit the parked price.
pub async fn approve(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError(
            "approvals require an admin role".to_string(),
        ));
    }

    let execution = state
        .executions
        .get(claims.organization_id, execution_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("execution {}", execution_id)))?;

    execution
        .ensure_pending()
        .map_err(|e| AppError::ConflictError(e.to_string()))?;

    let listing = state
        .listings
        .get_listing(claims.organization_id, execution.listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("listing {}", execution.listing_id)))?;

    emit_price(&state, &listing, execution.calculated_price, "engine").await?;

    state
        .executions
        .set_approval(
            claims.organization_id,
            execution_id,
            ApprovalStatus::Approved,
            true,
        )
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "execution_id": execution_id,
        "status": "approved",
        "emitted_price": execution.calculated_price,
    })))
}

/// POST /v1/repricing/approvals/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError(
            "approvals require an admin role".to_string(),
        ));
    }

    let execution = state
        .executions
        .get(claims.organization_id, execution_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("execution {}", execution_id)))?;

    execution
        .ensure_pending()
        .map_err(|e| AppError::ConflictError(e.to_string()))?;

    state
        .executions
        .set_approval(
            claims.organization_id,
            execution_id,
            ApprovalStatus::Rejected,
            false,
        )
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "execution_id": execution_id,
        "status": "rejected",
    })))
}

/// POST /v1/listings/:id/price/rollback
/// Re-emit the previously emitted price.
pub async fn rollback(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !claims.is_admin() {
        return Err(AppError::AuthorizationError(
            "rollback requires an admin role".to_string(),
        ));
    }

    let listing = state
        .listings
        .get_listing(claims.organization_id, listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("listing {}", listing_id)))?;

    let previous = state
        .listings
        .previous_price(listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| {
            AppError::ConflictError(format!("listing {} has no prior price", listing_id))
        })?;

    emit_price(&state, &listing, previous, "rollback").await?;

    Ok(Json(serde_json::json!({
        "listing_id": listing_id,
        "rolled_back_to": previous,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn decision(current: rust_decimal::Decimal, new: rust_decimal::Decimal) -> PricingDecision {
        PricingDecision {
            listing_id: Uuid::new_v4(),
            strategy_id: Some(Uuid::new_v4()),
            strategy_name: "competitive".to_string(),
            current_price: current,
            new_price: new,
            confidence: 0.9,
            reason: "test".to_string(),
            rules_applied: vec![],
            guardrails_passed: true,
            warnings: vec![],
            metadata: serde_json::json!({}),
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_small_changes_auto_apply() {
        let d = decision(dec!(100.00), dec!(104.00));
        assert_eq!(decide_approval(&d, 0.15), ApprovalStatus::AutoApplied);
    }

    #[test]
    fn test_large_changes_need_approval() {
        let d = decision(dec!(100.00), dec!(79.00));
        assert_eq!(decide_approval(&d, 0.15), ApprovalStatus::PendingApproval);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let d = decision(dec!(100.00), dec!(115.00));
        // Exactly at the threshold still auto-applies
        assert_eq!(decide_approval(&d, 0.15), ApprovalStatus::AutoApplied);
    }
}
