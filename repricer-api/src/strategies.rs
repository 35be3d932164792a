use axum::{extract::State, Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::OrgClaims;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StrategyResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub is_active: bool,
    pub is_default: bool,
    pub rule_set_count: usize,
    pub constraint_count: usize,
    pub switch_count: usize,
}

/// GET /v1/strategies
pub async fn list_strategies(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
) -> Result<Json<Vec<StrategyResponse>>, AppError> {
    let bundle = state
        .strategies
        .load_bundle(claims.organization_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(
        bundle
            .strategies
            .iter()
            .map(|s| StrategyResponse {
                id: s.id,
                name: s.name.clone(),
                kind: s.kind.as_str().to_string(),
                is_active: s.is_active,
                is_default: s.is_default,
                rule_set_count: s.rule_sets.len(),
                constraint_count: s.constraints.len(),
                switch_count: s.switches.len(),
            })
            .collect(),
    ))
}
