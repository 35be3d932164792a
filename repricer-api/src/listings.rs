use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::OrgClaims;
use crate::state::AppState;
use repricer_catalog::Listing;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub marketplace: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub marketplace: String,
    pub marketplace_sku: String,
    pub title: String,
    pub current_price: rust_decimal::Decimal,
    pub currency: String,
    pub quantity: i32,
    pub status: String,
    pub has_buy_box: bool,
    pub buy_box_price: Option<rust_decimal::Decimal>,
    pub last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        Self {
            id: listing.id,
            product_id: listing.product_id,
            marketplace: listing.marketplace,
            marketplace_sku: listing.marketplace_sku,
            title: listing.title,
            current_price: listing.current_price,
            currency: listing.currency,
            quantity: listing.quantity,
            status: format!("{:?}", listing.status).to_lowercase(),
            has_buy_box: listing.has_buy_box,
            buy_box_price: listing.buy_box_price,
            last_synced_at: listing.last_synced_at,
        }
    }
}

/// GET /v1/listings
pub async fn list_listings(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);

    let listings = state
        .listings
        .list_listings(
            claims.organization_id,
            query.marketplace.as_deref(),
            limit,
        )
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(listings.into_iter().map(ListingResponse::from).collect()))
}

/// GET /v1/listings/:id
pub async fn get_listing(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<ListingResponse>, AppError> {
    let listing = state
        .listings
        .get_listing(claims.organization_id, listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("listing {}", listing_id)))?;

    Ok(Json(ListingResponse::from(listing)))
}

#[derive(Debug, Serialize)]
pub struct CompetitorResponse {
    pub seller_name: String,
    pub landed_price: rust_decimal::Decimal,
    pub condition: String,
    pub fulfillment: String,
    pub is_blacklisted: bool,
}

/// GET /v1/listings/:id/competitors
pub async fn list_competitors(
    State(state): State<AppState>,
    Extension(claims): Extension<OrgClaims>,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Vec<CompetitorResponse>>, AppError> {
    // Confirm the listing belongs to the caller's organization first
    state
        .listings
        .get_listing(claims.organization_id, listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError(format!("listing {}", listing_id)))?;

    let offers = state
        .listings
        .competitor_offers(listing_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let mut competitors: Vec<CompetitorResponse> = offers
        .into_iter()
        .map(|o| CompetitorResponse {
            seller_name: o.seller_name.clone(),
            landed_price: o.landed_price(),
            condition: o.condition.clone(),
            fulfillment: o.fulfillment.as_str().to_string(),
            is_blacklisted: o.is_blacklisted,
        })
        .collect();
    competitors.sort_by(|a, b| a.landed_price.cmp(&b.landed_price));

    Ok(Json(competitors))
}
