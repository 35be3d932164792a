use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use repricer_catalog::{
    CompetitorOffer, FeeSchedule, FulfillmentMethod, Listing, ListingStatus, Marketplace, Product,
};
use repricer_core::repository::ListingRepository;

type RepoError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgListingRepository {
    pool: PgPool,
}

impl PgListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    organization_id: Uuid,
    product_id: Uuid,
    marketplace: String,
    marketplace_sku: String,
    marketplace_product_id: Option<String>,
    title: String,
    current_price: Decimal,
    currency: String,
    quantity: i32,
    fulfillment: String,
    status: String,
    has_buy_box: bool,
    buy_box_price: Option<Decimal>,
    lowest_price: Option<Decimal>,
    sales_rank: Option<i32>,
    last_synced_at: Option<DateTime<Utc>>,
    attributes: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ListingRow {
    fn into_listing(self) -> Listing {
        Listing {
            id: self.id,
            organization_id: self.organization_id,
            product_id: self.product_id,
            marketplace: self.marketplace,
            marketplace_sku: self.marketplace_sku,
            marketplace_product_id: self.marketplace_product_id,
            title: self.title,
            current_price: self.current_price,
            currency: self.currency,
            quantity: self.quantity,
            fulfillment: parse_fulfillment(&self.fulfillment),
            status: parse_status(&self.status),
            has_buy_box: self.has_buy_box,
            buy_box_price: self.buy_box_price,
            lowest_price: self.lowest_price,
            sales_rank: self.sales_rank,
            last_synced_at: self.last_synced_at,
            attributes: self.attributes,
            created_at: self.created_at,
        }
    }
}

fn parse_fulfillment(value: &str) -> FulfillmentMethod {
    match value {
        "fba" => FulfillmentMethod::Fba,
        "fbf" => FulfillmentMethod::Fbf,
        _ => FulfillmentMethod::Fbm,
    }
}

fn parse_status(value: &str) -> ListingStatus {
    match value {
        "active" => ListingStatus::Active,
        "pending" => ListingStatus::Pending,
        "rejected" => ListingStatus::Rejected,
        "suppressed" => ListingStatus::Suppressed,
        _ => ListingStatus::Inactive,
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    organization_id: Uuid,
    sku: String,
    title: String,
    brand: Option<String>,
    category: Option<String>,
    asin: Option<String>,
    upc: Option<String>,
    cost_price: Decimal,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    total_inventory: i32,
    reserved_inventory: i32,
    is_active: bool,
    attributes: serde_json::Value,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CompetitorOfferRow {
    id: Uuid,
    listing_id: Uuid,
    seller_id: String,
    seller_name: String,
    price: Decimal,
    shipping_price: Decimal,
    condition: String,
    fulfillment: String,
    rating: Option<f64>,
    feedback_count: i32,
    is_blacklisted: bool,
    is_whitelisted: bool,
    last_seen_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MarketplaceRow {
    code: String,
    name: String,
    country: String,
    currency: String,
    referral_fee_rate: Decimal,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct FeeScheduleRow {
    marketplace: String,
    category: Option<String>,
    referral_fee_rate: Decimal,
    variable_closing_fee: Decimal,
    per_item_fee: Decimal,
    fulfillment_fee_per_unit: Decimal,
    effective_from: DateTime<Utc>,
    effective_until: Option<DateTime<Utc>>,
}

const LISTING_COLUMNS: &str = "id, organization_id, product_id, marketplace, marketplace_sku, \
     marketplace_product_id, title, current_price, currency, quantity, fulfillment, status, \
     has_buy_box, buy_box_price, lowest_price, sales_rank, last_synced_at, attributes, created_at";

#[async_trait]
impl ListingRepository for PgListingRepository {
    async fn get_listing(
        &self,
        organization_id: Uuid,
        listing_id: Uuid,
    ) -> Result<Option<Listing>, RepoError> {
        let row: Option<ListingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM listings WHERE organization_id = $1 AND id = $2",
            LISTING_COLUMNS
        ))
        .bind(organization_id)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ListingRow::into_listing))
    }

    async fn list_listings(
        &self,
        organization_id: Uuid,
        marketplace: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Listing>, RepoError> {
        let rows: Vec<ListingRow> = match marketplace {
            Some(marketplace) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM listings \
                     WHERE organization_id = $1 AND marketplace = $2 \
                     ORDER BY created_at LIMIT $3",
                    LISTING_COLUMNS
                ))
                .bind(organization_id)
                .bind(marketplace)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM listings \
                     WHERE organization_id = $1 ORDER BY created_at LIMIT $2",
                    LISTING_COLUMNS
                ))
                .bind(organization_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(ListingRow::into_listing).collect())
    }

    async fn get_product(
        &self,
        organization_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, RepoError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, organization_id, sku, title, brand, category, asin, upc, cost_price, \
             min_price, max_price, total_inventory, reserved_inventory, is_active, attributes, \
             created_at FROM products WHERE organization_id = $1 AND id = $2",
        )
        .bind(organization_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Product {
            id: r.id,
            organization_id: r.organization_id,
            sku: r.sku,
            title: r.title,
            brand: r.brand,
            category: r.category,
            asin: r.asin,
            upc: r.upc,
            cost_price: r.cost_price,
            min_price: r.min_price,
            max_price: r.max_price,
            total_inventory: r.total_inventory,
            reserved_inventory: r.reserved_inventory,
            is_active: r.is_active,
            attributes: r.attributes,
            created_at: r.created_at,
        }))
    }

    async fn update_listing_price(
        &self,
        organization_id: Uuid,
        listing_id: Uuid,
        price: Decimal,
        source: &str,
    ) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE listings SET current_price = $1 \
             WHERE organization_id = $2 AND id = $3",
        )
        .bind(price)
        .bind(organization_id)
        .bind(listing_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(format!("listing {} not found", listing_id).into());
        }

        sqlx::query(
            "INSERT INTO price_history (id, listing_id, price, source, recorded_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(price)
        .bind(source)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_listing_quantity(
        &self,
        organization_id: Uuid,
        listing_id: Uuid,
        quantity: i32,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE listings SET quantity = $1, last_synced_at = $2 \
             WHERE organization_id = $3 AND id = $4",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(organization_id)
        .bind(listing_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn competitor_offers(
        &self,
        listing_id: Uuid,
    ) -> Result<Vec<CompetitorOffer>, RepoError> {
        let rows: Vec<CompetitorOfferRow> = sqlx::query_as(
            "SELECT id, listing_id, seller_id, seller_name, price, shipping_price, condition, \
             fulfillment, rating, feedback_count, is_blacklisted, is_whitelisted, last_seen_at \
             FROM competitor_offers WHERE listing_id = $1",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CompetitorOffer {
                id: r.id,
                listing_id: r.listing_id,
                seller_id: r.seller_id,
                seller_name: r.seller_name,
                price: r.price,
                shipping_price: r.shipping_price,
                condition: r.condition,
                fulfillment: parse_fulfillment(&r.fulfillment),
                rating: r.rating,
                feedback_count: r.feedback_count,
                is_blacklisted: r.is_blacklisted,
                is_whitelisted: r.is_whitelisted,
                last_seen_at: r.last_seen_at,
            })
            .collect())
    }

    async fn replace_competitor_offers(
        &self,
        listing_id: Uuid,
        offers: &[CompetitorOffer],
    ) -> Result<(), RepoError> {
        // Blacklist flags are curated by operators; carry them over for
        // sellers we already know before replacing the snapshot.
        let blacklisted: Vec<(String,)> = sqlx::query_as(
            "SELECT seller_id FROM competitor_offers WHERE listing_id = $1 AND is_blacklisted",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;
        let blacklisted: std::collections::HashSet<String> =
            blacklisted.into_iter().map(|(s,)| s).collect();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM competitor_offers WHERE listing_id = $1")
            .bind(listing_id)
            .execute(&mut *tx)
            .await?;

        for offer in offers {
            sqlx::query(
                "INSERT INTO competitor_offers \
                 (id, listing_id, seller_id, seller_name, price, shipping_price, condition, \
                  fulfillment, rating, feedback_count, is_blacklisted, is_whitelisted, last_seen_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(offer.id)
            .bind(listing_id)
            .bind(&offer.seller_id)
            .bind(&offer.seller_name)
            .bind(offer.price)
            .bind(offer.shipping_price)
            .bind(&offer.condition)
            .bind(offer.fulfillment.as_str())
            .bind(offer.rating)
            .bind(offer.feedback_count)
            .bind(offer.is_blacklisted || blacklisted.contains(&offer.seller_id))
            .bind(offer.is_whitelisted)
            .bind(offer.last_seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn previous_price(&self, listing_id: Uuid) -> Result<Option<Decimal>, RepoError> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            "SELECT price FROM price_history WHERE listing_id = $1 \
             ORDER BY recorded_at DESC OFFSET 1 LIMIT 1",
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(price,)| price))
    }

    async fn stale_listings(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Listing>, RepoError> {
        let rows: Vec<ListingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM listings \
             WHERE status = 'active' AND (last_synced_at IS NULL OR last_synced_at < $1) \
             ORDER BY last_synced_at NULLS FIRST LIMIT $2",
            LISTING_COLUMNS
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ListingRow::into_listing).collect())
    }

    async fn fee_schedule(
        &self,
        organization_id: Uuid,
        marketplace: &str,
        category: Option<&str>,
    ) -> Result<Option<FeeSchedule>, RepoError> {
        let row: Option<FeeScheduleRow> = sqlx::query_as(
            "SELECT marketplace, category, referral_fee_rate, variable_closing_fee, \
             per_item_fee, fulfillment_fee_per_unit, effective_from, effective_until \
             FROM fee_schedules \
             WHERE organization_id = $1 AND marketplace = $2 \
               AND (category = $3 OR category IS NULL) \
               AND effective_from <= NOW() \
               AND (effective_until IS NULL OR effective_until > NOW()) \
             ORDER BY category NULLS LAST, effective_from DESC LIMIT 1",
        )
        .bind(organization_id)
        .bind(marketplace)
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(r) = row {
            return Ok(Some(FeeSchedule {
                marketplace: r.marketplace,
                category: r.category,
                referral_fee_rate: r.referral_fee_rate,
                variable_closing_fee: r.variable_closing_fee,
                per_item_fee: r.per_item_fee,
                fulfillment_fee_per_unit: r.fulfillment_fee_per_unit,
                effective_from: r.effective_from,
                effective_until: r.effective_until,
            }));
        }

        // No configured schedule: fall back to the marketplace's default
        // referral rate.
        let marketplace_row: Option<MarketplaceRow> = sqlx::query_as(
            "SELECT code, name, country, currency, referral_fee_rate, is_active \
             FROM marketplaces WHERE code = $1 AND is_active",
        )
        .bind(marketplace)
        .fetch_optional(&self.pool)
        .await?;

        Ok(marketplace_row.map(|r| {
            FeeSchedule::referral_only(&Marketplace {
                code: r.code,
                name: r.name,
                country: r.country,
                currency: r.currency,
                referral_fee_rate: r.referral_fee_rate,
                is_active: r.is_active,
            })
        }))
    }
}
