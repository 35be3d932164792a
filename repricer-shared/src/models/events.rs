use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PriceChangedEvent {
    pub listing_id: Uuid,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// Where the change came from: "engine", "manual", "rollback", "sync".
    pub source: String,
    pub changed_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RepriceEvaluatedEvent {
    pub listing_id: Uuid,
    pub organization_id: Uuid,
    pub strategy: String,
    pub current_price: Decimal,
    pub proposed_price: Decimal,
    pub confidence: f64,
    pub guardrails_passed: bool,
    pub evaluated_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct CompetitorPricesUpdatedEvent {
    pub listing_id: Uuid,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub offer_count: u32,
    pub lowest_price: Option<Decimal>,
    pub buy_box_price: Option<Decimal>,
    pub observed_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SyncCompletedEvent {
    pub job_id: Uuid,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub records_processed: u32,
    pub status: String,
    pub completed_at: i64,
}
