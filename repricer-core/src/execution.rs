use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repricer_rules::engine::PricingDecision;

/// How a decision left the engine: applied straight away, parked for a
/// human, or resolved by one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    AutoApplied,
    PendingApproval,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::AutoApplied => "auto_applied",
            ApprovalStatus::PendingApproval => "pending_approval",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// Audit record for every engine run, whether or not a price was emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecution {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub listing_id: Uuid,
    pub strategy_id: Option<Uuid>,
    pub strategy_name: String,
    pub marketplace: String,
    pub original_price: Decimal,
    pub calculated_price: Decimal,
    pub confidence: f64,
    pub rules_applied: Vec<String>,
    pub guardrails_passed: bool,
    pub warnings: Vec<String>,
    pub reason: String,
    pub approval: ApprovalStatus,
    pub emitted: bool,
    pub context_data: serde_json::Value,
    pub executed_at: DateTime<Utc>,
}

impl RuleExecution {
    pub fn from_decision(
        organization_id: Uuid,
        marketplace: &str,
        decision: &PricingDecision,
        approval: ApprovalStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            listing_id: decision.listing_id,
            strategy_id: decision.strategy_id,
            strategy_name: decision.strategy_name.clone(),
            marketplace: marketplace.to_string(),
            original_price: decision.current_price,
            calculated_price: decision.new_price,
            confidence: decision.confidence,
            rules_applied: decision.rules_applied.clone(),
            guardrails_passed: decision.guardrails_passed,
            warnings: decision.warnings.clone(),
            reason: decision.reason.clone(),
            approval,
            emitted: false,
            context_data: decision.metadata.clone(),
            executed_at: Utc::now(),
        }
    }
}

impl RuleExecution {
    /// Guard for the approval endpoints: only parked decisions can be
    /// approved or rejected.
    pub fn ensure_pending(&self) -> crate::CoreResult<()> {
        if self.approval != ApprovalStatus::PendingApproval {
            return Err(crate::CoreError::Conflict(format!(
                "execution {} is not pending approval",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Running,
    Completed,
    Failed,
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Running => "running",
            SyncJobStatus::Completed => "completed",
            SyncJobStatus::Failed => "failed",
        }
    }
}

/// One marketplace sync run for one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub job_type: String,
    pub status: SyncJobStatus,
    pub records_processed: u32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncJob {
    pub fn start(organization_id: Uuid, marketplace: &str, job_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            marketplace: marketplace.to_string(),
            job_type: job_type.to_string(),
            status: SyncJobStatus::Running,
            records_processed: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self, records: u32) {
        self.status = SyncJobStatus::Completed;
        self.records_processed = records;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = SyncJobStatus::Failed;
        self.error_message = Some(error);
        self.completed_at = Some(Utc::now());
    }
}
