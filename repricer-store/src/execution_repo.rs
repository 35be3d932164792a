use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use repricer_core::execution::{ApprovalStatus, RuleExecution};
use repricer_core::repository::ExecutionRepository;

type RepoError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgExecutionRepository {
    pool: PgPool,
}

impl PgExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: Uuid,
    organization_id: Uuid,
    listing_id: Uuid,
    strategy_id: Option<Uuid>,
    strategy_name: String,
    marketplace: String,
    original_price: Decimal,
    calculated_price: Decimal,
    confidence: f64,
    rules_applied: Json<Vec<String>>,
    guardrails_passed: bool,
    warnings: Json<Vec<String>>,
    reason: String,
    approval: String,
    emitted: bool,
    context_data: serde_json::Value,
    executed_at: DateTime<Utc>,
}

fn parse_approval(value: &str) -> ApprovalStatus {
    match value {
        "auto_applied" => ApprovalStatus::AutoApplied,
        "approved" => ApprovalStatus::Approved,
        "rejected" => ApprovalStatus::Rejected,
        _ => ApprovalStatus::PendingApproval,
    }
}

impl ExecutionRow {
    fn into_execution(self) -> RuleExecution {
        RuleExecution {
            id: self.id,
            organization_id: self.organization_id,
            listing_id: self.listing_id,
            strategy_id: self.strategy_id,
            strategy_name: self.strategy_name,
            marketplace: self.marketplace,
            original_price: self.original_price,
            calculated_price: self.calculated_price,
            confidence: self.confidence,
            rules_applied: self.rules_applied.0,
            guardrails_passed: self.guardrails_passed,
            warnings: self.warnings.0,
            reason: self.reason,
            approval: parse_approval(&self.approval),
            emitted: self.emitted,
            context_data: self.context_data,
            executed_at: self.executed_at,
        }
    }
}

const EXECUTION_COLUMNS: &str = "id, organization_id, listing_id, strategy_id, strategy_name, \
     marketplace, original_price, calculated_price, confidence, rules_applied, \
     guardrails_passed, warnings, reason, approval, emitted, context_data, executed_at";

#[async_trait]
impl ExecutionRepository for PgExecutionRepository {
    async fn record(&self, execution: &RuleExecution) -> Result<Uuid, RepoError> {
        sqlx::query(
            "INSERT INTO rule_executions \
             (id, organization_id, listing_id, strategy_id, strategy_name, marketplace, \
              original_price, calculated_price, confidence, rules_applied, guardrails_passed, \
              warnings, reason, approval, emitted, context_data, executed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(execution.id)
        .bind(execution.organization_id)
        .bind(execution.listing_id)
        .bind(execution.strategy_id)
        .bind(&execution.strategy_name)
        .bind(&execution.marketplace)
        .bind(execution.original_price)
        .bind(execution.calculated_price)
        .bind(execution.confidence)
        .bind(Json(&execution.rules_applied))
        .bind(execution.guardrails_passed)
        .bind(Json(&execution.warnings))
        .bind(&execution.reason)
        .bind(execution.approval.as_str())
        .bind(execution.emitted)
        .bind(&execution.context_data)
        .bind(execution.executed_at)
        .execute(&self.pool)
        .await?;

        Ok(execution.id)
    }

    async fn get(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Option<RuleExecution>, RepoError> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM rule_executions WHERE organization_id = $1 AND id = $2",
            EXECUTION_COLUMNS
        ))
        .bind(organization_id)
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ExecutionRow::into_execution))
    }

    async fn list_pending(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RuleExecution>, RepoError> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM rule_executions \
             WHERE organization_id = $1 AND approval = 'pending_approval' \
             ORDER BY executed_at LIMIT $2",
            EXECUTION_COLUMNS
        ))
        .bind(organization_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ExecutionRow::into_execution).collect())
    }

    async fn set_approval(
        &self,
        organization_id: Uuid,
        execution_id: Uuid,
        status: ApprovalStatus,
        emitted: bool,
    ) -> Result<(), RepoError> {
        let updated = sqlx::query(
            "UPDATE rule_executions SET approval = $1, emitted = $2 \
             WHERE organization_id = $3 AND id = $4",
        )
        .bind(status.as_str())
        .bind(emitted)
        .bind(organization_id)
        .bind(execution_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(format!("execution {} not found", execution_id).into());
        }

        Ok(())
    }
}
