use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use repricer_core::repository::StrategyRepository;
use repricer_rules::guardrails::{ConstraintKind, SafetyConstraint, ViolationAction};
use repricer_rules::optimizer::OptimizerConfig;
use repricer_rules::rules::{PricingRule, RuleAction, RuleCondition, RuleSet, RuleSetScope};
use repricer_rules::strategy::{
    ConditionalStrategy, PricingStrategy, StrategyBundle, StrategyKind,
};
use repricer_rules::rules::SignalCondition;

type RepoError = Box<dyn std::error::Error + Send + Sync>;

pub struct PgStrategyRepository {
    pool: PgPool,
}

impl PgStrategyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StrategyRow {
    id: Uuid,
    name: String,
    kind: String,
    is_active: bool,
    is_default: bool,
    experiment_fraction: f64,
    optimizer: Option<serde_json::Value>,
}

#[derive(sqlx::FromRow)]
struct RuleSetRow {
    id: Uuid,
    strategy_id: Uuid,
    name: String,
    priority: i32,
    is_active: bool,
    scope: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    rule_set_id: Uuid,
    name: String,
    priority: i32,
    is_active: bool,
    condition: Option<serde_json::Value>,
    action: serde_json::Value,
    weight: f64,
}

#[derive(sqlx::FromRow)]
struct ConstraintRow {
    id: Uuid,
    strategy_id: Uuid,
    name: String,
    kind: serde_json::Value,
    action: String,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct SwitchRow {
    id: Uuid,
    strategy_id: Uuid,
    priority: i32,
    is_active: bool,
    condition: serde_json::Value,
    target_strategy_id: Uuid,
}

fn parse_kind(value: &str) -> StrategyKind {
    match value {
        "optimizer" => StrategyKind::Optimizer,
        "hybrid" => StrategyKind::Hybrid,
        _ => StrategyKind::RuleBased,
    }
}

fn parse_violation_action(value: &str) -> ViolationAction {
    match value {
        "adjust" => ViolationAction::Adjust,
        "warn" => ViolationAction::Warn,
        _ => ViolationAction::Block,
    }
}

#[async_trait]
impl StrategyRepository for PgStrategyRepository {
    async fn load_bundle(&self, organization_id: Uuid) -> Result<StrategyBundle, RepoError> {
        let strategy_rows: Vec<StrategyRow> = sqlx::query_as(
            "SELECT id, name, kind, is_active, is_default, experiment_fraction, optimizer \
             FROM pricing_strategies WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let rule_set_rows: Vec<RuleSetRow> = sqlx::query_as(
            "SELECT rs.id, rs.strategy_id, rs.name, rs.priority, rs.is_active, rs.scope \
             FROM rule_sets rs \
             JOIN pricing_strategies s ON s.id = rs.strategy_id \
             WHERE s.organization_id = $1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let rule_rows: Vec<RuleRow> = sqlx::query_as(
            "SELECT r.id, r.rule_set_id, r.name, r.priority, r.is_active, r.condition, \
             r.action, r.weight \
             FROM pricing_rules r \
             JOIN rule_sets rs ON rs.id = r.rule_set_id \
             JOIN pricing_strategies s ON s.id = rs.strategy_id \
             WHERE s.organization_id = $1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let constraint_rows: Vec<ConstraintRow> = sqlx::query_as(
            "SELECT c.id, c.strategy_id, c.name, c.kind, c.action, c.is_active \
             FROM safety_constraints c \
             JOIN pricing_strategies s ON s.id = c.strategy_id \
             WHERE s.organization_id = $1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        let switch_rows: Vec<SwitchRow> = sqlx::query_as(
            "SELECT cs.id, cs.strategy_id, cs.priority, cs.is_active, cs.condition, \
             cs.target_strategy_id \
             FROM conditional_strategies cs \
             JOIN pricing_strategies s ON s.id = cs.strategy_id \
             WHERE s.organization_id = $1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        // Rules grouped by rule set; a row with an unparseable action is
        // skipped rather than poisoning the whole bundle.
        let mut rules_by_set: HashMap<Uuid, Vec<PricingRule>> = HashMap::new();
        for row in rule_rows {
            let action: RuleAction = match serde_json::from_value(row.action.clone()) {
                Ok(action) => action,
                Err(e) => {
                    warn!(rule = %row.id, error = %e, "skipping rule with invalid action");
                    continue;
                }
            };
            let condition: Option<RuleCondition> = match row.condition {
                Some(value) => match serde_json::from_value(value) {
                    Ok(condition) => Some(condition),
                    Err(e) => {
                        warn!(rule = %row.id, error = %e, "skipping rule with invalid condition");
                        continue;
                    }
                },
                None => None,
            };

            rules_by_set.entry(row.rule_set_id).or_default().push(PricingRule {
                id: row.id,
                name: row.name,
                priority: row.priority,
                is_active: row.is_active,
                condition,
                action,
                weight: row.weight,
            });
        }

        let mut sets_by_strategy: HashMap<Uuid, Vec<RuleSet>> = HashMap::new();
        for row in rule_set_rows {
            let scope: RuleSetScope = serde_json::from_value(row.scope).unwrap_or_default();
            sets_by_strategy.entry(row.strategy_id).or_default().push(RuleSet {
                id: row.id,
                name: row.name,
                priority: row.priority,
                is_active: row.is_active,
                scope,
                rules: rules_by_set.remove(&row.id).unwrap_or_default(),
            });
        }

        let mut constraints_by_strategy: HashMap<Uuid, Vec<SafetyConstraint>> = HashMap::new();
        for row in constraint_rows {
            let kind: ConstraintKind = match serde_json::from_value(row.kind) {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(constraint = %row.id, error = %e, "skipping invalid constraint");
                    continue;
                }
            };
            constraints_by_strategy
                .entry(row.strategy_id)
                .or_default()
                .push(SafetyConstraint {
                    id: row.id,
                    name: row.name,
                    kind,
                    action: parse_violation_action(&row.action),
                    is_active: row.is_active,
                });
        }

        let mut switches_by_strategy: HashMap<Uuid, Vec<ConditionalStrategy>> = HashMap::new();
        for row in switch_rows {
            let condition: SignalCondition = match serde_json::from_value(row.condition) {
                Ok(condition) => condition,
                Err(e) => {
                    warn!(switch = %row.id, error = %e, "skipping invalid strategy switch");
                    continue;
                }
            };
            switches_by_strategy
                .entry(row.strategy_id)
                .or_default()
                .push(ConditionalStrategy {
                    id: row.id,
                    priority: row.priority,
                    is_active: row.is_active,
                    condition,
                    target_strategy_id: row.target_strategy_id,
                });
        }

        let strategies = strategy_rows
            .into_iter()
            .map(|row| {
                let optimizer: Option<OptimizerConfig> = row
                    .optimizer
                    .and_then(|v| serde_json::from_value(v).ok());
                PricingStrategy {
                    id: row.id,
                    name: row.name,
                    kind: parse_kind(&row.kind),
                    is_active: row.is_active,
                    is_default: row.is_default,
                    rule_sets: sets_by_strategy.remove(&row.id).unwrap_or_default(),
                    constraints: constraints_by_strategy.remove(&row.id).unwrap_or_default(),
                    optimizer,
                    experiment_fraction: row.experiment_fraction,
                    switches: switches_by_strategy.remove(&row.id).unwrap_or_default(),
                }
            })
            .collect();

        Ok(StrategyBundle { strategies })
    }
}
