use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    DatabaseConnection,
    EntityTrait,
    PaginatorTrait,
    QueryFilter,
    QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::db::entity::{ execution_log, ExecutionLog };
use crate::enums::ExecutionOutcome;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewExecutionLog {
    pub schedule_id: Uuid,
    pub user_id: String,
    pub transaction_id: Option<Uuid>,
    pub outcome: ExecutionOutcome,
    pub failure_reason: Option<String>,
    pub amount: Decimal,
    pub scheduled_for: DateTime<Utc>,
}

/// Append-only audit trail of schedule attempts.
pub struct ExecutionLogRepository {
    db: DatabaseConnection,
}

impl ExecutionLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn record(&self, entry: NewExecutionLog) -> Result<execution_log::Model> {
        let log = execution_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            schedule_id: Set(entry.schedule_id),
            user_id: Set(entry.user_id),
            transaction_id: Set(entry.transaction_id),
            outcome: Set(entry.outcome.to_string()),
            failure_reason: Set(entry.failure_reason),
            amount: Set(entry.amount),
            scheduled_for: Set(entry.scheduled_for),
            executed_at: Set(Utc::now()),
        };

        let log = log.insert(&self.db).await?;
        Ok(log)
    }

    /// Whether this occurrence of the schedule has already been attempted.
    pub async fn was_attempted(&self, schedule_id: Uuid, scheduled_for: DateTime<Utc>) -> Result<bool> {
        let count = ExecutionLog::find()
            .filter(execution_log::Column::ScheduleId.eq(schedule_id))
            .filter(execution_log::Column::ScheduledFor.eq(scheduled_for))
            .count(&self.db).await?;

        Ok(count > 0)
    }

    pub async fn find_by_schedule(&self, schedule_id: Uuid) -> Result<Vec<execution_log::Model>> {
        let logs = ExecutionLog::find()
            .filter(execution_log::Column::ScheduleId.eq(schedule_id))
            .order_by_desc(execution_log::Column::ExecutedAt)
            .all(&self.db).await?;

        Ok(logs)
    }
}
