use chrono::{ DateTime, Duration, Utc };
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    Condition,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
    UpdateMany,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::db::entity::{ scheduled_topup, ScheduledTopup };
use crate::enums::ScheduleStatus;
use crate::error::{ AppError, Result };

/// Where a schedule goes after one attempt, decided from the row the runner
/// claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct Advancement {
    pub status: ScheduleStatus,
    pub next_execution_at: Option<DateTime<Utc>>,
    pub total_executions: i32,
}

pub struct ScheduleRepository {
    db: DatabaseConnection,
}

impl ScheduleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn insert(&self, schedule: scheduled_topup::ActiveModel) -> Result<scheduled_topup::Model> {
        let schedule = schedule.insert(&self.db).await?;
        Ok(schedule)
    }

    /// Write `changes` only if the row still has the status and attempt count
    /// the caller read in `observed`.
    ///
    /// A runner that advanced the schedule in between wins and the caller
    /// gets a conflict.
    pub async fn update_if_unchanged(
        &self,
        observed: &scheduled_topup::Model,
        changes: scheduled_topup::ActiveModel
    ) -> Result<scheduled_topup::Model> {
        let result = ScheduledTopup::update_many()
            .set(changes)
            .filter(scheduled_topup::Column::Id.eq(observed.id))
            .filter(scheduled_topup::Column::Status.eq(observed.status.as_str()))
            .filter(scheduled_topup::Column::TotalExecutions.eq(observed.total_executions))
            .exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(
                AppError::Conflict("Schedule changed while it was being updated, try again".to_string())
            );
        }

        self.find_by_id(observed.id).await?.ok_or_else(|| AppError::NotFound("Scheduled top-up".to_string()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<scheduled_topup::Model>> {
        let schedule = ScheduledTopup::find_by_id(id).one(&self.db).await?;
        Ok(schedule)
    }

    /// Missing and not-owned look the same to the caller.
    pub async fn find_owned(&self, id: Uuid, user_id: &str) -> Result<scheduled_topup::Model> {
        ScheduledTopup::find_by_id(id)
            .filter(scheduled_topup::Column::UserId.eq(user_id))
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Scheduled top-up".to_string()))
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<ScheduleStatus>
    ) -> Result<Vec<scheduled_topup::Model>> {
        let mut query = ScheduledTopup::find().filter(
            scheduled_topup::Column::UserId.eq(user_id)
        );

        if let Some(status) = status {
            query = query.filter(scheduled_topup::Column::Status.eq(status.as_str()));
        }

        let schedules = query
            .order_by_desc(scheduled_topup::Column::CreatedAt)
            .all(&self.db).await?;

        Ok(schedules)
    }

    /// Active schedules due at `now` that no other run holds, oldest due first.
    pub async fn find_due(&self, now: DateTime<Utc>, limit: u64) -> Result<Vec<scheduled_topup::Model>> {
        let schedules = ScheduledTopup::find()
            .filter(scheduled_topup::Column::Status.eq(ScheduleStatus::Active.as_str()))
            .filter(scheduled_topup::Column::NextExecutionAt.lte(now))
            .filter(unclaimed_at(now))
            .order_by_asc(scheduled_topup::Column::NextExecutionAt)
            .limit(limit)
            .all(&self.db).await?;

        Ok(schedules)
    }

    /// Take a lease on one due occurrence.
    ///
    /// Succeeds only if the row is still active, still due at the occurrence
    /// the caller observed, and not held by a live claim.
    pub async fn claim(
        &self,
        schedule: &scheduled_topup::Model,
        now: DateTime<Utc>,
        lease: Duration
    ) -> Result<bool> {
        let Some(observed_next) = schedule.next_execution_at else {
            return Ok(false);
        };

        let result = ScheduledTopup::update_many()
            .col_expr(scheduled_topup::Column::ClaimedUntil, Expr::value(Some(now + lease)))
            .filter(scheduled_topup::Column::Id.eq(schedule.id))
            .filter(scheduled_topup::Column::Status.eq(ScheduleStatus::Active.as_str()))
            .filter(scheduled_topup::Column::NextExecutionAt.eq(observed_next))
            .filter(unclaimed_at(now))
            .exec(&self.db).await?;

        Ok(result.rows_affected == 1)
    }

    /// Record one attempt and release the claim.
    ///
    /// The planned transition only applies while the schedule is still
    /// active. A pause that landed mid-flight is kept unless the attempt used
    /// up the schedule, which then completes. A cancel is always kept.
    pub async fn record_attempt(
        &self,
        id: Uuid,
        planned: &Advancement,
        error: Option<String>,
        now: DateTime<Utc>
    ) -> Result<()> {
        let applied = attempt_recorded(error.clone(), now)
            .col_expr(scheduled_topup::Column::TotalExecutions, Expr::value(planned.total_executions))
            .col_expr(scheduled_topup::Column::Status, Expr::value(planned.status.as_str()))
            .col_expr(
                scheduled_topup::Column::NextExecutionAt,
                Expr::value(planned.next_execution_at)
            )
            .filter(scheduled_topup::Column::Id.eq(id))
            .filter(scheduled_topup::Column::Status.eq(ScheduleStatus::Active.as_str()))
            .exec(&self.db).await?;

        if applied.rows_affected == 1 {
            return Ok(());
        }

        if planned.status == ScheduleStatus::Completed {
            let completed = attempt_recorded(error.clone(), now)
                .col_expr(
                    scheduled_topup::Column::TotalExecutions,
                    Expr::col(scheduled_topup::Column::TotalExecutions).add(1)
                )
                .col_expr(scheduled_topup::Column::Status, Expr::value(ScheduleStatus::Completed.as_str()))
                .col_expr(scheduled_topup::Column::NextExecutionAt, Expr::value(None::<DateTime<Utc>>))
                .filter(scheduled_topup::Column::Id.eq(id))
                .filter(scheduled_topup::Column::Status.eq(ScheduleStatus::Paused.as_str()))
                .exec(&self.db).await?;

            if completed.rows_affected == 1 {
                tracing::info!("Paused schedule {} used its last run and is now completed", id);
                return Ok(());
            }
        }

        attempt_recorded(error, now)
            .col_expr(
                scheduled_topup::Column::TotalExecutions,
                Expr::col(scheduled_topup::Column::TotalExecutions).add(1)
            )
            .filter(scheduled_topup::Column::Id.eq(id))
            .exec(&self.db).await?;

        Ok(())
    }
}

/// Columns every recorded attempt writes, claim released.
fn attempt_recorded(error: Option<String>, now: DateTime<Utc>) -> UpdateMany<ScheduledTopup> {
    ScheduledTopup::update_many()
        .col_expr(scheduled_topup::Column::LastExecutedAt, Expr::value(Some(now)))
        .col_expr(scheduled_topup::Column::LastError, Expr::value(error))
        .col_expr(scheduled_topup::Column::ClaimedUntil, Expr::value(None::<DateTime<Utc>>))
        .col_expr(scheduled_topup::Column::UpdatedAt, Expr::value(now))
}

fn unclaimed_at(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(scheduled_topup::Column::ClaimedUntil.is_null())
        .add(scheduled_topup::Column::ClaimedUntil.lt(now))
}
