use std::sync::Arc;

use chrono::{ DateTime, FixedOffset, Utc };
use rust_decimal::Decimal;
use sea_orm::{ ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter };
use serde::Deserialize;
use uuid::Uuid;

use crate::config::PurchaseRules;
use crate::db::entity::{ beneficiary, execution_log, scheduled_topup, Beneficiary };
use crate::db::{ Advancement, ExecutionLogRepository, ScheduleRepository };
use crate::enums::{ Network, PurchaseType, ScheduleKind, ScheduleStatus };
use crate::error::{ AppError, Result };
use crate::recurrence::{ self, Recurrence };
use crate::validation;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateScheduleRequest {
    #[serde(default)]
    pub beneficiary_id: Option<Uuid>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    pub purchase_type: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub plan_id: Option<String>,
    pub schedule_type: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<i32>,
    #[serde(default)]
    pub day_of_month: Option<i32>,
    #[serde(default)]
    pub max_executions: Option<i32>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduleRequest {
    pub beneficiary_id: Option<Uuid>,
    pub phone_number: Option<String>,
    pub network: Option<String>,
    pub purchase_type: Option<String>,
    pub amount: Option<Decimal>,
    pub plan_id: Option<String>,
    pub schedule_type: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub time_of_day: Option<String>,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub max_executions: Option<i32>,
}

impl UpdateScheduleRequest {
    fn touches_recurrence(&self) -> bool {
        self.schedule_type.is_some() ||
            self.scheduled_at.is_some() ||
            self.time_of_day.is_some() ||
            self.day_of_week.is_some() ||
            self.day_of_month.is_some()
    }
}

/// A request that passed every field check.
#[derive(Debug, Clone)]
struct ScheduleDraft {
    beneficiary_id: Option<Uuid>,
    phone_number: String,
    network: Network,
    purchase_type: PurchaseType,
    amount: Decimal,
    plan_id: Option<String>,
    recurrence: Recurrence,
    max_executions: Option<i32>,
}

pub struct SchedulingService {
    db: DatabaseConnection,
    schedules: Arc<ScheduleRepository>,
    logs: Arc<ExecutionLogRepository>,
    rules: PurchaseRules,
}

impl SchedulingService {
    pub fn new(
        db: DatabaseConnection,
        schedules: Arc<ScheduleRepository>,
        logs: Arc<ExecutionLogRepository>,
        rules: PurchaseRules
    ) -> Self {
        Self {
            db,
            schedules,
            logs,
            rules,
        }
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.rules.schedule_offset
    }

    /// Create an active schedule due at its first occurrence after `now`
    pub async fn create(
        &self,
        user_id: &str,
        request: CreateScheduleRequest,
        now: DateTime<Utc>
    ) -> Result<scheduled_topup::Model> {
        let draft = self.validate(user_id, &request).await?;

        let next_execution_at = draft.recurrence
            .next_execution(now, self.offset())
            .ok_or_else(|| AppError::validation("scheduled_at", "Scheduled time must be in the future"))?;

        let (scheduled_at, time_of_day, day_of_week, day_of_month) = recurrence_columns(&draft.recurrence);

        let schedule = scheduled_topup::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            user_id: ActiveValue::Set(user_id.to_string()),
            beneficiary_id: ActiveValue::Set(draft.beneficiary_id),
            phone_number: ActiveValue::Set(draft.phone_number),
            network: ActiveValue::Set(draft.network.to_string()),
            purchase_type: ActiveValue::Set(draft.purchase_type.to_string()),
            amount: ActiveValue::Set(draft.amount),
            plan_id: ActiveValue::Set(draft.plan_id),
            schedule_type: ActiveValue::Set(draft.recurrence.kind().to_string()),
            scheduled_at: ActiveValue::Set(scheduled_at),
            time_of_day: ActiveValue::Set(time_of_day),
            day_of_week: ActiveValue::Set(day_of_week),
            day_of_month: ActiveValue::Set(day_of_month),
            max_executions: ActiveValue::Set(draft.max_executions),
            total_executions: ActiveValue::Set(0),
            next_execution_at: ActiveValue::Set(Some(next_execution_at)),
            status: ActiveValue::Set(ScheduleStatus::Active.to_string()),
            last_executed_at: ActiveValue::Set(None),
            last_error: ActiveValue::Set(None),
            claimed_until: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };

        let schedule = self.schedules.insert(schedule).await?;
        tracing::info!(
            "Created {} schedule {} for user {}, next run at {}",
            schedule.schedule_type,
            schedule.id,
            user_id,
            next_execution_at
        );

        Ok(schedule)
    }

    /// Caller's schedules, newest first
    pub async fn list(
        &self,
        user_id: &str,
        status: Option<ScheduleStatus>
    ) -> Result<Vec<scheduled_topup::Model>> {
        self.schedules.list_for_user(user_id, status).await
    }

    pub async fn get(&self, user_id: &str, id: Uuid) -> Result<scheduled_topup::Model> {
        self.schedules.find_owned(id, user_id).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: Uuid,
        request: UpdateScheduleRequest,
        now: DateTime<Utc>
    ) -> Result<scheduled_topup::Model> {
        let existing = self.schedules.find_owned(id, user_id).await?;
        let status = existing.status()?;
        if status.is_terminal() {
            return Err(AppError::Conflict(format!("Cannot update a {} schedule", status)));
        }

        if let Some(max) = request.max_executions {
            if max <= existing.total_executions {
                return Err(
                    AppError::validation(
                        "max_executions",
                        format!(
                            "max_executions must be greater than the {} executions already made",
                            existing.total_executions
                        )
                    )
                );
            }
        }

        let recurrence_changed = request.touches_recurrence();
        let merged = merge(&existing, request);
        let draft = self.validate(user_id, &merged).await?;

        let next_execution_at = if status == ScheduleStatus::Active && recurrence_changed {
            Some(
                draft.recurrence
                    .next_execution(now, self.offset())
                    .ok_or_else(||
                        AppError::validation("scheduled_at", "Scheduled time must be in the future")
                    )?
            )
        } else {
            existing.next_execution_at
        };

        let (scheduled_at, time_of_day, day_of_week, day_of_month) = recurrence_columns(&draft.recurrence);

        let mut active: scheduled_topup::ActiveModel = existing.clone().into();
        active.beneficiary_id = ActiveValue::Set(draft.beneficiary_id);
        active.phone_number = ActiveValue::Set(draft.phone_number);
        active.network = ActiveValue::Set(draft.network.to_string());
        active.purchase_type = ActiveValue::Set(draft.purchase_type.to_string());
        active.amount = ActiveValue::Set(draft.amount);
        active.plan_id = ActiveValue::Set(draft.plan_id);
        active.schedule_type = ActiveValue::Set(draft.recurrence.kind().to_string());
        active.scheduled_at = ActiveValue::Set(scheduled_at);
        active.time_of_day = ActiveValue::Set(time_of_day);
        active.day_of_week = ActiveValue::Set(day_of_week);
        active.day_of_month = ActiveValue::Set(day_of_month);
        active.max_executions = ActiveValue::Set(draft.max_executions);
        active.next_execution_at = ActiveValue::Set(next_execution_at);
        active.updated_at = ActiveValue::Set(now);

        self.schedules.update_if_unchanged(&existing, active).await
    }

    pub async fn pause(&self, user_id: &str, id: Uuid, now: DateTime<Utc>) -> Result<scheduled_topup::Model> {
        let existing = self.schedules.find_owned(id, user_id).await?;
        let status = existing.status()?;
        if status != ScheduleStatus::Active {
            return Err(AppError::Conflict(format!("Only active schedules can be paused (is {})", status)));
        }

        let mut active: scheduled_topup::ActiveModel = existing.clone().into();
        active.status = ActiveValue::Set(ScheduleStatus::Paused.to_string());
        active.next_execution_at = ActiveValue::Set(None);
        active.updated_at = ActiveValue::Set(now);

        let schedule = self.schedules.update_if_unchanged(&existing, active).await?;
        tracing::info!("Paused schedule {}", schedule.id);
        Ok(schedule)
    }

    /// Resume from `now`; missed occurrences are not replayed.
    pub async fn resume(&self, user_id: &str, id: Uuid, now: DateTime<Utc>) -> Result<scheduled_topup::Model> {
        let existing = self.schedules.find_owned(id, user_id).await?;
        let status = existing.status()?;
        if status != ScheduleStatus::Paused {
            return Err(AppError::Conflict(format!("Only paused schedules can be resumed (is {})", status)));
        }

        if existing.max_executions.is_some_and(|max| existing.total_executions >= max) {
            return Err(AppError::Conflict("Schedule has already used all of its executions".to_string()));
        }
        if existing.kind()? == ScheduleKind::OneTime && existing.total_executions > 0 {
            return Err(AppError::Conflict("One-time schedule has already run".to_string()));
        }

        let next_execution_at = existing
            .recurrence()?
            .next_execution(now, self.offset())
            .ok_or_else(|| AppError::Conflict("The scheduled time has already passed".to_string()))?;

        let mut active: scheduled_topup::ActiveModel = existing.clone().into();
        active.status = ActiveValue::Set(ScheduleStatus::Active.to_string());
        active.next_execution_at = ActiveValue::Set(Some(next_execution_at));
        active.updated_at = ActiveValue::Set(now);

        let schedule = self.schedules.update_if_unchanged(&existing, active).await?;
        tracing::info!("Resumed schedule {}, next run at {}", schedule.id, next_execution_at);
        Ok(schedule)
    }

    pub async fn cancel(&self, user_id: &str, id: Uuid, now: DateTime<Utc>) -> Result<scheduled_topup::Model> {
        let existing = self.schedules.find_owned(id, user_id).await?;
        let status = existing.status()?;
        if status.is_terminal() {
            return Err(AppError::Conflict(format!("Schedule is already {}", status)));
        }

        let mut active: scheduled_topup::ActiveModel = existing.clone().into();
        active.status = ActiveValue::Set(ScheduleStatus::Cancelled.to_string());
        active.next_execution_at = ActiveValue::Set(None);
        active.updated_at = ActiveValue::Set(now);

        let schedule = self.schedules.update_if_unchanged(&existing, active).await?;
        tracing::info!("Cancelled schedule {}", schedule.id);
        Ok(schedule)
    }

    pub async fn executions(&self, user_id: &str, id: Uuid) -> Result<Vec<execution_log::Model>> {
        let schedule = self.schedules.find_owned(id, user_id).await?;
        self.logs.find_by_schedule(schedule.id).await
    }

    /// Phone number a due schedule should be topped up, following a linked
    /// beneficiary when there is one.
    pub async fn resolve_target(&self, schedule: &scheduled_topup::Model) -> Result<String> {
        let raw = match schedule.beneficiary_id {
            Some(beneficiary_id) => {
                self.find_beneficiary(&schedule.user_id, beneficiary_id).await?.phone_number
            }
            None => schedule.phone_number.clone(),
        };
        validation::normalize_phone_number(&raw)
    }

    async fn find_beneficiary(&self, user_id: &str, id: Uuid) -> Result<beneficiary::Model> {
        Beneficiary::find_by_id(id)
            .filter(beneficiary::Column::UserId.eq(user_id))
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Beneficiary".to_string()))
    }

    async fn validate(&self, user_id: &str, request: &CreateScheduleRequest) -> Result<ScheduleDraft> {
        let beneficiary = match request.beneficiary_id {
            Some(id) => Some(self.find_beneficiary(user_id, id).await?),
            None => None,
        };

        let raw_phone = request.phone_number
            .clone()
            .or_else(|| beneficiary.as_ref().map(|b| b.phone_number.clone()))
            .ok_or_else(|| AppError::validation("phone_number", "phone_number is required"))?;
        let phone_number = validation::normalize_phone_number(&raw_phone)?;

        let network: Network = request.network
            .clone()
            .or_else(|| beneficiary.as_ref().map(|b| b.network.clone()))
            .ok_or_else(|| AppError::validation("network", "network is required"))?
            .parse()?;

        let purchase_type: PurchaseType = request.purchase_type.parse()?;
        let payload = validation::resolve_payload(
            purchase_type,
            network,
            request.amount,
            request.plan_id.as_deref(),
            &self.rules
        )?;

        let kind: ScheduleKind = request.schedule_type.parse()?;
        let recurrence = Recurrence::from_parts(
            kind,
            request.scheduled_at,
            request.time_of_day.as_deref(),
            request.day_of_week,
            request.day_of_month
        )?;

        if let Some(max) = request.max_executions {
            if max < 1 {
                return Err(AppError::validation("max_executions", "max_executions must be at least 1"));
            }
        }

        Ok(ScheduleDraft {
            beneficiary_id: request.beneficiary_id,
            phone_number,
            network,
            purchase_type,
            amount: payload.amount,
            plan_id: payload.plan_id,
            recurrence,
            max_executions: request.max_executions,
        })
    }
}

/// Overlay an update onto the stored schedule. Switching beneficiary drops
/// the stored number and network so the new beneficiary's apply.
fn merge(existing: &scheduled_topup::Model, request: UpdateScheduleRequest) -> CreateScheduleRequest {
    let switching_beneficiary = request.beneficiary_id.is_some() &&
        request.beneficiary_id != existing.beneficiary_id;

    let (phone_number, network) = if switching_beneficiary {
        (request.phone_number, request.network)
    } else {
        (
            request.phone_number.or_else(|| Some(existing.phone_number.clone())),
            request.network.or_else(|| Some(existing.network.clone())),
        )
    };

    CreateScheduleRequest {
        beneficiary_id: request.beneficiary_id.or(existing.beneficiary_id),
        phone_number,
        network,
        purchase_type: request.purchase_type.unwrap_or_else(|| existing.purchase_type.clone()),
        amount: request.amount.or(Some(existing.amount)),
        plan_id: request.plan_id.or_else(|| existing.plan_id.clone()),
        schedule_type: request.schedule_type.unwrap_or_else(|| existing.schedule_type.clone()),
        scheduled_at: request.scheduled_at.or(existing.scheduled_at),
        time_of_day: request.time_of_day.or_else(|| existing.time_of_day.clone()),
        day_of_week: request.day_of_week.or(existing.day_of_week),
        day_of_month: request.day_of_month.or(existing.day_of_month),
        max_executions: request.max_executions.or(existing.max_executions),
    }
}

/// Stored columns for a recurrence; fields the kind does not use are null.
fn recurrence_columns(
    recurrence: &Recurrence
) -> (Option<DateTime<Utc>>, Option<String>, Option<i32>, Option<i32>) {
    match *recurrence {
        Recurrence::OneTime { scheduled_at } => (Some(scheduled_at), None, None, None),
        Recurrence::Daily { time } => (None, Some(recurrence::format_time_of_day(time)), None, None),
        Recurrence::Weekly { weekday, time } =>
            (None, Some(recurrence::format_time_of_day(time)), Some(weekday as i32), None),
        Recurrence::Monthly { day, time } =>
            (None, Some(recurrence::format_time_of_day(time)), None, Some(day as i32)),
    }
}

/// Where a claimed schedule goes after the attempt at `attempted`,
/// whatever its outcome.
pub fn plan_advancement(
    schedule: &scheduled_topup::Model,
    attempted: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: &FixedOffset
) -> Result<Advancement> {
    let total_executions = schedule.total_executions + 1;
    let recurrence = schedule.recurrence()?;
    let cap_reached = schedule.max_executions.is_some_and(|max| total_executions >= max);

    let completed = Advancement {
        status: ScheduleStatus::Completed,
        next_execution_at: None,
        total_executions,
    };

    if !recurrence.kind().is_recurring() || cap_reached {
        return Ok(completed);
    }

    Ok(match recurrence.next_after_attempt(attempted, now, tz) {
        Some(next) =>
            Advancement {
                status: ScheduleStatus::Active,
                next_execution_at: Some(next),
                total_executions,
            },
        None => completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use crate::test_utils::TestContext;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn daily_airtime(time: &str) -> CreateScheduleRequest {
        CreateScheduleRequest {
            phone_number: Some("08031234567".to_string()),
            network: Some("MTN".to_string()),
            purchase_type: "airtime".to_string(),
            amount: Some(dec!(500)),
            schedule_type: "daily".to_string(),
            time_of_day: Some(time.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_daily_computes_next_in_local_time() {
        let ctx = TestContext::new().await;
        // 08:00 WAT on Monday 2024-01-01
        let now = at("2024-01-01T07:00:00Z");

        let schedule = ctx.scheduling.create("user-1", daily_airtime("10:00"), now).await.unwrap();
        assert_eq!(schedule.status, "active");
        assert_eq!(schedule.total_executions, 0);
        assert_eq!(schedule.next_execution_at, Some(at("2024-01-01T09:00:00Z")));
        assert_eq!(schedule.time_of_day.as_deref(), Some("10:00"));
    }

    #[tokio::test]
    async fn test_create_rejects_past_one_time_and_bad_fields() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");

        let past = CreateScheduleRequest {
            schedule_type: "one_time".to_string(),
            scheduled_at: Some(now - Duration::minutes(1)),
            time_of_day: None,
            ..daily_airtime("10:00")
        };
        let err = ctx.scheduling.create("user-1", past, now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "scheduled_at"));

        let bad_phone = CreateScheduleRequest {
            phone_number: Some("0803123".to_string()),
            ..daily_airtime("10:00")
        };
        assert!(ctx.scheduling.create("user-1", bad_phone, now).await.is_err());

        let zero_cap = CreateScheduleRequest {
            max_executions: Some(0),
            ..daily_airtime("10:00")
        };
        assert!(ctx.scheduling.create("user-1", zero_cap, now).await.is_err());

        let weekly_without_day = CreateScheduleRequest {
            schedule_type: "weekly".to_string(),
            ..daily_airtime("10:00")
        };
        assert!(ctx.scheduling.create("user-1", weekly_without_day, now).await.is_err());

        assert!(ctx.scheduling.list("user-1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_data_schedule_takes_plan_price() {
        let ctx = TestContext::new().await;
        let request = CreateScheduleRequest {
            purchase_type: "data".to_string(),
            amount: Some(dec!(1)),
            plan_id: Some("mtn-2gb-30d".to_string()),
            ..daily_airtime("10:00")
        };

        let schedule = ctx.scheduling.create("user-1", request, at("2024-01-01T07:00:00Z")).await.unwrap();
        assert_eq!(schedule.amount, dec!(560));
        assert_eq!(schedule.plan_id.as_deref(), Some("mtn-2gb-30d"));
    }

    #[tokio::test]
    async fn test_other_users_schedules_are_not_found() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");
        let schedule = ctx.scheduling.create("user-1", daily_airtime("10:00"), now).await.unwrap();

        for result in [
            ctx.scheduling.get("user-2", schedule.id).await,
            ctx.scheduling.pause("user-2", schedule.id, now).await,
            ctx.scheduling.cancel("user-2", schedule.id, now).await,
        ] {
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }
        assert!(ctx.scheduling.list("user-2", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pause_resume_cancel_lifecycle() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");
        let schedule = ctx.scheduling.create("user-1", daily_airtime("10:00"), now).await.unwrap();

        let paused = ctx.scheduling.pause("user-1", schedule.id, now).await.unwrap();
        assert_eq!(paused.status, "paused");
        assert_eq!(paused.next_execution_at, None);
        assert!(matches!(ctx.scheduling.pause("user-1", schedule.id, now).await, Err(AppError::Conflict(_))));

        // Resumed two days later, the next run is computed from then
        let later = at("2024-01-03T10:00:00Z");
        let resumed = ctx.scheduling.resume("user-1", schedule.id, later).await.unwrap();
        assert_eq!(resumed.status, "active");
        assert_eq!(resumed.next_execution_at, Some(at("2024-01-04T09:00:00Z")));

        let cancelled = ctx.scheduling.cancel("user-1", schedule.id, later).await.unwrap();
        assert_eq!(cancelled.status, "cancelled");
        assert_eq!(cancelled.next_execution_at, None);

        assert!(matches!(ctx.scheduling.cancel("user-1", schedule.id, later).await, Err(AppError::Conflict(_))));
        assert!(matches!(ctx.scheduling.resume("user-1", schedule.id, later).await, Err(AppError::Conflict(_))));
        assert!(
            matches!(
                ctx.scheduling.update("user-1", schedule.id, UpdateScheduleRequest::default(), later).await,
                Err(AppError::Conflict(_))
            )
        );
    }

    #[tokio::test]
    async fn test_resume_of_expired_one_time_conflicts() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");
        let request = CreateScheduleRequest {
            schedule_type: "one_time".to_string(),
            scheduled_at: Some(at("2024-01-02T12:00:00Z")),
            time_of_day: None,
            ..daily_airtime("10:00")
        };
        let schedule = ctx.scheduling.create("user-1", request, now).await.unwrap();
        ctx.scheduling.pause("user-1", schedule.id, now).await.unwrap();

        let err = ctx.scheduling.resume("user-1", schedule.id, at("2024-01-03T00:00:00Z")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_recomputes_next_only_for_recurrence_changes() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");
        let schedule = ctx.scheduling.create("user-1", daily_airtime("10:00"), now).await.unwrap();

        let amount_only = UpdateScheduleRequest {
            amount: Some(dec!(1000)),
            ..Default::default()
        };
        let updated = ctx.scheduling.update("user-1", schedule.id, amount_only, now).await.unwrap();
        assert_eq!(updated.amount, dec!(1000));
        assert_eq!(updated.next_execution_at, schedule.next_execution_at);

        // Monday 2024-01-01 -> next Friday (5) at 18:00 WAT
        let to_weekly = UpdateScheduleRequest {
            schedule_type: Some("weekly".to_string()),
            day_of_week: Some(5),
            time_of_day: Some("18:00".to_string()),
            ..Default::default()
        };
        let updated = ctx.scheduling.update("user-1", schedule.id, to_weekly, now).await.unwrap();
        assert_eq!(updated.schedule_type, "weekly");
        assert_eq!(updated.next_execution_at, Some(at("2024-01-05T17:00:00Z")));

        // Paused schedules keep a null next even when the recurrence changes
        ctx.scheduling.pause("user-1", schedule.id, now).await.unwrap();
        let while_paused = UpdateScheduleRequest {
            time_of_day: Some("07:30".to_string()),
            ..Default::default()
        };
        let updated = ctx.scheduling.update("user-1", schedule.id, while_paused, now).await.unwrap();
        assert_eq!(updated.status, "paused");
        assert_eq!(updated.next_execution_at, None);
    }

    #[tokio::test]
    async fn test_update_rejects_cap_at_or_below_executions() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");
        let schedule = ctx.scheduling.create("user-1", daily_airtime("10:00"), now).await.unwrap();

        let mut active: scheduled_topup::ActiveModel = schedule.clone().into();
        active.total_executions = ActiveValue::Set(3);
        ctx.schedules.update_if_unchanged(&schedule, active).await.unwrap();

        let request = UpdateScheduleRequest {
            max_executions: Some(3),
            ..Default::default()
        };
        let err = ctx.scheduling.update("user-1", schedule.id, request, now).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "max_executions"));

        let request = UpdateScheduleRequest {
            max_executions: Some(4),
            ..Default::default()
        };
        let updated = ctx.scheduling.update("user-1", schedule.id, request, now).await.unwrap();
        assert_eq!(updated.max_executions, Some(4));
    }

    #[tokio::test]
    async fn test_beneficiary_supplies_number_and_network() {
        let ctx = TestContext::new().await;
        let beneficiary = ctx.seed_beneficiary("user-1", "Mum", "09061234567", "GLO").await;

        let request = CreateScheduleRequest {
            beneficiary_id: Some(beneficiary.id),
            phone_number: None,
            network: None,
            ..daily_airtime("10:00")
        };
        let schedule = ctx.scheduling.create("user-1", request, at("2024-01-01T07:00:00Z")).await.unwrap();
        assert_eq!(schedule.phone_number, "09061234567");
        assert_eq!(schedule.network, "GLO");
        assert_eq!(ctx.scheduling.resolve_target(&schedule).await.unwrap(), "09061234567");

        // Someone else's beneficiary is invisible
        let request = CreateScheduleRequest {
            beneficiary_id: Some(beneficiary.id),
            ..daily_airtime("10:00")
        };
        let err = ctx.scheduling.create("user-2", request, at("2024-01-01T07:00:00Z")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    fn model(kind: &str, max_executions: Option<i32>, total_executions: i32) -> scheduled_topup::Model {
        let now = at("2024-01-01T00:00:00Z");
        scheduled_topup::Model {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            beneficiary_id: None,
            phone_number: "08031234567".to_string(),
            network: "MTN".to_string(),
            purchase_type: "airtime".to_string(),
            amount: dec!(500),
            plan_id: None,
            schedule_type: kind.to_string(),
            scheduled_at: Some(at("2024-01-01T09:00:00Z")),
            time_of_day: Some("10:00".to_string()),
            day_of_week: Some(1),
            day_of_month: Some(15),
            max_executions,
            total_executions,
            next_execution_at: Some(at("2024-01-01T09:00:00Z")),
            status: "active".to_string(),
            last_executed_at: None,
            last_error: None,
            claimed_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_one_time_completes_after_single_attempt() {
        let tz = PurchaseRules::default().schedule_offset;
        let attempted = at("2024-01-01T09:00:00Z");
        let plan = plan_advancement(&model("one_time", None, 0), attempted, attempted, &tz).unwrap();
        assert_eq!(plan.status, ScheduleStatus::Completed);
        assert_eq!(plan.next_execution_at, None);
        assert_eq!(plan.total_executions, 1);
    }

    #[test]
    fn test_cap_completes_recurring_schedule() {
        let tz = PurchaseRules::default().schedule_offset;
        let attempted = at("2024-01-01T09:00:00Z");

        let plan = plan_advancement(&model("daily", Some(3), 1), attempted, attempted, &tz).unwrap();
        assert_eq!(plan.status, ScheduleStatus::Active);
        assert_eq!(plan.next_execution_at, Some(at("2024-01-02T09:00:00Z")));

        let plan = plan_advancement(&model("daily", Some(3), 2), attempted, attempted, &tz).unwrap();
        assert_eq!(plan.status, ScheduleStatus::Completed);
        assert_eq!(plan.next_execution_at, None);
        assert_eq!(plan.total_executions, 3);
    }

    #[test]
    fn test_late_run_skips_elapsed_occurrences() {
        let tz = PurchaseRules::default().schedule_offset;
        let attempted = at("2024-01-01T09:00:00Z");
        let now = at("2024-01-03T12:00:00Z");

        let plan = plan_advancement(&model("daily", None, 0), attempted, now, &tz).unwrap();
        assert_eq!(plan.next_execution_at, Some(at("2024-01-04T09:00:00Z")));
        assert!(plan.next_execution_at.unwrap() > now);
    }

    #[tokio::test]
    async fn test_resume_rejects_used_up_schedule() {
        let ctx = TestContext::new().await;
        let now = at("2024-01-01T07:00:00Z");
        let request = CreateScheduleRequest {
            max_executions: Some(3),
            ..daily_airtime("10:00")
        };
        let schedule = ctx.scheduling.create("user-1", request, now).await.unwrap();
        let paused = ctx.scheduling.pause("user-1", schedule.id, now).await.unwrap();

        let mut active: scheduled_topup::ActiveModel = paused.clone().into();
        active.total_executions = ActiveValue::Set(3);
        ctx.schedules.update_if_unchanged(&paused, active).await.unwrap();

        let err = ctx.scheduling.resume("user-1", schedule.id, now).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(ctx.scheduling.get("user-1", schedule.id).await.unwrap().status, "paused");
    }
}
