use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

use crate::enums::{ Network, PurchaseType, ScheduleKind, ScheduleStatus };
use crate::error::Result as AppResult;
use crate::recurrence::Recurrence;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scheduled_topups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub beneficiary_id: Option<Uuid>,
    pub phone_number: String,
    pub network: String,
    pub purchase_type: String, // "airtime", "data"
    pub amount: Decimal,
    pub plan_id: Option<String>,
    pub schedule_type: String, // "one_time", "daily", "weekly", "monthly"
    pub scheduled_at: Option<DateTimeUtc>,
    pub time_of_day: Option<String>,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub max_executions: Option<i32>,
    pub total_executions: i32,
    /// Set iff the schedule is active.
    pub next_execution_at: Option<DateTimeUtc>,
    pub status: String, // "active", "paused", "completed", "cancelled"
    pub last_executed_at: Option<DateTimeUtc>,
    pub last_error: Option<String>,
    #[serde(skip_serializing)]
    pub claimed_until: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::execution_log::Entity")]
    ExecutionLog,
}

impl Related<super::execution_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExecutionLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> AppResult<ScheduleStatus> {
        self.status.parse()
    }

    pub fn kind(&self) -> AppResult<ScheduleKind> {
        self.schedule_type.parse()
    }

    pub fn network(&self) -> AppResult<Network> {
        self.network.parse()
    }

    pub fn purchase_type(&self) -> AppResult<PurchaseType> {
        self.purchase_type.parse()
    }

    pub fn recurrence(&self) -> AppResult<Recurrence> {
        Recurrence::from_parts(
            self.kind()?,
            self.scheduled_at,
            self.time_of_day.as_deref(),
            self.day_of_week,
            self.day_of_month
        )
    }
}
