use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schedule_execution_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub user_id: String,
    pub transaction_id: Option<Uuid>,
    pub outcome: String, // "success", "failed"
    pub failure_reason: Option<String>,
    pub amount: Decimal,
    /// The due occurrence this attempt consumed.
    pub scheduled_for: DateTimeUtc,
    pub executed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scheduled_topup::Entity",
        from = "Column::ScheduleId",
        to = "super::scheduled_topup::Column::Id"
    )]
    ScheduledTopup,
}

impl Related<super::scheduled_topup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledTopup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
