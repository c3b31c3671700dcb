use sea_orm::entity::prelude::*;
use serde::{ Deserialize, Serialize };

/// Wallet ledger entry. Immutable once its status leaves `pending`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: String,
    pub tx_type: String, // "deposit", "airtime_purchase", "data_purchase"
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub status: String, // "pending", "completed", "failed"
    #[sea_orm(unique)]
    pub reference: String,
    pub phone_number: Option<String>,
    pub network: Option<String>,
    pub plan_id: Option<String>,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub schedule_id: Option<Uuid>,
    pub reconciliation_required: bool,
    pub created_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
