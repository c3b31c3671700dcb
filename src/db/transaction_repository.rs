use chrono::{ DateTime, Utc };
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait,
    DatabaseConnection,
    EntityTrait,
    PaginatorTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
    Set,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::db::entity::{ transaction, Transaction };
use crate::enums::{ Network, TxStatus, TxType };
use crate::error::{ AppError, Result };

/// Everything known about a purchase before the provider is called.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: Uuid,
    pub user_id: String,
    pub tx_type: TxType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub reference: String,
    pub phone_number: Option<String>,
    pub network: Option<Network>,
    pub plan_id: Option<String>,
    pub schedule_id: Option<Uuid>,
}

/// Terminal state written exactly once to a pending transaction.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub status: TxStatus,
    pub balance_after: Decimal,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub reconciliation_required: bool,
}

pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a `pending` ledger row. `balance_after` is precomputed from the
    /// type's sign so a completed row never needs it recalculated.
    pub async fn create_pending(&self, new: NewTransaction) -> Result<transaction::Model> {
        let balance_after = if new.tx_type.is_debit() {
            new.balance_before - new.amount
        } else {
            new.balance_before + new.amount
        };

        let transaction_model = transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(new.wallet_id),
            user_id: Set(new.user_id),
            tx_type: Set(new.tx_type.to_string()),
            amount: Set(new.amount),
            balance_before: Set(new.balance_before),
            balance_after: Set(balance_after),
            status: Set(TxStatus::Pending.to_string()),
            reference: Set(new.reference),
            phone_number: Set(new.phone_number),
            network: Set(new.network.map(|n| n.to_string())),
            plan_id: Set(new.plan_id),
            provider_reference: Set(None),
            failure_reason: Set(None),
            schedule_id: Set(new.schedule_id),
            reconciliation_required: Set(false),
            created_at: Set(Utc::now()),
            completed_at: Set(None),
        };

        let transaction = Transaction::insert(transaction_model).exec_with_returning(&self.db).await?;

        Ok(transaction)
    }

    /// Move a pending transaction to its terminal state.
    ///
    /// The update is conditional on `status = pending`; `false` means the row
    /// was already finalized (for instance by the reconciliation sweep).
    pub async fn finalize(&self, id: Uuid, finalization: Finalization) -> Result<bool> {
        if finalization.status == TxStatus::Pending {
            return Err(AppError::Internal("Cannot finalize a transaction as pending".to_string()));
        }

        let result = Transaction::update_many()
            .col_expr(transaction::Column::Status, Expr::value(finalization.status.to_string()))
            .col_expr(transaction::Column::BalanceAfter, Expr::value(finalization.balance_after))
            .col_expr(
                transaction::Column::ProviderReference,
                Expr::value(finalization.provider_reference)
            )
            .col_expr(transaction::Column::FailureReason, Expr::value(finalization.failure_reason))
            .col_expr(
                transaction::Column::ReconciliationRequired,
                Expr::value(finalization.reconciliation_required)
            )
            .col_expr(transaction::Column::CompletedAt, Expr::value(Some(Utc::now())))
            .filter(transaction::Column::Id.eq(id))
            .filter(transaction::Column::Status.eq(TxStatus::Pending.as_str()))
            .exec(&self.db).await?;

        Ok(result.rows_affected == 1)
    }

    /// Mark a finalized transaction for manual follow-up without touching
    /// its amounts or status.
    pub async fn flag_for_reconciliation(&self, id: Uuid, reason: &str) -> Result<()> {
        Transaction::update_many()
            .col_expr(transaction::Column::ReconciliationRequired, Expr::value(true))
            .col_expr(transaction::Column::FailureReason, Expr::value(Some(reason.to_string())))
            .filter(transaction::Column::Id.eq(id))
            .exec(&self.db).await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<transaction::Model> {
        Transaction::find_by_id(id)
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Transaction".to_string()))
    }

    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: Option<u64>,
        offset: Option<u64>
    ) -> Result<Vec<transaction::Model>> {
        let transactions = Transaction::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .order_by_desc(transaction::Column::CreatedAt)
            .limit(limit.unwrap_or(50).min(200))
            .offset(offset.unwrap_or(0))
            .all(&self.db).await?;

        Ok(transactions)
    }

    pub async fn count_for_schedule(&self, schedule_id: Uuid) -> Result<u64> {
        let count = Transaction::find()
            .filter(transaction::Column::ScheduleId.eq(schedule_id))
            .count(&self.db).await?;

        Ok(count)
    }

    /// Pending transactions created before `cutoff`, oldest first.
    pub async fn find_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64
    ) -> Result<Vec<transaction::Model>> {
        let transactions = Transaction::find()
            .filter(transaction::Column::Status.eq(TxStatus::Pending.as_str()))
            .filter(transaction::Column::CreatedAt.lt(cutoff))
            .order_by_asc(transaction::Column::CreatedAt)
            .limit(limit)
            .all(&self.db).await?;

        Ok(transactions)
    }
}
