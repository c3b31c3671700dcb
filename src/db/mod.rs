use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    entity::prelude::*,
    sea_query::Expr,
    ActiveValue::Set,
    DatabaseConnection,
    SqlErr,
};
use uuid::Uuid;

use crate::error::{ AppError, Result };

pub mod entity;
pub use entity::*;

mod transaction_repository;
pub use transaction_repository::{ Finalization, NewTransaction, TransactionRepository };

mod schedule_repository;
pub use schedule_repository::{ Advancement, ScheduleRepository };

mod execution_log_repository;
pub use execution_log_repository::{ ExecutionLogRepository, NewExecutionLog };

pub struct WalletRepository {
    db: DatabaseConnection,
}

impl WalletRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: &str, opening_balance: Decimal) -> Result<entity::wallet::Model> {
        let now = Utc::now();
        let wallet = entity::wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            balance: Set(opening_balance),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let wallet = wallet.insert(&self.db).await?;
        Ok(wallet)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<entity::wallet::Model> {
        entity::wallet::Entity
            ::find_by_id(id)
            .one(&self.db).await?
            .ok_or_else(|| AppError::NotFound("Wallet".to_string()))
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Option<entity::wallet::Model>> {
        let wallet = entity::wallet::Entity
            ::find()
            .filter(entity::wallet::Column::UserId.eq(user_id))
            .one(&self.db).await?;

        Ok(wallet)
    }

    /// Wallets are created lazily the first time a user is seen.
    pub async fn find_or_create(&self, user_id: &str) -> Result<entity::wallet::Model> {
        if let Some(wallet) = self.find_by_user(user_id).await? {
            return Ok(wallet);
        }

        match self.create(user_id, Decimal::ZERO).await {
            Ok(wallet) => Ok(wallet),
            // Lost a creation race against another request for the same user
            Err(AppError::Database(e)) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                self.find_by_user(user_id).await?.ok_or_else(|| AppError::NotFound("Wallet".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Deduct `amount` only if the balance still covers it.
    ///
    /// Returns `false` when the conditional update matched no row, meaning a
    /// concurrent spend got there first and the wallet was left untouched.
    pub async fn debit(&self, wallet_id: Uuid, amount: Decimal) -> Result<bool> {
        let result = entity::wallet::Entity
            ::update_many()
            .col_expr(
                entity::wallet::Column::Balance,
                Expr::col(entity::wallet::Column::Balance).sub(amount)
            )
            .col_expr(entity::wallet::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(entity::wallet::Column::Id.eq(wallet_id))
            .filter(entity::wallet::Column::Balance.gte(amount))
            .exec(&self.db).await?;

        Ok(result.rows_affected == 1)
    }
}
