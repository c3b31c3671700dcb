use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::db::entity::transaction;
use crate::db::{ TransactionRepository, WalletRepository };
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct WalletView {
    pub id: Uuid,
    pub balance: Decimal,
    pub updated_at: String,
}

/// Read side of the wallet ledger.
pub struct WalletService {
    repository: Arc<WalletRepository>,
    transactions: Arc<TransactionRepository>,
}

impl WalletService {
    pub fn new(repository: Arc<WalletRepository>, transactions: Arc<TransactionRepository>) -> Self {
        Self {
            repository,
            transactions,
        }
    }

    pub async fn get_wallet(&self, user_id: &str) -> Result<WalletView> {
        let wallet = self.repository.find_or_create(user_id).await?;

        Ok(WalletView {
            id: wallet.id,
            balance: wallet.balance,
            updated_at: wallet.updated_at.to_rfc3339(),
        })
    }

    pub async fn list_transactions(
        &self,
        user_id: &str,
        limit: Option<u64>,
        offset: Option<u64>
    ) -> Result<Vec<transaction::Model>> {
        self.transactions.find_by_user(user_id, limit, offset).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::test_utils::TestContext;

    #[tokio::test]
    async fn test_wallet_is_created_on_first_read() {
        let ctx = TestContext::new().await;

        let first = ctx.wallet_service.get_wallet("user-new").await.unwrap();
        assert_eq!(first.balance, dec!(0));

        let second = ctx.wallet_service.get_wallet("user-new").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_existing_balance_is_reported() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(2500)).await;

        let wallet = ctx.wallet_service.get_wallet("user-1").await.unwrap();
        assert_eq!(wallet.balance, dec!(2500));
        assert!(ctx.wallet_service.list_transactions("user-1", None, None).await.unwrap().is_empty());
    }
}
