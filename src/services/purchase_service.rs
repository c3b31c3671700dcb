use std::collections::HashMap;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::PurchaseRules;
use crate::db::entity::transaction;
use crate::db::{ Finalization, NewTransaction, TransactionRepository, WalletRepository };
use crate::enums::{ Network, NotificationCategory, NotificationSeverity, PurchaseType, TxStatus, TxType };
use crate::error::{ AppError, Result };
use crate::providers::{ PurchaseRequest, VtuProvider };
use crate::services::budget_service::BudgetService;
use crate::services::notification_service::{ NewNotification, NotificationService };
use crate::validation;

/// A fully validated purchase, from either a schedule or a manual request.
#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    pub user_id: String,
    pub phone_number: String,
    pub network: Network,
    pub purchase_type: PurchaseType,
    pub amount: Decimal,
    pub plan_id: Option<String>,
    pub schedule_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    Completed {
        transaction: transaction::Model,
    },
    /// Rejected before anything was written.
    InsufficientBalance {
        balance: Decimal,
    },
    /// The provider refused or timed out; the transaction is `failed` and
    /// the wallet untouched.
    ProviderFailed {
        transaction: transaction::Model,
        reason: String,
    },
    /// The provider answered but recording the answer failed. A row still
    /// `pending` is resolved by the reconciliation sweep; a delivered one is
    /// flagged for review.
    Unsettled {
        transaction_id: Uuid,
        delivered: bool,
        reason: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualPurchaseRequest {
    pub phone_number: String,
    pub network: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub plan_id: Option<String>,
}

/// Serializes purchases per wallet inside this process.
#[derive(Default)]
pub struct WalletLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl WalletLocks {
    pub fn lock_for(&self, wallet_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(wallet_id).or_default().clone()
    }
}

pub struct PurchaseService {
    wallets: Arc<WalletRepository>,
    transactions: Arc<TransactionRepository>,
    provider: Arc<dyn VtuProvider>,
    budgets: Arc<BudgetService>,
    notifications: Arc<NotificationService>,
    rules: PurchaseRules,
    provider_timeout: Duration,
    locks: WalletLocks,
}

impl PurchaseService {
    pub fn new(
        wallets: Arc<WalletRepository>,
        transactions: Arc<TransactionRepository>,
        provider: Arc<dyn VtuProvider>,
        budgets: Arc<BudgetService>,
        notifications: Arc<NotificationService>,
        rules: PurchaseRules,
        provider_timeout: Duration
    ) -> Self {
        Self {
            wallets,
            transactions,
            provider,
            budgets,
            notifications,
            rules,
            provider_timeout,
            locks: WalletLocks::default(),
        }
    }

    /// Run one purchase through balance check, provider call, ledger and
    /// budget.
    ///
    /// Business outcomes come back as [`PurchaseOutcome`]. `Err` is reserved
    /// for store failures before the provider is called; once it has been
    /// called the result is always an outcome naming the transaction.
    pub async fn execute(&self, order: &PurchaseOrder) -> Result<PurchaseOutcome> {
        let Some(wallet) = self.wallets.find_by_user(&order.user_id).await? else {
            return Ok(PurchaseOutcome::InsufficientBalance { balance: Decimal::ZERO });
        };

        let lock = self.locks.lock_for(wallet.id);
        let _guard = lock.lock().await;

        // Balance may have moved while waiting for the lock
        let wallet = self.wallets.find_by_id(wallet.id).await?;
        if wallet.balance < order.amount {
            return Ok(PurchaseOutcome::InsufficientBalance { balance: wallet.balance });
        }

        let pending = self.transactions.create_pending(NewTransaction {
            wallet_id: wallet.id,
            user_id: order.user_id.clone(),
            tx_type: order.purchase_type.tx_type(),
            amount: order.amount,
            balance_before: wallet.balance,
            reference: generate_reference(),
            phone_number: Some(order.phone_number.clone()),
            network: Some(order.network),
            plan_id: order.plan_id.clone(),
            schedule_id: order.schedule_id,
        }).await?;

        let request = PurchaseRequest {
            phone_number: order.phone_number.clone(),
            network: order.network,
            purchase_type: order.purchase_type,
            amount: order.amount,
            plan_id: order.plan_id.clone(),
            reference: pending.reference.clone(),
        };

        let result = match tokio::time::timeout(self.provider_timeout, self.provider.purchase(&request)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::ProviderTimeout),
        };

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!("Provider rejected purchase {}: {}", pending.reference, reason);

                let recorded = self.record_failure(&pending, &reason).await;
                return Ok(match recorded {
                    Ok(transaction) => PurchaseOutcome::ProviderFailed { transaction, reason },
                    Err(e) => self.unsettled(&pending, false, e).await,
                });
            }
        };

        match self.record_success(&pending, receipt.transaction_id).await {
            Ok(transaction) => {
                tracing::info!(
                    "Purchase {} completed: {} {} {} for {}",
                    transaction.reference,
                    order.network,
                    order.purchase_type,
                    order.amount,
                    order.phone_number
                );
                Ok(PurchaseOutcome::Completed { transaction })
            }
            Err(e) => Ok(self.unsettled(&pending, true, e).await),
        }
    }

    async fn record_failure(&self, pending: &transaction::Model, reason: &str) -> Result<transaction::Model> {
        self.transactions.finalize(pending.id, Finalization {
            status: TxStatus::Failed,
            balance_after: pending.balance_before,
            provider_reference: None,
            failure_reason: Some(reason.to_string()),
            reconciliation_required: false,
        }).await?;

        self.transactions.find_by_id(pending.id).await
    }

    async fn record_success(
        &self,
        pending: &transaction::Model,
        provider_reference: Option<String>
    ) -> Result<transaction::Model> {
        let finalized = self.transactions.finalize(pending.id, Finalization {
            status: TxStatus::Completed,
            balance_after: pending.balance_after,
            provider_reference,
            failure_reason: None,
            reconciliation_required: false,
        }).await?;

        if finalized {
            self.settle_completed(pending).await?;
        } else {
            tracing::warn!("Transaction {} was finalized elsewhere, not debiting", pending.reference);
        }

        self.transactions.find_by_id(pending.id).await
    }

    /// The provider answered but the ledger write after it failed.
    async fn unsettled(&self, pending: &transaction::Model, delivered: bool, error: AppError) -> PurchaseOutcome {
        let reason = format!("Ledger update failed after provider response: {}", error);
        tracing::error!("Purchase {} left unsettled: {}", pending.reference, reason);

        if delivered {
            if let Err(e) = self.transactions.flag_for_reconciliation(pending.id, &reason).await {
                tracing::error!("Could not flag {} for reconciliation: {}", pending.reference, e);
            }
        }

        PurchaseOutcome::Unsettled {
            transaction_id: pending.id,
            delivered,
            reason,
        }
    }

    /// Debit and budget bookkeeping for a transaction that just became
    /// `completed`.
    pub async fn settle_completed(&self, transaction: &transaction::Model) -> Result<()> {
        let debited = self.wallets.debit(transaction.wallet_id, transaction.amount).await?;
        if !debited {
            tracing::error!(
                "Wallet {} could not cover completed transaction {} ({}); flagged for reconciliation",
                transaction.wallet_id,
                transaction.reference,
                transaction.amount
            );
            self.transactions.flag_for_reconciliation(
                transaction.id,
                "Balance insufficient at debit after provider success"
            ).await?;
            return Ok(());
        }

        let category = transaction.tx_type
            .parse::<TxType>()
            .ok()
            .and_then(|t| t.spending_category());

        if let Some(category) = category {
            if
                let Err(e) = self.budgets.record_spending(
                    &transaction.user_id,
                    transaction.id,
                    category,
                    transaction.amount,
                    Utc::now()
                ).await
            {
                tracing::warn!("Failed to record spending for {}: {}", transaction.reference, e);
            }
        }

        Ok(())
    }

    /// Immediate purchase on behalf of the caller. Failures surface as
    /// errors instead of outcomes.
    pub async fn purchase(
        &self,
        user_id: &str,
        purchase_type: PurchaseType,
        request: ManualPurchaseRequest
    ) -> Result<transaction::Model> {
        let phone_number = validation::normalize_phone_number(&request.phone_number)?;
        let network: Network = request.network.parse()?;
        let payload = validation::resolve_payload(
            purchase_type,
            network,
            request.amount,
            request.plan_id.as_deref(),
            &self.rules
        )?;

        let order = PurchaseOrder {
            user_id: user_id.to_string(),
            phone_number,
            network,
            purchase_type,
            amount: payload.amount,
            plan_id: payload.plan_id,
            schedule_id: None,
        };

        match self.execute(&order).await? {
            PurchaseOutcome::Completed { transaction } => {
                self.notifications.notify(
                    user_id,
                    NewNotification::new(
                        NotificationCategory::Purchase,
                        NotificationSeverity::Success,
                        format!("{} purchase successful", purchase_label(purchase_type)),
                        format!(
                            "₦{} {} {} sent to {}.",
                            transaction.amount,
                            network,
                            purchase_type,
                            order.phone_number
                        )
                    ).with_metadata(serde_json::json!({ "transaction_id": transaction.id }))
                ).await;
                Ok(transaction)
            }
            PurchaseOutcome::InsufficientBalance { .. } => Err(AppError::InsufficientBalance),
            PurchaseOutcome::ProviderFailed { transaction, reason } => {
                self.notifications.notify(
                    user_id,
                    NewNotification::new(
                        NotificationCategory::Purchase,
                        NotificationSeverity::Error,
                        format!("{} purchase failed", purchase_label(purchase_type)),
                        format!("{}. No funds were deducted.", reason)
                    ).with_metadata(serde_json::json!({ "transaction_id": transaction.id }))
                ).await;
                Err(AppError::Provider(reason))
            }
            PurchaseOutcome::Unsettled { transaction_id, reason, .. } =>
                Err(AppError::Internal(format!("Transaction {}: {}", transaction_id, reason))),
        }
    }
}

pub fn purchase_label(purchase_type: PurchaseType) -> &'static str {
    match purchase_type {
        PurchaseType::Airtime => "Airtime",
        PurchaseType::Data => "Data",
    }
}

/// Ledger reference, also sent to the provider as the request id.
fn generate_reference() -> String {
    format!("TOPUP-{}-{:08X}", Utc::now().format("%Y%m%d%H%M%S"), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::test_utils::{ FakeVtuProvider, TestContext };

    fn order(user_id: &str, amount: Decimal) -> PurchaseOrder {
        PurchaseOrder {
            user_id: user_id.to_string(),
            phone_number: "08031234567".to_string(),
            network: Network::Mtn,
            purchase_type: PurchaseType::Airtime,
            amount,
            plan_id: None,
            schedule_id: None,
        }
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_reference();
        assert!(reference.starts_with("TOPUP-"));
        assert_eq!(reference.len(), "TOPUP-20240101000000-ABCDEF12".len());
        assert_ne!(reference, generate_reference());
    }

    #[tokio::test]
    async fn test_successful_purchase_debits_and_records_spending() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(1000)).await;

        let outcome = ctx.purchases.execute(&order("user-1", dec!(300))).await.unwrap();
        let PurchaseOutcome::Completed { transaction } = outcome else {
            panic!("expected completed purchase");
        };

        assert_eq!(transaction.status, "completed");
        assert_eq!(transaction.balance_before, dec!(1000));
        assert_eq!(transaction.balance_after, dec!(700));
        assert!(transaction.provider_reference.is_some());
        assert!(transaction.completed_at.is_some());
        assert_eq!(ctx.balance_of("user-1").await, dec!(700));

        let month = ctx.budgets.month_key(Utc::now());
        let spending = ctx.budgets.list_spending("user-1", &month).await.unwrap();
        assert_eq!(spending.len(), 1);
        assert_eq!(spending[0].transaction_id, transaction.id);
        assert_eq!(spending[0].category, "AIRTIME");
    }

    #[tokio::test]
    async fn test_insufficient_balance_writes_nothing() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(100)).await;

        let outcome = ctx.purchases.execute(&order("user-1", dec!(500))).await.unwrap();
        assert!(matches!(outcome, PurchaseOutcome::InsufficientBalance { balance } if balance == dec!(100)));
        assert!(ctx.transactions.find_by_user("user-1", None, None).await.unwrap().is_empty());
        assert!(ctx.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_wallet_counts_as_empty() {
        let ctx = TestContext::new().await;
        let outcome = ctx.purchases.execute(&order("nobody", dec!(100))).await.unwrap();
        assert!(matches!(outcome, PurchaseOutcome::InsufficientBalance { balance } if balance.is_zero()));
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_balance_untouched() {
        let ctx = TestContext::with_provider(FakeVtuProvider::failing("Network unavailable")).await;
        ctx.seed_wallet("user-1", dec!(1000)).await;

        let outcome = ctx.purchases.execute(&order("user-1", dec!(300))).await.unwrap();
        let PurchaseOutcome::ProviderFailed { transaction, reason } = outcome else {
            panic!("expected provider failure");
        };

        assert!(reason.contains("Network unavailable"));
        assert_eq!(transaction.status, "failed");
        assert_eq!(transaction.balance_after, transaction.balance_before);
        assert_eq!(ctx.balance_of("user-1").await, dec!(1000));
    }

    #[tokio::test]
    async fn test_provider_timeout_is_a_provider_failure() {
        let ctx = TestContext::with_provider(FakeVtuProvider::slow(Duration::from_secs(5))).await;
        ctx.seed_wallet("user-1", dec!(1000)).await;

        let outcome = ctx.purchases.execute(&order("user-1", dec!(300))).await.unwrap();
        assert!(matches!(outcome, PurchaseOutcome::ProviderFailed { .. }));
        assert_eq!(ctx.balance_of("user-1").await, dec!(1000));
    }

    #[tokio::test]
    async fn test_concurrent_purchases_never_overdraw() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(500)).await;

        let first = order("user-1", dec!(300));
        let second = order("user-1", dec!(300));
        let (a, b) = tokio::join!(ctx.purchases.execute(&first), ctx.purchases.execute(&second));

        let completed = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|o| matches!(o, PurchaseOutcome::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(ctx.balance_of("user-1").await, dec!(200));
    }

    #[tokio::test]
    async fn test_manual_purchase_maps_outcomes_to_errors() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(100)).await;

        let request = ManualPurchaseRequest {
            phone_number: "+2348031234567".to_string(),
            network: "mtn".to_string(),
            amount: Some(dec!(500)),
            plan_id: None,
        };
        let err = ctx.purchases.purchase("user-1", PurchaseType::Airtime, request).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance));

        let bad_phone = ManualPurchaseRequest {
            phone_number: "12345".to_string(),
            network: "MTN".to_string(),
            amount: Some(dec!(50)),
            plan_id: None,
        };
        let err = ctx.purchases.purchase("user-1", PurchaseType::Airtime, bad_phone).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "phone_number"));
    }

    #[tokio::test]
    async fn test_manual_data_purchase_charges_plan_price() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(1000)).await;

        let request = ManualPurchaseRequest {
            phone_number: "08031234567".to_string(),
            network: "MTN".to_string(),
            amount: None,
            plan_id: Some("mtn-1gb-30d".to_string()),
        };
        let transaction = ctx.purchases.purchase("user-1", PurchaseType::Data, request).await.unwrap();

        assert_eq!(transaction.tx_type, "data_purchase");
        assert_eq!(transaction.amount, dec!(280));
        assert_eq!(transaction.plan_id.as_deref(), Some("mtn-1gb-30d"));
        assert_eq!(ctx.balance_of("user-1").await, dec!(720));

        let notifications = ctx.notifications.list_for_user("user-1").await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].severity, "success");
    }

    #[tokio::test]
    async fn test_unrecorded_success_is_reported_with_its_transaction() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(1000)).await;
        ctx.reject_writes("transactions", "UPDATE").await;

        let outcome = ctx.purchases.execute(&order("user-1", dec!(300))).await.unwrap();
        let PurchaseOutcome::Unsettled { transaction_id, delivered, .. } = outcome else {
            panic!("expected unsettled purchase");
        };
        assert!(delivered);

        // Still pending, left for the reconciliation sweep
        let tx = ctx.transactions.find_by_id(transaction_id).await.unwrap();
        assert_eq!(tx.status, "pending");
        assert_eq!(ctx.balance_of("user-1").await, dec!(1000));
    }

    #[tokio::test]
    async fn test_manual_purchase_surfaces_unsettled_as_internal_error() {
        let ctx = TestContext::new().await;
        ctx.seed_wallet("user-1", dec!(1000)).await;
        ctx.reject_writes("wallets", "UPDATE").await;

        let request = ManualPurchaseRequest {
            phone_number: "08031234567".to_string(),
            network: "MTN".to_string(),
            amount: Some(dec!(200)),
            plan_id: None,
        };
        let err = ctx.purchases.purchase("user-1", PurchaseType::Airtime, request).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let transactions = ctx.transactions.find_by_user("user-1", None, None).await.unwrap();
        assert_eq!(transactions[0].status, "completed");
        assert!(transactions[0].reconciliation_required);
    }
}
