use std::sync::Arc;
use std::time::Duration;

use chrono::{ DateTime, Utc };
use serde::Serialize;

use crate::db::entity::transaction;
use crate::db::{ Finalization, TransactionRepository };
use crate::enums::{ NotificationCategory, NotificationSeverity, TxStatus };
use crate::error::{ AppError, Result };
use crate::providers::{ ProviderStatus, VtuProvider };
use crate::services::notification_service::{ NewNotification, NotificationService };
use crate::services::purchase_service::PurchaseService;

const SWEEP_BATCH: u64 = 100;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconciliationSummary {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
    pub flagged: usize,
}

/// Resolves transactions left `pending` by a crash or a lost provider reply.
pub struct ReconciliationService {
    transactions: Arc<TransactionRepository>,
    purchases: Arc<PurchaseService>,
    provider: Arc<dyn VtuProvider>,
    notifications: Arc<NotificationService>,
    pending_timeout: Duration,
    provider_timeout: Duration,
}

impl ReconciliationService {
    pub fn new(
        transactions: Arc<TransactionRepository>,
        purchases: Arc<PurchaseService>,
        provider: Arc<dyn VtuProvider>,
        notifications: Arc<NotificationService>,
        pending_timeout: Duration,
        provider_timeout: Duration
    ) -> Self {
        Self {
            transactions,
            purchases,
            provider,
            notifications,
            pending_timeout,
            provider_timeout,
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<ReconciliationSummary> {
        let timeout = chrono::Duration
            ::from_std(self.pending_timeout)
            .map_err(|e| AppError::Config(format!("Invalid pending timeout: {}", e)))?;

        let stale = self.transactions.find_stale_pending(now - timeout, SWEEP_BATCH).await?;
        let mut summary = ReconciliationSummary::default();

        for pending in stale {
            summary.examined += 1;
            match self.resolve(&pending).await {
                Ok(Resolution::Completed) => {
                    summary.completed += 1;
                }
                Ok(Resolution::Failed) => {
                    summary.failed += 1;
                }
                Ok(Resolution::Flagged) => {
                    summary.flagged += 1;
                }
                Ok(Resolution::AlreadyFinal) => {}
                Err(e) => {
                    tracing::error!("Failed to reconcile transaction {}: {}", pending.reference, e);
                }
            }
        }

        if summary.examined > 0 {
            tracing::info!(
                "Reconciliation: examined {}, completed {}, failed {}, flagged {}",
                summary.examined,
                summary.completed,
                summary.failed,
                summary.flagged
            );
        }

        Ok(summary)
    }

    async fn resolve(&self, pending: &transaction::Model) -> Result<Resolution> {
        let status = match
            tokio::time::timeout(self.provider_timeout, self.provider.query_status(&pending.reference)).await
        {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                tracing::warn!("Status query for {} failed: {}", pending.reference, e);
                ProviderStatus::Unknown
            }
            Err(_) => ProviderStatus::Unknown,
        };

        match status {
            ProviderStatus::Delivered { transaction_id } => {
                let finalized = self.transactions.finalize(pending.id, Finalization {
                    status: TxStatus::Completed,
                    balance_after: pending.balance_after,
                    provider_reference: transaction_id,
                    failure_reason: None,
                    reconciliation_required: false,
                }).await?;
                if !finalized {
                    return Ok(Resolution::AlreadyFinal);
                }

                self.purchases.settle_completed(pending).await?;
                tracing::info!("Reconciled {} as delivered", pending.reference);
                Ok(Resolution::Completed)
            }
            ProviderStatus::Failed { reason } => {
                let finalized = self.transactions.finalize(pending.id, Finalization {
                    status: TxStatus::Failed,
                    balance_after: pending.balance_before,
                    provider_reference: None,
                    failure_reason: Some(reason.clone()),
                    reconciliation_required: false,
                }).await?;
                if !finalized {
                    return Ok(Resolution::AlreadyFinal);
                }

                self.notify_failed(pending, &reason).await;
                Ok(Resolution::Failed)
            }
            ProviderStatus::Unknown => {
                let reason = "Provider status unknown after pending timeout";
                let finalized = self.transactions.finalize(pending.id, Finalization {
                    status: TxStatus::Failed,
                    balance_after: pending.balance_before,
                    provider_reference: None,
                    failure_reason: Some(reason.to_string()),
                    reconciliation_required: true,
                }).await?;
                if !finalized {
                    return Ok(Resolution::AlreadyFinal);
                }

                tracing::error!(
                    "Transaction {} closed as failed without provider confirmation",
                    pending.reference
                );
                self.notify_failed(pending, reason).await;
                Ok(Resolution::Flagged)
            }
        }
    }

    async fn notify_failed(&self, pending: &transaction::Model, reason: &str) {
        self.notifications.notify(
            &pending.user_id,
            NewNotification::new(
                NotificationCategory::Wallet,
                NotificationSeverity::Warning,
                "Purchase could not be completed",
                format!(
                    "Your ₦{} purchase ({}) did not go through: {}. No funds were deducted.",
                    pending.amount,
                    pending.reference,
                    reason
                )
            ).with_metadata(serde_json::json!({ "transaction_id": pending.id }))
        ).await;
    }
}

enum Resolution {
    Completed,
    Failed,
    Flagged,
    AlreadyFinal,
}
