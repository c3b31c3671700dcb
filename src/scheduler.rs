use std::sync::Arc;

use chrono::{ DateTime, Utc };
use serde::Serialize;
use tokio::time::interval;

use crate::config::SchedulerSettings;
use crate::db::entity::scheduled_topup;
use crate::db::{ ExecutionLogRepository, NewExecutionLog, ScheduleRepository };
use crate::enums::{ ExecutionOutcome, NotificationCategory, NotificationSeverity };
use crate::error::{ AppError, Result };
use crate::services::notification_service::{ NewNotification, NotificationService };
use crate::services::purchase_service::{ purchase_label, PurchaseOrder, PurchaseOutcome, PurchaseService };
use crate::services::reconciliation_service::ReconciliationService;
use crate::services::scheduling_service::{ plan_advancement, SchedulingService };

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Processed {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of one attempt, before it is logged and the schedule advanced.
struct Attempt {
    transaction_id: Option<uuid::Uuid>,
    error: Option<String>,
    notification: NewNotification,
}

/// Batch runner for due scheduled top-ups.
#[derive(Clone)]
pub struct Scheduler {
    schedules: Arc<ScheduleRepository>,
    scheduling: Arc<SchedulingService>,
    purchases: Arc<PurchaseService>,
    logs: Arc<ExecutionLogRepository>,
    notifications: Arc<NotificationService>,
    reconciliation: Arc<ReconciliationService>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        schedules: Arc<ScheduleRepository>,
        scheduling: Arc<SchedulingService>,
        purchases: Arc<PurchaseService>,
        logs: Arc<ExecutionLogRepository>,
        notifications: Arc<NotificationService>,
        reconciliation: Arc<ReconciliationService>,
        settings: SchedulerSettings
    ) -> Self {
        Self {
            schedules,
            scheduling,
            purchases,
            logs,
            notifications,
            reconciliation,
            settings,
        }
    }

    pub async fn start(self) {
        let mut interval = interval(self.settings.interval);
        tracing::info!("Scheduler started, running every {:?}", self.settings.interval);

        loop {
            interval.tick().await;
            let now = Utc::now();

            match self.run_due(now).await {
                Ok(summary) if summary.processed > 0 => {
                    tracing::info!(
                        "Scheduled run: processed {}, succeeded {}, failed {}, skipped {}",
                        summary.processed,
                        summary.succeeded,
                        summary.failed,
                        summary.skipped
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Scheduler error: {}", e),
            }

            if let Err(e) = self.reconciliation.sweep(now).await {
                tracing::error!("Reconciliation sweep error: {}", e);
            }
        }
    }

    /// Execute every schedule due at `now`, up to the batch size.
    ///
    /// Only selecting the batch can fail the run; a failing schedule is
    /// counted and the batch moves on.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let due = self.schedules.find_due(now, self.settings.batch_size).await?;
        let mut summary = RunSummary::default();

        for schedule in due {
            summary.processed += 1;
            match self.process(&schedule, now).await {
                Ok(Processed::Succeeded) => {
                    summary.succeeded += 1;
                }
                Ok(Processed::Failed) => {
                    summary.failed += 1;
                }
                Ok(Processed::Skipped) => {
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to process schedule {}: {}", schedule.id, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn process(&self, schedule: &scheduled_topup::Model, now: DateTime<Utc>) -> Result<Processed> {
        let Some(attempted) = schedule.next_execution_at else {
            return Ok(Processed::Skipped);
        };

        let lease = chrono::Duration
            ::from_std(self.settings.claim_lease)
            .map_err(|e| AppError::Config(format!("Invalid claim lease: {}", e)))?;

        if !self.schedules.claim(schedule, now, lease).await? {
            tracing::debug!("Schedule {} claimed by another run", schedule.id);
            return Ok(Processed::Skipped);
        }

        // A previous run got as far as logging this occurrence
        if self.logs.was_attempted(schedule.id, attempted).await? {
            tracing::warn!(
                "Schedule {} occurrence {} already attempted, advancing only",
                schedule.id,
                attempted
            );
            self.advance(schedule, attempted, schedule.last_error.clone(), now).await?;
            return Ok(Processed::Skipped);
        }

        let attempt = match self.order_for(schedule).await {
            Ok(order) =>
                match self.purchases.execute(&order).await {
                    Ok(outcome) => describe_outcome(schedule, &order, outcome),
                    Err(e) => failure(schedule, format!("Purchase could not be processed: {}", e)),
                }
            Err(e) => failure(schedule, e.to_string()),
        };

        let outcome = if attempt.error.is_none() {
            ExecutionOutcome::Success
        } else {
            ExecutionOutcome::Failed
        };

        // Advancement does not depend on the log write
        let logged = self.logs.record(NewExecutionLog {
            schedule_id: schedule.id,
            user_id: schedule.user_id.clone(),
            transaction_id: attempt.transaction_id,
            outcome,
            failure_reason: attempt.error.clone(),
            amount: schedule.amount,
            scheduled_for: attempted,
        }).await;
        if let Err(e) = logged {
            tracing::error!("Failed to log attempt of schedule {} at {}: {}", schedule.id, attempted, e);
        }

        self.advance(schedule, attempted, attempt.error.clone(), now).await?;
        self.notifications.notify(&schedule.user_id, attempt.notification).await;

        match &attempt.error {
            None => {
                tracing::info!("Scheduled top-up {} executed", schedule.id);
                Ok(Processed::Succeeded)
            }
            Some(reason) => {
                tracing::warn!("Scheduled top-up {} failed: {}", schedule.id, reason);
                Ok(Processed::Failed)
            }
        }
    }

    async fn order_for(&self, schedule: &scheduled_topup::Model) -> Result<PurchaseOrder> {
        Ok(PurchaseOrder {
            user_id: schedule.user_id.clone(),
            phone_number: self.scheduling.resolve_target(schedule).await?,
            network: schedule.network()?,
            purchase_type: schedule.purchase_type()?,
            amount: schedule.amount,
            plan_id: schedule.plan_id.clone(),
            schedule_id: Some(schedule.id),
        })
    }

    async fn advance(
        &self,
        schedule: &scheduled_topup::Model,
        attempted: DateTime<Utc>,
        error: Option<String>,
        now: DateTime<Utc>
    ) -> Result<()> {
        let planned = plan_advancement(schedule, attempted, now, self.scheduling.offset())?;
        self.schedules.record_attempt(schedule.id, &planned, error, now).await
    }
}

fn describe_outcome(
    schedule: &scheduled_topup::Model,
    order: &PurchaseOrder,
    outcome: PurchaseOutcome
) -> Attempt {
    let label = purchase_label(order.purchase_type);
    match outcome {
        PurchaseOutcome::Completed { transaction } =>
            Attempt {
                transaction_id: Some(transaction.id),
                error: None,
                notification: NewNotification::new(
                    NotificationCategory::ScheduledTopup,
                    NotificationSeverity::Success,
                    format!("Scheduled {} top-up successful", label.to_lowercase()),
                    format!("₦{} {} {} sent to {}.", order.amount, order.network, order.purchase_type, order.phone_number)
                ).with_metadata(
                    serde_json::json!({ "schedule_id": schedule.id, "transaction_id": transaction.id })
                ),
            },
        PurchaseOutcome::InsufficientBalance { balance } =>
            Attempt {
                transaction_id: None,
                error: Some("Insufficient balance".to_string()),
                notification: NewNotification::new(
                    NotificationCategory::ScheduledTopup,
                    NotificationSeverity::Warning,
                    "Scheduled top-up skipped",
                    format!(
                        "Your wallet balance (₦{}) is too low for the scheduled ₦{} {} top-up to {}. Fund your wallet to avoid missing the next one.",
                        balance,
                        order.amount,
                        label.to_lowercase(),
                        order.phone_number
                    )
                ).with_metadata(serde_json::json!({ "schedule_id": schedule.id })),
            },
        PurchaseOutcome::ProviderFailed { transaction, reason } =>
            Attempt {
                transaction_id: Some(transaction.id),
                error: Some(reason.clone()),
                notification: NewNotification::new(
                    NotificationCategory::ScheduledTopup,
                    NotificationSeverity::Error,
                    "Scheduled top-up failed",
                    format!(
                        "The scheduled ₦{} {} top-up to {} could not be completed: {}. No funds were deducted.",
                        order.amount,
                        label.to_lowercase(),
                        order.phone_number,
                        reason
                    )
                ).with_metadata(
                    serde_json::json!({ "schedule_id": schedule.id, "transaction_id": transaction.id })
                ),
            },
        PurchaseOutcome::Unsettled { transaction_id, delivered: true, reason } => {
            tracing::error!("Schedule {} delivered but unsettled: {}", schedule.id, reason);
            Attempt {
                transaction_id: Some(transaction_id),
                error: None,
                notification: NewNotification::new(
                    NotificationCategory::ScheduledTopup,
                    NotificationSeverity::Success,
                    format!("Scheduled {} top-up successful", label.to_lowercase()),
                    format!("₦{} {} {} sent to {}.", order.amount, order.network, order.purchase_type, order.phone_number)
                ).with_metadata(
                    serde_json::json!({ "schedule_id": schedule.id, "transaction_id": transaction_id })
                ),
            }
        }
        PurchaseOutcome::Unsettled { transaction_id, delivered: false, reason } =>
            Attempt {
                transaction_id: Some(transaction_id),
                error: Some(reason.clone()),
                notification: NewNotification::new(
                    NotificationCategory::ScheduledTopup,
                    NotificationSeverity::Error,
                    "Scheduled top-up failed",
                    format!(
                        "The scheduled ₦{} {} top-up to {} could not be completed. No funds were deducted.",
                        order.amount,
                        label.to_lowercase(),
                        order.phone_number
                    )
                ).with_metadata(
                    serde_json::json!({ "schedule_id": schedule.id, "transaction_id": transaction_id })
                ),
            },
    }
}

fn failure(schedule: &scheduled_topup::Model, reason: String) -> Attempt {
    Attempt {
        transaction_id: None,
        error: Some(reason.clone()),
        notification: NewNotification::new(
            NotificationCategory::ScheduledTopup,
            NotificationSeverity::Error,
            "Scheduled top-up failed",
            format!("The scheduled top-up to {} could not be made: {}", schedule.phone_number, reason)
        ).with_metadata(serde_json::json!({ "schedule_id": schedule.id })),
    }
}
