use std::collections::HashMap;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use migration::{ Migrator, MigratorTrait };
use rust_decimal::Decimal;
use sea_orm::{ ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set };
use uuid::Uuid;

use crate::api::{ self, AppState };
use crate::config::{ PurchaseRules, SchedulerSettings };
use crate::db::entity::beneficiary;
use crate::db::{ ExecutionLogRepository, ScheduleRepository, TransactionRepository, WalletRepository };
use crate::error::{ AppError, Result };
use crate::providers::{ ProviderReceipt, ProviderStatus, PurchaseRequest, VtuProvider };
use crate::scheduler::Scheduler;
use crate::services::{
    BudgetService,
    NotificationService,
    PurchaseService,
    ReconciliationService,
    SchedulingService,
    WalletService,
};

/// In-memory SQLite database with every migration applied
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("Failed to connect to in-memory database");

    Migrator::up(&db, None).await.expect("Failed to run migrations");

    db
}

/// Scripted provider: succeeds, fails or stalls as configured and records
/// every purchase it receives.
#[derive(Default)]
pub struct FakeVtuProvider {
    failure: Option<String>,
    delay: Option<Duration>,
    statuses: Mutex<HashMap<String, ProviderStatus>>,
    calls: Mutex<Vec<PurchaseRequest>>,
}

impl FakeVtuProvider {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_status(&self, reference: &str, status: ProviderStatus) {
        self.statuses.lock().unwrap().insert(reference.to_string(), status);
    }

    pub fn calls(&self) -> Vec<PurchaseRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VtuProvider for FakeVtuProvider {
    async fn purchase(&self, request: &PurchaseRequest) -> Result<ProviderReceipt> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.failure {
            Some(reason) => Err(AppError::Provider(reason.clone())),
            None =>
                Ok(ProviderReceipt {
                    reference: request.reference.clone(),
                    transaction_id: Some(format!("vtu-{}", Uuid::new_v4())),
                }),
        }
    }

    async fn query_status(&self, reference: &str) -> Result<ProviderStatus> {
        Ok(self.statuses.lock().unwrap().get(reference).cloned().unwrap_or(ProviderStatus::Unknown))
    }
}

/// Every service wired against one in-memory database.
pub struct TestContext {
    pub db: DatabaseConnection,
    pub provider: Arc<FakeVtuProvider>,
    pub wallets: Arc<WalletRepository>,
    pub transactions: Arc<TransactionRepository>,
    pub schedules: Arc<ScheduleRepository>,
    pub logs: Arc<ExecutionLogRepository>,
    pub notifications: Arc<NotificationService>,
    pub budgets: Arc<BudgetService>,
    pub purchases: Arc<PurchaseService>,
    pub scheduling: Arc<SchedulingService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub wallet_service: Arc<WalletService>,
    pub scheduler: Arc<Scheduler>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_provider(FakeVtuProvider::succeeding()).await
    }

    pub async fn with_provider(provider: FakeVtuProvider) -> Self {
        let db = setup_test_db().await;
        let provider = Arc::new(provider);
        let rules = PurchaseRules::default();
        let provider_timeout = Duration::from_millis(200);

        let wallets = Arc::new(WalletRepository::new(db.clone()));
        let transactions = Arc::new(TransactionRepository::new(db.clone()));
        let schedules = Arc::new(ScheduleRepository::new(db.clone()));
        let logs = Arc::new(ExecutionLogRepository::new(db.clone()));

        let notifications = Arc::new(NotificationService::new(db.clone()));
        let budgets = Arc::new(
            BudgetService::new(db.clone(), notifications.clone(), rules.schedule_offset)
        );
        let purchases = Arc::new(
            PurchaseService::new(
                wallets.clone(),
                transactions.clone(),
                provider.clone(),
                budgets.clone(),
                notifications.clone(),
                rules.clone(),
                provider_timeout
            )
        );
        let scheduling = Arc::new(
            SchedulingService::new(db.clone(), schedules.clone(), logs.clone(), rules.clone())
        );
        let reconciliation = Arc::new(
            ReconciliationService::new(
                transactions.clone(),
                purchases.clone(),
                provider.clone(),
                notifications.clone(),
                Duration::from_secs(900),
                provider_timeout
            )
        );
        let wallet_service = Arc::new(WalletService::new(wallets.clone(), transactions.clone()));
        let scheduler = Arc::new(
            Scheduler::new(
                schedules.clone(),
                scheduling.clone(),
                purchases.clone(),
                logs.clone(),
                notifications.clone(),
                reconciliation.clone(),
                SchedulerSettings::default()
            )
        );

        Self {
            db,
            provider,
            wallets,
            transactions,
            schedules,
            logs,
            notifications,
            budgets,
            purchases,
            scheduling,
            reconciliation,
            wallet_service,
            scheduler,
        }
    }

    pub fn app(&self) -> Router {
        api::router(
            AppState::new(
                self.scheduling.clone(),
                self.purchases.clone(),
                self.wallet_service.clone(),
                self.budgets.clone(),
                self.scheduler.clone()
            )
        )
    }

    /// Make every `operation` (`INSERT`, `UPDATE`) on `table` fail from now on.
    pub async fn reject_writes(&self, table: &str, operation: &str) {
        let sql = format!(
            "CREATE TRIGGER reject_{table}_{op} BEFORE {operation} ON {table} BEGIN SELECT RAISE(ABORT, '{table} unavailable'); END;",
            op = operation.to_lowercase()
        );
        self.db.execute_unprepared(&sql).await.expect("Failed to install trigger");
    }

    pub async fn seed_wallet(&self, user_id: &str, balance: Decimal) {
        self.wallets.create(user_id, balance).await.expect("Failed to seed wallet");
    }

    pub async fn balance_of(&self, user_id: &str) -> Decimal {
        self.wallets.find_by_user(user_id).await.unwrap().expect("wallet exists").balance
    }

    pub async fn seed_beneficiary(
        &self,
        user_id: &str,
        label: &str,
        phone_number: &str,
        network: &str
    ) -> beneficiary::Model {
        let now = Utc::now();
        beneficiary::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            label: Set(label.to_string()),
            phone_number: Set(phone_number.to_string()),
            network: Set(network.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
            .insert(&self.db).await
            .expect("Failed to seed beneficiary")
    }
}
