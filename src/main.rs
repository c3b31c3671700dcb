use std::sync::Arc;

use topup_engine::{ AppError, Config, Result };
use topup_engine::db::{ ExecutionLogRepository, ScheduleRepository, TransactionRepository, WalletRepository };
use topup_engine::providers::HttpVtuProvider;
use topup_engine::scheduler::Scheduler;
use topup_engine::services::{
    BudgetService,
    NotificationService,
    PurchaseService,
    ReconciliationService,
    SchedulingService,
    WalletService,
};
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "topup_engine=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| AppError::Config(e.to_string()))?;

    tracing::info!(
        "Starting top-up engine (schedule offset {}, batch size {})",
        config.rules.schedule_offset,
        config.scheduler.batch_size
    );

    let db = sea_orm::Database::connect(&config.database_url).await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations completed successfully");

    let provider = Arc::new(HttpVtuProvider::new(&config.vtu)?);

    // Repositories
    let wallets = Arc::new(WalletRepository::new(db.clone()));
    let transactions = Arc::new(TransactionRepository::new(db.clone()));
    let schedules = Arc::new(ScheduleRepository::new(db.clone()));
    let logs = Arc::new(ExecutionLogRepository::new(db.clone()));

    // Services
    let notification_service = Arc::new(NotificationService::new(db.clone()));
    let budget_service = Arc::new(
        BudgetService::new(db.clone(), notification_service.clone(), config.rules.schedule_offset)
    );
    let purchase_service = Arc::new(
        PurchaseService::new(
            wallets.clone(),
            transactions.clone(),
            provider.clone(),
            budget_service.clone(),
            notification_service.clone(),
            config.rules.clone(),
            config.vtu.timeout
        )
    );
    let scheduling_service = Arc::new(
        SchedulingService::new(db.clone(), schedules.clone(), logs.clone(), config.rules.clone())
    );
    let reconciliation_service = Arc::new(
        ReconciliationService::new(
            transactions.clone(),
            purchase_service.clone(),
            provider.clone(),
            notification_service.clone(),
            config.scheduler.pending_timeout,
            config.vtu.timeout
        )
    );
    let wallet_service = Arc::new(WalletService::new(wallets.clone(), transactions.clone()));

    let scheduler = Arc::new(
        Scheduler::new(
            schedules,
            scheduling_service.clone(),
            purchase_service.clone(),
            logs,
            notification_service,
            reconciliation_service,
            config.scheduler.clone()
        )
    );

    if config.scheduler.enabled {
        let background = scheduler.as_ref().clone();
        tokio::spawn(async move {
            background.start().await;
        });
    } else {
        tracing::info!("In-process scheduler disabled; use POST /internal/scheduled-topups/run");
    }

    let app_state = topup_engine::api::AppState::new(
        scheduling_service,
        purchase_service,
        wallet_service,
        budget_service,
        scheduler
    );

    let app = topup_engine::api
        ::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    axum::serve(listener, app).await.map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(())
}
