use std::sync::Arc;

use axum::{ Router, routing::{ get, post } };

pub mod auth;
pub mod budget;
pub mod internal;
pub mod plans;
pub mod purchases;
pub mod schedules;
pub mod wallet;

use crate::scheduler::Scheduler;
use crate::services::{ BudgetService, PurchaseService, SchedulingService, WalletService };

#[derive(Clone)]
pub struct AppState {
    pub scheduling_service: Arc<SchedulingService>,
    pub purchase_service: Arc<PurchaseService>,
    pub wallet_service: Arc<WalletService>,
    pub budget_service: Arc<BudgetService>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(
        scheduling_service: Arc<SchedulingService>,
        purchase_service: Arc<PurchaseService>,
        wallet_service: Arc<WalletService>,
        budget_service: Arc<BudgetService>,
        scheduler: Arc<Scheduler>
    ) -> Self {
        Self {
            scheduling_service,
            purchase_service,
            wallet_service,
            budget_service,
            scheduler,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/scheduled-topups",
            post(schedules::create_schedule)
                .get(schedules::list_schedules)
                .put(schedules::update_schedule)
                .delete(schedules::cancel_schedule)
                .patch(schedules::change_schedule_state)
        )
        .route("/api/scheduled-topups/{id}", get(schedules::get_schedule))
        .route("/api/scheduled-topups/{id}/executions", get(schedules::list_executions))
        .route("/internal/scheduled-topups/run", post(internal::run_scheduled_topups))
        .route("/api/purchases/airtime", post(purchases::buy_airtime))
        .route("/api/purchases/data", post(purchases::buy_data))
        .route("/api/wallet", get(wallet::get_wallet))
        .route("/api/wallet/transactions", get(wallet::list_transactions))
        .route("/api/budget", get(budget::get_budget).put(budget::set_budget))
        .route("/api/data-plans", get(plans::list_data_plans))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
