use axum::{ extract::State, Json };
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{ Deserialize, Serialize };

use crate::db::entity::spending_event;
use crate::error::Result;
use crate::services::budget_service::BudgetSummary;

use super::auth::AuthUser;
use super::AppState;

#[derive(Deserialize)]
pub struct SetBudgetRequest {
    pub budget_amount: Decimal,
}

#[derive(Serialize)]
pub struct BudgetResponse {
    pub month_year: String,
    pub budget: Option<BudgetSummary>,
    pub spending: Vec<spending_event::Model>,
}

pub async fn get_budget(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>
) -> Result<Json<BudgetResponse>> {
    let now = Utc::now();
    let month_year = state.budget_service.month_key(now);
    let budget = state.budget_service.get_summary(&user_id, now).await?;
    let spending = state.budget_service.list_spending(&user_id, &month_year).await?;

    Ok(Json(BudgetResponse { month_year, budget, spending }))
}

pub async fn set_budget(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<SetBudgetRequest>
) -> Result<Json<BudgetSummary>> {
    let summary = state.budget_service.set_budget(&user_id, request.budget_amount, Utc::now()).await?;

    Ok(Json(summary))
}
