use axum::{ extract::State, Json };

use crate::db::entity::transaction;
use crate::enums::PurchaseType;
use crate::error::Result;
use crate::services::purchase_service::ManualPurchaseRequest;

use super::auth::AuthUser;
use super::AppState;

pub async fn buy_airtime(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<ManualPurchaseRequest>
) -> Result<Json<transaction::Model>> {
    let transaction = state.purchase_service.purchase(&user_id, PurchaseType::Airtime, request).await?;

    Ok(Json(transaction))
}

pub async fn buy_data(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<ManualPurchaseRequest>
) -> Result<Json<transaction::Model>> {
    let transaction = state.purchase_service.purchase(&user_id, PurchaseType::Data, request).await?;

    Ok(Json(transaction))
}
