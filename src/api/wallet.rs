use axum::{ extract::{ Query, State }, Json };
use serde::Deserialize;

use crate::db::entity::transaction;
use crate::error::Result;
use crate::services::wallet_service::WalletView;

use super::auth::AuthUser;
use super::AppState;

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

pub async fn get_wallet(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>
) -> Result<Json<WalletView>> {
    let wallet = state.wallet_service.get_wallet(&user_id).await?;

    Ok(Json(wallet))
}

pub async fn list_transactions(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>
) -> Result<Json<Vec<transaction::Model>>> {
    let transactions = state.wallet_service.list_transactions(&user_id, page.limit, page.offset).await?;

    Ok(Json(transactions))
}
