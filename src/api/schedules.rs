use axum::{ extract::{ Path, Query, State }, http::StatusCode, Json };
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::entity::{ execution_log, scheduled_topup };
use crate::enums::ScheduleStatus;
use crate::error::{ AppError, Result };
use crate::services::scheduling_service::{ CreateScheduleRequest, UpdateScheduleRequest };

use super::auth::AuthUser;
use super::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct IdQuery {
    pub id: Uuid,
}

#[derive(Deserialize)]
pub struct StateChangeQuery {
    pub id: Uuid,
    pub action: String,
}

pub async fn create_schedule(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<CreateScheduleRequest>
) -> Result<(StatusCode, Json<scheduled_topup::Model>)> {
    let schedule = state.scheduling_service.create(&user_id, request, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn list_schedules(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>
) -> Result<Json<Vec<scheduled_topup::Model>>> {
    let status = match query.status.as_deref() {
        Some(raw) =>
            Some(
                raw
                    .parse::<ScheduleStatus>()
                    .map_err(|_| AppError::validation("status", format!("Unknown status: {}", raw)))?
            ),
        None => None,
    };

    let schedules = state.scheduling_service.list(&user_id, status).await?;

    Ok(Json(schedules))
}

pub async fn get_schedule(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<Json<scheduled_topup::Model>> {
    let schedule = state.scheduling_service.get(&user_id, id).await?;

    Ok(Json(schedule))
}

pub async fn list_executions(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>
) -> Result<Json<Vec<execution_log::Model>>> {
    let logs = state.scheduling_service.executions(&user_id, id).await?;

    Ok(Json(logs))
}

pub async fn update_schedule(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
    Json(request): Json<UpdateScheduleRequest>
) -> Result<Json<scheduled_topup::Model>> {
    let schedule = state.scheduling_service.update(&user_id, query.id, request, Utc::now()).await?;

    Ok(Json(schedule))
}

pub async fn cancel_schedule(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<IdQuery>
) -> Result<Json<scheduled_topup::Model>> {
    let schedule = state.scheduling_service.cancel(&user_id, query.id, Utc::now()).await?;

    Ok(Json(schedule))
}

/// `?action=pause|resume`
pub async fn change_schedule_state(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<StateChangeQuery>
) -> Result<Json<scheduled_topup::Model>> {
    let now = Utc::now();
    let schedule = match query.action.to_lowercase().as_str() {
        "pause" => state.scheduling_service.pause(&user_id, query.id, now).await?,
        "resume" => state.scheduling_service.resume(&user_id, query.id, now).await?,
        other => {
            return Err(
                AppError::validation("action", format!("Unknown action: {}. Use pause or resume", other))
            );
        }
    };

    Ok(Json(schedule))
}
