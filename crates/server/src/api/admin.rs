//! Back-office endpoints for immigration officers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use evisa_core::domain::application::{Application, ApplicationId};
use evisa_core::domain::user::AdminUser;
use serde::{Deserialize, Serialize};

use super::{json_body, new_correlation_id, ApiError, AppState, OrApiError};
use crate::workflow::{ApplicationDetail, DashboardStats, StatusChange, StatusChangeOutcome};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: AdminUser,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let request = json_body(payload, &correlation_id)?;
    match state.workflow.login(&request.username, &request.password).await.or_api(&correlation_id)? {
        Some(user) => Ok(Json(LoginResponse { success: true, user })),
        None => Err(ApiError::unauthorized(&correlation_id)),
    }
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let correlation_id = new_correlation_id();
    Ok(Json(state.workflow.stats().await.or_api(&correlation_id)?))
}

pub async fn list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let correlation_id = new_correlation_id();
    Ok(Json(state.workflow.list_applications().await.or_api(&correlation_id)?))
}

pub async fn application_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApplicationDetail>, ApiError> {
    let correlation_id = new_correlation_id();
    let detail =
        state.workflow.application_detail(&ApplicationId(id)).await.or_api(&correlation_id)?;
    Ok(Json(detail))
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Json<StatusChangeOutcome>, ApiError> {
    let correlation_id = new_correlation_id();
    let change = json_body(payload, &correlation_id)?;
    let outcome = state
        .workflow
        .change_status(&ApplicationId(id), change)
        .await
        .or_api(&correlation_id)?;
    Ok(Json(outcome))
}
