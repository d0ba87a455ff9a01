use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{ApiResponse, UpsertUser, User};
use crate::services::user_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(get_me).put(put_me).delete(delete_me))
}

pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<User>>, AppError> {
    info!("GET /users/me - Fetching profile for {}", user.user_id);
    let profile = user_service::fetch_me(state.users.as_ref(), &user.user_id).await?;
    Ok(Json(ApiResponse::ok("User retrieved successfully", profile)))
}

pub async fn put_me(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<UpsertUser>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    info!("PUT /users/me - Saving profile for {}", user.user_id);
    let Json(data) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let profile = user_service::upsert_me(state.users.as_ref(), &user.user_id, data)
        .await
        .map_err(|e| {
            error!("Failed to save profile for {}: {}", user.user_id, e);
            e
        })?;
    Ok(Json(ApiResponse::ok("User saved successfully", profile)))
}

pub async fn delete_me(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode, AppError> {
    info!("DELETE /users/me - Deleting profile for {}", user.user_id);
    user_service::delete_me(state.users.as_ref(), &user.user_id)
        .await
        .map_err(|e| {
            error!("Failed to delete profile for {}: {}", user.user_id, e);
            e
        })?;
    Ok(StatusCode::NO_CONTENT)
}
