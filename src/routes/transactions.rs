use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{
    ApiResponse, CreateTransaction, ListTransactionsParams, PaginatedResponse, TransactionRecord,
    TransactionSummary, UpdateTransaction,
};
use crate::services::transaction_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_transaction).get(list_transactions))
        .route("/summary", get(get_summary))
        .route(
            "/:id",
            get(get_transaction)
                .patch(update_transaction)
                .delete(delete_transaction),
        )
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn list_params(
    query: Result<Query<ListTransactionsParams>, QueryRejection>,
) -> Result<ListTransactionsParams, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn transaction_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::BadRequest("Validation failed (uuid is expected)".to_string()))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionRecord>>), AppError> {
    info!("POST /transactions - Creating transaction for {}", user.user_id);
    let data = json_body(payload)?;
    let record = transaction_service::create(state.transactions.as_ref(), &user.user_id, data)
        .await
        .map_err(|e| {
            error!("Failed to create transaction: {}", e);
            e
        })?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Transaction created successfully!", record)),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListTransactionsParams>, QueryRejection>,
) -> Result<Json<PaginatedResponse<TransactionRecord>>, AppError> {
    info!("GET /transactions - Listing transactions for {}", user.user_id);
    let params = list_params(query)?;
    let base_path = format!("{}/transactions", state.api_prefix);
    let page = transaction_service::list(state.transactions.as_ref(), &user.user_id, &params, &base_path)
        .await
        .map_err(|e| {
            error!("Failed to list transactions: {}", e);
            e
        })?;
    Ok(Json(PaginatedResponse::ok("Transactions retrieved successfully", page)))
}

pub async fn get_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<TransactionSummary>>, AppError> {
    info!("GET /transactions/summary - Summarizing for {}", user.user_id);
    let summary = transaction_service::summary(state.transactions.as_ref(), &user.user_id)
        .await
        .map_err(|e| {
            error!("Failed to build summary: {}", e);
            e
        })?;
    Ok(Json(ApiResponse::ok("Summary retrieved successfully", summary)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<TransactionRecord>>, AppError> {
    let id = transaction_id(path)?;
    info!("GET /transactions/{} - Fetching transaction", id);
    let record = transaction_service::fetch_one(state.transactions.as_ref(), id, &user.user_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch transaction {}: {}", id, e);
            e
        })?;
    Ok(Json(ApiResponse::ok("Transaction retrieved successfully", record)))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateTransaction>, JsonRejection>,
) -> Result<Json<ApiResponse<TransactionRecord>>, AppError> {
    let id = transaction_id(path)?;
    info!("PATCH /transactions/{} - Updating transaction", id);
    let data = json_body(payload)?;
    let record = transaction_service::update(state.transactions.as_ref(), id, &user.user_id, data)
        .await
        .map_err(|e| {
            error!("Failed to update transaction {}: {}", id, e);
            e
        })?;
    Ok(Json(ApiResponse::ok("Transaction updated successfully", record)))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = transaction_id(path)?;
    info!("DELETE /transactions/{} - Deleting transaction", id);
    match transaction_service::delete(state.transactions.as_ref(), id, &user.user_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            error!("Failed to delete transaction {}: {}", id, e);
            Err(e)
        }
    }
}
