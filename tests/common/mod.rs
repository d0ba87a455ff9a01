#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use finance_tracker::app::create_app;
use finance_tracker::auth::{issue_token, JwtKeys};
use finance_tracker::state::AppState;

pub const SECRET: &str = "integration-test-secret";

/// Router over a fresh in-memory store.
pub fn test_app() -> Router {
    let state = AppState::in_memory(JwtKeys::from_secret(SECRET), "/api");
    create_app(state, &[])
}

pub fn token_for(user_id: &str) -> String {
    let keys: Arc<JwtKeys> = JwtKeys::from_secret(SECRET);
    issue_token(user_id, chrono::Duration::hours(1), &keys).unwrap()
}

/// Sends one request and returns the status with the JSON body (`Null` when empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

pub async fn create_profile(app: &Router, user_id: &str) {
    let (status, _) = send(
        app,
        Method::PUT,
        "/api/users/me",
        Some(&token_for(user_id)),
        Some(json!({
            "firstname": "Test",
            "lastname": user_id,
            "email": format!("{}@example.com", user_id)
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

pub fn transaction_body(amount: f64, description: &str, category: &str, date: &str) -> Value {
    json!({
        "amount": amount,
        "description": description,
        "category": category,
        "transactionDate": date
    })
}

/// Creates a transaction and returns its id.
pub async fn create_transaction(app: &Router, user_id: &str, body: Value) -> String {
    let (status, value) = send(
        app,
        Method::POST,
        "/api/transactions",
        Some(&token_for(user_id)),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", value);
    value["data"]["id"].as_str().unwrap().to_string()
}
