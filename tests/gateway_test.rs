mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::Query;
use axum::routing::{delete, get};
use axum::{Json, Router};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use http::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

use finance_tracker::client::gateway::{GatewayError, NO_CONNECTION, SESSION_EXPIRED, TRY_AGAIN_LATER};
use finance_tracker::client::mutations::{DELETED, DELETE_FAILED};
use finance_tracker::client::notify::{NoticeLog, SignOutFlag, StaticToken};
use finance_tracker::client::{QueryCache, RequestGateway, TransactionFeed, TransactionsClient};
use finance_tracker::models::{
    Category, CreateTransaction, Page, PaginatedResponse, TransactionQuery, TransactionRecord,
    TransactionSummary, UpsertUser, User,
};
use finance_tracker::services::pagination::page_meta;

use common::{test_app, token_for};

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

struct Harness {
    gateway: RequestGateway,
    notices: Arc<NoticeLog>,
    session: Arc<SignOutFlag>,
}

fn harness(base_url: &str, token: Option<String>) -> Harness {
    let notices = Arc::new(NoticeLog::new());
    let session = Arc::new(SignOutFlag::new());
    let gateway = RequestGateway::new(
        base_url,
        Arc::new(StaticToken::new(token)),
        session.clone(),
        notices.clone(),
    );
    Harness {
        gateway,
        notices,
        session,
    }
}

fn dec(s: &str) -> BigDecimal {
    s.parse().unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ---------------------------------------------------------------------------
// Against the real router
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_client_round_trip_through_cache() {
    let base = serve(test_app()).await;
    let h = harness(&base, Some(token_for("carol")));

    let profile = UpsertUser {
        firstname: Some("Carol".into()),
        lastname: Some("Danvers".into()),
        email: Some("carol@example.com".into()),
    };
    let user: User = h.gateway.put("/users/me", &profile).await.unwrap();
    assert_eq!(user.id, "carol");

    let client = TransactionsClient::new(h.gateway.clone(), QueryCache::new());
    let salary = client
        .create(&CreateTransaction::from_parts(&dec("1200.50"), "Salary", Category::Income, date(2024, 1, 5)))
        .await
        .unwrap();
    client
        .create(&CreateTransaction::from_parts(&dec("10"), "Coffee", Category::Expense, date(2024, 1, 6)))
        .await
        .unwrap();

    let summary = client.summary().await.unwrap();
    assert_eq!(summary.total_income, dec("1200.50"));
    assert_eq!(summary.balance, dec("1190.50"));

    let mut feed = TransactionFeed::new(TransactionQuery {
        limit: 1,
        ..TransactionQuery::default()
    });
    client.load(&mut feed).await.unwrap();
    assert!(client.load_more(&mut feed).await.unwrap());
    assert!(!client.load_more(&mut feed).await.unwrap());
    assert_eq!(feed.items().len(), 2);

    client.delete_in(&mut feed, salary.id).await.unwrap();
    assert!(feed.items().iter().all(|t| t.id != salary.id));
    assert_eq!(feed.items().len(), 1);
    assert!(client.cache().summary().is_none());
    let summary = client.summary().await.unwrap();
    assert_eq!(summary.balance, dec("-10"));

    let texts: Vec<String> = h.notices.notices().into_iter().map(|n| n.text).collect();
    assert!(texts.contains(&DELETED.to_string()));
}

#[tokio::test]
async fn test_unauthorized_signs_out() {
    let base = serve(test_app()).await;
    let h = harness(&base, None);

    let result: Result<TransactionSummary, _> = h.gateway.get("/transactions/summary").await;
    assert!(matches!(result, Err(GatewayError::Unauthorized)));
    assert_eq!(h.session.signed_out(), 1);
    assert_eq!(h.notices.notices()[0].text, SESSION_EXPIRED);
}

#[tokio::test]
async fn test_server_validation_gives_one_notice_per_field() {
    let base = serve(test_app()).await;
    let h = harness(&base, Some(token_for("dave")));

    let result: Result<TransactionRecord, _> = h
        .gateway
        .post(
            "/transactions",
            &json!({"amount": 0, "description": "x", "category": "bonus", "transactionDate": "2024-01-01"}),
        )
        .await;
    match result {
        Err(GatewayError::Validation { fields, .. }) => {
            assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["amount", "category"]);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(h.notices.notices().len(), 2);
    assert_eq!(h.session.signed_out(), 0);
}

#[tokio::test]
async fn test_local_validation_never_reaches_server() {
    let h = harness("http://127.0.0.1:9/api", Some("unused".into()));
    let client = TransactionsClient::new(h.gateway.clone(), QueryCache::new());

    let form = CreateTransaction {
        amount: Some(json!(12.345)),
        ..CreateTransaction::default()
    };
    let result = client.create(&form).await;
    assert!(matches!(result, Err(GatewayError::Validation { .. })));
    assert!(!h
        .notices
        .notices()
        .iter()
        .any(|n| n.text == NO_CONNECTION));
}

#[tokio::test]
async fn test_unreachable_server_is_no_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let h = harness(&format!("http://{}/api", addr), Some("t".into()));
    let result: Result<TransactionSummary, _> = h.gateway.get("/transactions/summary").await;
    assert!(matches!(result, Err(GatewayError::Network(_))));
    assert_eq!(h.notices.notices()[0].text, NO_CONNECTION);
}

// ---------------------------------------------------------------------------
// Against a server that refuses deletes
// ---------------------------------------------------------------------------

fn record(amount: &str, category: Category) -> TransactionRecord {
    let now = Utc::now();
    TransactionRecord {
        id: Uuid::new_v4(),
        amount: dec(amount),
        description: "Refund".into(),
        category,
        transaction_date: date(2024, 7, 1),
        created_at: now,
        updated_at: now,
    }
}

fn failing_delete_server(target: TransactionRecord) -> Router {
    let list = PaginatedResponse::ok(
        "Transactions retrieved successfully",
        Page {
            data: vec![target],
            meta: page_meta(1, 30, 1),
        },
    );
    let list = serde_json::to_value(list).unwrap();
    let summary = json!({
        "success": true,
        "message": "Summary retrieved successfully",
        "data": {"totalIncome": 100, "totalExpense": 30, "balance": 70}
    });

    Router::new()
        .route("/api/transactions", get(move || async move { Json(list) }))
        .route("/api/transactions/summary", get(move || async move { Json(summary) }))
        .route(
            "/api/transactions/:id",
            delete(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"success": false, "message": "Internal server error"})),
                )
            }),
        )
}

#[tokio::test]
async fn test_failed_delete_rolls_cache_back() {
    let target = record("50", Category::Income);
    let base = serve(failing_delete_server(target.clone())).await;
    let h = harness(&base, Some("t".into()));
    let client = TransactionsClient::new(h.gateway.clone(), QueryCache::new());

    let page = client.list(&TransactionQuery::default()).await.unwrap();
    assert_eq!(page.data.len(), 1);
    client.summary().await.unwrap();
    let before = client.cache().snapshot(|_| true);
    assert_eq!(before.len(), 2);

    let result = client.delete(target.id).await;
    assert!(matches!(result, Err(GatewayError::Server(500))));
    assert_eq!(client.cache().snapshot(|_| true), before);

    let texts: Vec<String> = h.notices.notices().into_iter().map(|n| n.text).collect();
    assert_eq!(texts, vec![TRY_AGAIN_LATER.to_string(), DELETE_FAILED.to_string()]);
}

#[tokio::test]
async fn test_failed_delete_puts_row_back_in_feed() {
    let target = record("50", Category::Income);
    let base = serve(failing_delete_server(target.clone())).await;
    let h = harness(&base, Some("t".into()));
    let client = TransactionsClient::new(h.gateway.clone(), QueryCache::new());

    let mut feed = TransactionFeed::new(TransactionQuery::default());
    client.load(&mut feed).await.unwrap();
    assert_eq!(feed.items(), &[target.clone()]);

    let result = client.delete_in(&mut feed, target.id).await;
    assert!(matches!(result, Err(GatewayError::Server(500))));
    assert_eq!(feed.items(), &[target]);
    assert_eq!(feed.meta().map(|m| m.total), Some(1));
}

// ---------------------------------------------------------------------------
// Against a server that drops one load-more request
// ---------------------------------------------------------------------------

fn named(description: &str) -> TransactionRecord {
    TransactionRecord {
        description: description.into(),
        ..record("1", Category::Expense)
    }
}

/// One row per page. The first request for page 2 gets a 503.
fn flaky_list_server(rows: Vec<TransactionRecord>) -> Router {
    let failures_left = Arc::new(AtomicUsize::new(1));
    Router::new().route(
        "/api/transactions",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let rows = rows.clone();
            let failures_left = failures_left.clone();
            async move {
                let page: u32 = params
                    .get("page")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(1);
                let dropped = page == 2
                    && failures_left
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok();
                if dropped {
                    return (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({"success": false, "message": "Service unavailable"})),
                    );
                }
                let body = PaginatedResponse::ok(
                    "Transactions retrieved successfully",
                    Page {
                        data: vec![rows[(page - 1) as usize].clone()],
                        meta: page_meta(page, 1, rows.len() as u64),
                    },
                );
                (StatusCode::OK, Json(serde_json::to_value(body).unwrap()))
            }
        }),
    )
}

#[tokio::test]
async fn test_failed_load_more_retries_same_page() {
    let rows = vec![named("row1"), named("row2"), named("row3")];
    let base = serve(flaky_list_server(rows)).await;
    let h = harness(&base, Some("t".into()));
    let client = TransactionsClient::new(h.gateway.clone(), QueryCache::new());

    let mut feed = TransactionFeed::new(TransactionQuery {
        limit: 1,
        ..TransactionQuery::default()
    });
    client.load(&mut feed).await.unwrap();

    let failed = client.load_more(&mut feed).await;
    assert!(matches!(failed, Err(GatewayError::Api { status: 503, .. })));
    assert_eq!(feed.query().page, 1);
    assert_eq!(feed.items().len(), 1);
    assert!(feed.has_more());
    assert_eq!(h.notices.notices()[0].text, "Service unavailable");

    assert!(client.load_more(&mut feed).await.unwrap());
    assert!(client.load_more(&mut feed).await.unwrap());
    assert!(!client.load_more(&mut feed).await.unwrap());

    let descriptions: Vec<&str> = feed.items().iter().map(|t| t.description.as_str()).collect();
    assert_eq!(descriptions, vec!["row1", "row2", "row3"]);
}
