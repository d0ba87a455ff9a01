use axum::extract::{MatchedPath, Request};
use axum::Router;
use http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::routes::{health, transactions, users};
use crate::state::AppState;

pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    let prefix = state.api_prefix.trim_end_matches('/').to_string();
    let router = Router::<AppState>::new()
        .nest("/health", health::router())
        .nest(&format!("{}/transactions", prefix), transactions::router())
        .nest(&format!("{}/users", prefix), users::router())
        .with_state(state);

    add_tracing_layer(router).layer(cors_layer(cors_origins))
}

/// Any origin when the list is empty, otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Handlers log their own failures.
        .on_failure(());

    router.layer(tracing_layer)
}
