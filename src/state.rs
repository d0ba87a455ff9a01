use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::JwtKeys;
use crate::store::{MemoryStore, PgStore, TransactionStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<dyn TransactionStore>,
    pub users: Arc<dyn UserStore>,
    pub jwt: Arc<JwtKeys>,
    /// Prefix the routes are mounted under, used for page links.
    pub api_prefix: String,
}

impl AppState {
    pub fn postgres(store: PgStore, jwt: Arc<JwtKeys>, api_prefix: &str) -> Self {
        let store = Arc::new(store);
        Self {
            transactions: store.clone(),
            users: store,
            jwt,
            api_prefix: api_prefix.to_string(),
        }
    }

    pub fn in_memory(jwt: Arc<JwtKeys>, api_prefix: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            transactions: store.clone(),
            users: store,
            jwt,
            api_prefix: api_prefix.to_string(),
        }
    }
}

impl FromRef<AppState> for Arc<JwtKeys> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
