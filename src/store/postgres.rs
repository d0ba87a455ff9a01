use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{TransactionStore, UserStore};
use crate::db::{transaction_queries, user_queries};
use crate::errors::AppError;
use crate::models::{CategoryTotal, Transaction, TransactionChanges, User, UserProfile};
use crate::services::pagination::ListFilter;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the pool and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(AppError::Db)?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn insert(&self, transaction: Transaction) -> Result<Transaction, AppError> {
        Ok(transaction_queries::insert(&self.pool, &transaction).await?)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        transaction_queries::fetch_one(&self.pool, id)
            .await
            .map_err(AppError::Db)
    }

    async fn list(&self, filter: &ListFilter) -> Result<(Vec<Transaction>, u64), AppError> {
        let rows = transaction_queries::fetch_page(&self.pool, filter)
            .await
            .map_err(AppError::Db)?;
        let total = transaction_queries::count(&self.pool, filter)
            .await
            .map_err(AppError::Db)?;
        Ok((rows, total.max(0) as u64))
    }

    async fn category_totals(&self, user_id: &str) -> Result<Vec<CategoryTotal>, AppError> {
        transaction_queries::category_totals(&self.pool, user_id)
            .await
            .map_err(AppError::Db)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: &str,
        changes: &TransactionChanges,
    ) -> Result<Option<Transaction>, AppError> {
        transaction_queries::update_owned(&self.pool, id, user_id, changes)
            .await
            .map_err(AppError::Db)
    }

    async fn delete_owned(&self, id: Uuid, user_id: &str) -> Result<u64, AppError> {
        transaction_queries::delete_owned(&self.pool, id, user_id)
            .await
            .map_err(AppError::Db)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        user_queries::fetch_one(&self.pool, id)
            .await
            .map_err(AppError::Db)
    }

    async fn upsert_user(&self, id: &str, profile: &UserProfile) -> Result<User, AppError> {
        user_queries::upsert(&self.pool, id, profile)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict("Email is already in use".to_string()),
                other => other,
            })
    }

    async fn delete_user(&self, id: &str) -> Result<u64, AppError> {
        user_queries::delete(&self.pool, id)
            .await
            .map_err(AppError::Db)
    }
}
