use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CategoryTotal, Transaction, TransactionChanges, User, UserProfile};
use crate::services::pagination::ListFilter;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// System of record for transactions.
///
/// `update_owned` and `delete_owned` are single conditional writes on
/// `(id, owner)`, so no other request can slip in between an ownership check
/// and the write.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, transaction: Transaction) -> Result<Transaction, AppError>;

    async fn find(&self, id: Uuid) -> Result<Option<Transaction>, AppError>;

    /// One page of rows plus the total number of matching rows.
    async fn list(&self, filter: &ListFilter) -> Result<(Vec<Transaction>, u64), AppError>;

    async fn category_totals(&self, user_id: &str) -> Result<Vec<CategoryTotal>, AppError>;

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: &str,
        changes: &TransactionChanges,
    ) -> Result<Option<Transaction>, AppError>;

    async fn delete_owned(&self, id: Uuid, user_id: &str) -> Result<u64, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn upsert_user(&self, id: &str, profile: &UserProfile) -> Result<User, AppError>;

    /// Deletes the user and every transaction they own.
    async fn delete_user(&self, id: &str) -> Result<u64, AppError>;
}
