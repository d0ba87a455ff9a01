use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    CreateTransaction, ListTransactionsParams, Page, Transaction, TransactionRecord,
    TransactionSummary, UpdateTransaction,
};
use crate::services::pagination::{self, ListFilter};
use crate::services::summary;
use crate::store::TransactionStore;

pub async fn create(
    store: &dyn TransactionStore,
    user_id: &str,
    input: CreateTransaction,
) -> Result<TransactionRecord, AppError> {
    let fields = input.validate()?;
    let transaction = store.insert(Transaction::new(user_id.to_string(), fields)).await?;
    debug!("Created transaction {} for {}", transaction.id, user_id);
    Ok(transaction.into())
}

pub async fn list(
    store: &dyn TransactionStore,
    user_id: &str,
    params: &ListTransactionsParams,
    base_path: &str,
) -> Result<Page<TransactionRecord>, AppError> {
    list_as_of(store, user_id, params, base_path, Utc::now().date_naive()).await
}

/// [`list`] with an explicit "today", which decides the default year of a month filter.
pub async fn list_as_of(
    store: &dyn TransactionStore,
    user_id: &str,
    params: &ListTransactionsParams,
    base_path: &str,
    today: NaiveDate,
) -> Result<Page<TransactionRecord>, AppError> {
    let filter = ListFilter::from_params(user_id, params, today)?;
    let (rows, total) = store.list(&filter).await?;
    let records = rows.into_iter().map(TransactionRecord::from).collect();
    Ok(pagination::paginate(&filter, records, total, base_path))
}

pub async fn summary(store: &dyn TransactionStore, user_id: &str) -> Result<TransactionSummary, AppError> {
    let rows = store.category_totals(user_id).await?;
    debug!(
        "Summarizing {} transactions for {}",
        summary::transaction_count(&rows),
        user_id
    );
    Ok(summary::summarize(&rows))
}

/// Existence is checked before ownership, so an unknown id is always a 404
/// whoever asks.
fn ensure_owner(found: Option<Transaction>, user_id: &str) -> Result<Transaction, AppError> {
    let transaction = found.ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;
    if transaction.user_id != user_id {
        warn!("User {} denied access to transaction {}", user_id, transaction.id);
        return Err(AppError::Forbidden(
            "You do not have permission to access this transaction".to_string(),
        ));
    }
    Ok(transaction)
}

pub async fn fetch_one(
    store: &dyn TransactionStore,
    id: Uuid,
    user_id: &str,
) -> Result<TransactionRecord, AppError> {
    let found = store.find(id).await?;
    Ok(ensure_owner(found, user_id)?.into())
}

pub async fn update(
    store: &dyn TransactionStore,
    id: Uuid,
    user_id: &str,
    input: UpdateTransaction,
) -> Result<TransactionRecord, AppError> {
    let changes = input.validate()?;
    match store.update_owned(id, user_id, &changes).await? {
        Some(updated) => Ok(updated.into()),
        // Nothing matched (id, owner): work out which of the two failed.
        None => {
            let found = store.find(id).await?;
            ensure_owner(found, user_id)?;
            Err(AppError::NotFound("Transaction not found".to_string()))
        }
    }
}

pub async fn delete(store: &dyn TransactionStore, id: Uuid, user_id: &str) -> Result<(), AppError> {
    if store.delete_owned(id, user_id).await? > 0 {
        return Ok(());
    }
    let found = store.find(id).await?;
    ensure_owner(found, user_id)?;
    Err(AppError::NotFound("Transaction not found".to_string()))
}
