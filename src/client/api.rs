use reqwest::StatusCode;
use tracing::debug;
use uuid::Uuid;

use super::cache::{CachedValue, QueryCache, QueryKey};
use super::feed::TransactionFeed;
use super::gateway::{classify, GatewayError, RequestGateway};
use super::mutations::OptimisticDelete;
use super::notify::Notice;
use crate::errors::FieldErrors;
use crate::models::{
    CreateTransaction, ErrorResponse, Page, TransactionQuery, TransactionRecord, TransactionSummary,
    UpdateTransaction,
};

pub const CREATED: &str = "Transaction created successfully!";
pub const UPDATED: &str = "Transaction updated successfully";

/// Transaction endpoints on top of the gateway, reading through the cache.
#[derive(Clone)]
pub struct TransactionsClient {
    gateway: RequestGateway,
    cache: QueryCache,
}

impl TransactionsClient {
    pub fn new(gateway: RequestGateway, cache: QueryCache) -> Self {
        Self { gateway, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn list_path(query: &TransactionQuery) -> String {
        format!("/transactions?{}", query.to_query_string())
    }

    fn item_path(id: Uuid) -> String {
        format!("/transactions/{}", id)
    }

    /// Rejects a form locally the same way the server would, with the same notices.
    fn reject_locally(&self, errors: FieldErrors) -> GatewayError {
        let body = ErrorResponse::with_fields(&errors);
        let (err, notices) = classify(StatusCode::BAD_REQUEST, Some(&body));
        for notice in notices {
            self.gateway.notifier().notify(notice);
        }
        err
    }

    fn invalidate_totals(&self) {
        self.cache.invalidate_lists();
        self.cache.invalidate(&QueryKey::Summary);
    }

    pub async fn list(&self, query: &TransactionQuery) -> Result<Page<TransactionRecord>, GatewayError> {
        if let Some(page) = self.cache.list(query) {
            debug!("List page {} served from cache", query.page);
            return Ok(page);
        }
        self.refetch_list(query).await
    }

    pub async fn refetch_list(
        &self,
        query: &TransactionQuery,
    ) -> Result<Page<TransactionRecord>, GatewayError> {
        let ticket = self
            .cache
            .begin_fetch(QueryKey::TransactionList(query.clone()));
        let page: Page<TransactionRecord> = self.gateway.get_page(&Self::list_path(query)).await?;
        if !self.cache.complete(ticket, CachedValue::List(page.clone())) {
            debug!("List page {} was superseded before it arrived", query.page);
        }
        Ok(page)
    }

    pub async fn summary(&self) -> Result<TransactionSummary, GatewayError> {
        if let Some(summary) = self.cache.summary() {
            return Ok(summary);
        }
        let ticket = self.cache.begin_fetch(QueryKey::Summary);
        let summary: TransactionSummary = self.gateway.get("/transactions/summary").await?;
        self.cache.complete(ticket, CachedValue::Summary(summary.clone()));
        Ok(summary)
    }

    pub async fn get(&self, id: Uuid) -> Result<TransactionRecord, GatewayError> {
        if let Some(record) = self.cache.transaction(id) {
            return Ok(record);
        }
        let ticket = self.cache.begin_fetch(QueryKey::Transaction(id));
        let record: TransactionRecord = self.gateway.get(&Self::item_path(id)).await?;
        self.cache
            .complete(ticket, CachedValue::Transaction(record.clone()));
        Ok(record)
    }

    pub async fn create(&self, form: &CreateTransaction) -> Result<TransactionRecord, GatewayError> {
        if let Err(errors) = form.validate() {
            return Err(self.reject_locally(errors));
        }
        let record: TransactionRecord = self.gateway.post("/transactions", form).await?;
        self.invalidate_totals();
        self.gateway.notifier().notify(Notice::success(CREATED));
        Ok(record)
    }

    pub async fn update(
        &self,
        id: Uuid,
        form: &UpdateTransaction,
    ) -> Result<TransactionRecord, GatewayError> {
        if let Err(errors) = form.validate() {
            return Err(self.reject_locally(errors));
        }
        let record: TransactionRecord = self.gateway.patch(&Self::item_path(id), form).await?;
        self.invalidate_totals();
        self.cache
            .set(QueryKey::Transaction(id), CachedValue::Transaction(record.clone()));
        self.gateway.notifier().notify(Notice::success(UPDATED));
        Ok(record)
    }

    /// Optimistic: the row leaves the cached lists and summary before the
    /// request is sent and comes back if the server refuses.
    pub async fn delete(&self, id: Uuid) -> Result<(), GatewayError> {
        let path = Self::item_path(id);
        OptimisticDelete::new(self.cache.clone(), id)
            .run(self.gateway.delete(&path), self.gateway.notifier().as_ref())
            .await
    }

    async fn fetch_into(
        &self,
        feed: &mut TransactionFeed,
        query: TransactionQuery,
    ) -> Result<(), GatewayError> {
        let page = self.refetch_list(&query).await?;
        feed.accept(&query, page);
        Ok(())
    }

    /// Fetches page 1 for the feed's filters, replacing what it shows.
    pub async fn load(&self, feed: &mut TransactionFeed) -> Result<(), GatewayError> {
        let query = feed.refresh();
        self.fetch_into(feed, query).await
    }

    /// Load-more. Returns `false` when the feed is already at its last page.
    /// On error the feed is untouched and the same page is tried next time.
    pub async fn load_more(&self, feed: &mut TransactionFeed) -> Result<bool, GatewayError> {
        let Some(query) = feed.next_page() else {
            return Ok(false);
        };
        self.fetch_into(feed, query).await?;
        Ok(true)
    }

    /// [`delete`](Self::delete) for a row the feed is showing. The row leaves
    /// the feed before the request is sent and is put back where it was if the
    /// server refuses.
    pub async fn delete_in(&self, feed: &mut TransactionFeed, id: Uuid) -> Result<(), GatewayError> {
        let before = feed.clone();
        if feed.remove(id).is_none() {
            debug!("Transaction {} is not in the feed", id);
        }
        let result = self.delete(id).await;
        if result.is_err() {
            *feed = before;
        }
        result
    }
}
