use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bigdecimal::BigDecimal;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{Category, Page, TransactionQuery, TransactionRecord, TransactionSummary};
use crate::services::pagination::page_meta;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// One page of the list for one set of filters.
    TransactionList(TransactionQuery),
    Summary,
    Transaction(Uuid),
}

impl QueryKey {
    pub fn is_list(&self) -> bool {
        matches!(self, QueryKey::TransactionList(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    List(Page<TransactionRecord>),
    Summary(TransactionSummary),
    Transaction(TransactionRecord),
}

/// Copy of some cache entries, put back verbatim by [`QueryCache::restore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    entries: HashMap<QueryKey, CachedValue>,
}

impl CacheSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handed out when a fetch starts. The result is only stored if nothing
/// newer happened to the key in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

#[derive(Default)]
struct Inner {
    entries: DashMap<QueryKey, CachedValue>,
    generations: DashMap<QueryKey, u64>,
    counter: AtomicU64,
}

/// Keyed client-side cache of server reads.
///
/// Every write, invalidation or cancellation moves the key to a new
/// generation, so a fetch that started earlier can no longer land.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, key: &QueryKey) -> u64 {
        let generation = self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.generations.insert(key.clone(), generation);
        generation
    }

    fn keys_where<F: Fn(&QueryKey) -> bool>(&self, pred: F) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.inner.generations.iter().map(|entry| entry.key().clone()))
            .filter(|key| pred(key))
            .collect();
        keys.sort_by_key(|key| format!("{:?}", key));
        keys.dedup();
        keys
    }

    pub fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.inner.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn list(&self, query: &TransactionQuery) -> Option<Page<TransactionRecord>> {
        match self.get(&QueryKey::TransactionList(query.clone())) {
            Some(CachedValue::List(page)) => Some(page),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<TransactionSummary> {
        match self.get(&QueryKey::Summary) {
            Some(CachedValue::Summary(summary)) => Some(summary),
            _ => None,
        }
    }

    pub fn transaction(&self, id: Uuid) -> Option<TransactionRecord> {
        match self.get(&QueryKey::Transaction(id)) {
            Some(CachedValue::Transaction(record)) => Some(record),
            _ => None,
        }
    }

    pub fn set(&self, key: QueryKey, value: CachedValue) {
        self.bump(&key);
        self.inner.entries.insert(key, value);
    }

    pub fn begin_fetch(&self, key: QueryKey) -> FetchTicket {
        let generation = self.bump(&key);
        FetchTicket { key, generation }
    }

    /// Stores a fetch result. Returns `false` and drops the value when the
    /// fetch was superseded, cancelled or invalidated.
    pub fn complete(&self, ticket: FetchTicket, value: CachedValue) -> bool {
        let Some(current) = self.inner.generations.get(&ticket.key) else {
            return false;
        };
        if *current != ticket.generation {
            return false;
        }
        self.inner.entries.insert(ticket.key.clone(), value);
        true
    }

    pub fn cancel(&self, key: &QueryKey) {
        self.bump(key);
    }

    pub fn cancel_where<F: Fn(&QueryKey) -> bool>(&self, pred: F) {
        for key in self.keys_where(pred) {
            self.bump(&key);
        }
    }

    /// Drops the entry so the next read refetches.
    pub fn invalidate(&self, key: &QueryKey) {
        self.bump(key);
        self.inner.entries.remove(key);
    }

    pub fn invalidate_where<F: Fn(&QueryKey) -> bool>(&self, pred: F) {
        for key in self.keys_where(pred) {
            self.invalidate(&key);
        }
    }

    pub fn invalidate_lists(&self) {
        self.invalidate_where(QueryKey::is_list);
    }

    pub fn snapshot<F: Fn(&QueryKey) -> bool>(&self, pred: F) -> CacheSnapshot {
        let entries = self
            .inner
            .entries
            .iter()
            .filter(|entry| pred(entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        CacheSnapshot { entries }
    }

    pub fn restore(&self, snapshot: CacheSnapshot) {
        for (key, value) in snapshot.entries {
            self.set(key, value);
        }
    }

    /// Takes the row out of every cached list page, keeping each page's
    /// counters in step. Returns the removed row if any page held it.
    pub fn remove_from_lists(&self, id: Uuid) -> Option<TransactionRecord> {
        let mut removed = None;
        for mut entry in self.inner.entries.iter_mut() {
            let CachedValue::List(page) = entry.value_mut() else {
                continue;
            };
            let Some(position) = page.data.iter().position(|t| t.id == id) else {
                continue;
            };
            let record = page.data.remove(position);
            let meta = page_meta(
                page.meta.current_page,
                page.meta.per_page,
                page.meta.total.saturating_sub(1),
            );
            page.meta.total = meta.total;
            page.meta.last_page = meta.last_page;
            page.meta.has_more_pages = meta.has_more_pages;
            if !meta.has_more_pages {
                page.meta.next_page_url = None;
            }
            removed.get_or_insert(record);
        }
        removed
    }

    /// Takes `amount` back out of the cached summary as if a transaction of
    /// `category` had never existed.
    pub fn adjust_summary(&self, category: Category, amount: &BigDecimal) -> bool {
        let Some(mut entry) = self.inner.entries.get_mut(&QueryKey::Summary) else {
            return false;
        };
        let CachedValue::Summary(summary) = entry.value_mut() else {
            return false;
        };
        match category {
            Category::Income => {
                summary.total_income = &summary.total_income - amount;
                summary.balance = &summary.balance - amount;
            }
            Category::Expense => {
                summary.total_expense = &summary.total_expense - amount;
                summary.balance = &summary.balance + amount;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn record(amount: &str, category: Category) -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord {
            id: Uuid::new_v4(),
            amount: dec(amount),
            description: "item".into(),
            category,
            transaction_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    fn page_of(records: Vec<TransactionRecord>, total: u64) -> Page<TransactionRecord> {
        Page {
            meta: page_meta(1, 2, total),
            data: records,
        }
    }

    fn summary(income: &str, expense: &str, balance: &str) -> TransactionSummary {
        TransactionSummary {
            total_income: dec(income),
            total_expense: dec(expense),
            balance: dec(balance),
        }
    }

    #[test]
    fn test_superseded_fetch_is_dropped() {
        let cache = QueryCache::new();
        let key = QueryKey::Summary;
        let first = cache.begin_fetch(key.clone());
        let second = cache.begin_fetch(key.clone());

        assert!(cache.complete(second, CachedValue::Summary(summary("2", "0", "2"))));
        assert!(!cache.complete(first, CachedValue::Summary(summary("1", "0", "1"))));
        assert_eq!(cache.summary().unwrap().total_income, dec("2"));
    }

    #[test]
    fn test_cancelled_or_invalidated_fetch_is_dropped() {
        let cache = QueryCache::new();
        let ticket = cache.begin_fetch(QueryKey::Summary);
        cache.cancel(&QueryKey::Summary);
        assert!(!cache.complete(ticket, CachedValue::Summary(summary("1", "0", "1"))));

        let query = TransactionQuery::default();
        let key = QueryKey::TransactionList(query.clone());
        let ticket = cache.begin_fetch(key);
        cache.invalidate_lists();
        assert!(!cache.complete(ticket, CachedValue::List(page_of(vec![], 0))));
        assert!(cache.list(&query).is_none());
    }

    #[test]
    fn test_remove_from_lists_updates_counters() {
        let cache = QueryCache::new();
        let a = record("5", Category::Expense);
        let b = record("6", Category::Expense);
        let query = TransactionQuery::default();
        cache.set(
            QueryKey::TransactionList(query.clone()),
            CachedValue::List(page_of(vec![a.clone(), b.clone()], 3)),
        );

        let removed = cache.remove_from_lists(a.id).unwrap();
        assert_eq!(removed.id, a.id);

        let page = cache.list(&query).unwrap();
        assert_eq!(page.data, vec![b]);
        assert_eq!(page.meta.total, 2);
        assert_eq!(page.meta.last_page, 1);
        assert!(!page.meta.has_more_pages);
        assert!(cache.remove_from_lists(a.id).is_none());
    }

    #[test]
    fn test_adjust_summary_moves_balance_opposite_to_category() {
        let cache = QueryCache::new();
        cache.set(QueryKey::Summary, CachedValue::Summary(summary("100", "30", "70")));

        assert!(cache.adjust_summary(Category::Expense, &dec("10")));
        assert_eq!(cache.summary().unwrap(), summary("100", "20", "80"));

        assert!(cache.adjust_summary(Category::Income, &dec("25.50")));
        assert_eq!(cache.summary().unwrap(), summary("74.50", "20", "54.50"));
    }

    #[test]
    fn test_restore_puts_back_snapshot() {
        let cache = QueryCache::new();
        let t = record("50", Category::Income);
        let query = TransactionQuery::default();
        cache.set(
            QueryKey::TransactionList(query.clone()),
            CachedValue::List(page_of(vec![t.clone()], 1)),
        );
        cache.set(QueryKey::Summary, CachedValue::Summary(summary("100", "30", "70")));

        let before = cache.snapshot(|_| true);
        cache.remove_from_lists(t.id);
        cache.adjust_summary(Category::Income, &dec("50"));
        assert_ne!(cache.snapshot(|_| true), before);

        cache.restore(before.clone());
        assert_eq!(cache.snapshot(|_| true), before);
    }
}
