use std::collections::HashSet;

use uuid::Uuid;

use crate::models::pagination::DEFAULT_PAGE;
use crate::models::{Category, Page, PageMeta, SortOrder, TransactionQuery, TransactionRecord};

/// The scrolling transaction list: pages accumulate until a filter changes.
#[derive(Debug, Clone, Default)]
pub struct TransactionFeed {
    query: TransactionQuery,
    items: Vec<TransactionRecord>,
    meta: Option<PageMeta>,
}

impl TransactionFeed {
    pub fn new(query: TransactionQuery) -> Self {
        Self {
            query: query.with_page(DEFAULT_PAGE),
            items: Vec::new(),
            meta: None,
        }
    }

    /// The current filters, with the page number of the last page taken in.
    pub fn query(&self) -> &TransactionQuery {
        &self.query
    }

    pub fn items(&self) -> &[TransactionRecord] {
        &self.items
    }

    pub fn meta(&self) -> Option<&PageMeta> {
        self.meta.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.meta.as_ref().map_or(false, |m| m.has_more_pages)
    }

    /// Switches filters. Anything but the page number changing starts over
    /// from page 1 with an empty list. Returns whether it did.
    pub fn set_filters(&mut self, query: TransactionQuery) -> bool {
        if query.same_filters(&self.query) {
            return false;
        }
        self.query = query.with_page(DEFAULT_PAGE);
        self.items.clear();
        self.meta = None;
        true
    }

    pub fn search(&mut self, keyword: &str) -> bool {
        let query = TransactionQuery {
            search: keyword.trim().to_string(),
            ..self.query.clone()
        };
        self.set_filters(query)
    }

    pub fn set_order(&mut self, order: SortOrder) -> bool {
        let query = TransactionQuery {
            order,
            ..self.query.clone()
        };
        self.set_filters(query)
    }

    pub fn set_category(&mut self, category: Option<Category>) -> bool {
        let query = TransactionQuery {
            category,
            ..self.query.clone()
        };
        self.set_filters(query)
    }

    pub fn set_period(&mut self, year: Option<i32>, month: Option<u32>) -> bool {
        let query = TransactionQuery {
            year,
            month,
            ..self.query.clone()
        };
        self.set_filters(query)
    }

    /// Takes in a fetched page. Page 1 replaces the list, later pages append
    /// rows not already shown. Pages fetched for other filters are ignored.
    pub fn accept(&mut self, fetched_for: &TransactionQuery, page: Page<TransactionRecord>) -> bool {
        if !fetched_for.same_filters(&self.query) {
            return false;
        }
        if page.meta.current_page <= DEFAULT_PAGE {
            self.items = page.data;
        } else {
            let seen: HashSet<Uuid> = self.items.iter().map(|t| t.id).collect();
            self.items
                .extend(page.data.into_iter().filter(|t| !seen.contains(&t.id)));
        }
        self.query.page = page.meta.current_page;
        self.meta = Some(page.meta);
        true
    }

    /// The query for load-more, if the server has another page. The feed only
    /// moves to that page once [`accept`](Self::accept) takes it in, so a
    /// failed fetch asks for the same page again.
    pub fn next_page(&self) -> Option<TransactionQuery> {
        if !self.has_more() {
            return None;
        }
        Some(self.query.with_page(self.query.page + 1))
    }

    /// Pull-to-refresh: page 1 with the current filters.
    pub fn refresh(&self) -> TransactionQuery {
        self.query.with_page(DEFAULT_PAGE)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<TransactionRecord> {
        let position = self.items.iter().position(|t| t.id == id)?;
        Some(self.items.remove(position))
    }
}
