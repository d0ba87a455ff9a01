use serde::{Deserialize, Serialize};

use super::transaction::Category;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 30;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    UpdatedAt,
    CreatedAt,
    Amount,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::UpdatedAt => "updatedAt",
            SortField::CreatedAt => "createdAt",
            SortField::Amount => "amount",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::UpdatedAt => "updated_at",
            SortField::CreatedAt => "created_at",
            SortField::Amount => "amount",
        }
    }
}

/// Raw list query string. Everything arrives as text and is checked by the
/// pagination engine so that bad values come back as per-field messages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub order: Option<String>,
    pub sort_by: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
}

/// A normalized list request. Clients build one directly; the server derives
/// one from [`ListTransactionsParams`]. Also the client cache key for a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionQuery {
    pub page: u32,
    pub limit: u32,
    pub order: SortOrder,
    pub sort_by: SortField,
    pub search: String,
    pub category: Option<Category>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            order: SortOrder::default(),
            sort_by: SortField::default(),
            search: String::new(),
            category: None,
            year: None,
            month: None,
        }
    }
}

impl TransactionQuery {
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// Same filters ignoring the page number.
    pub fn same_filters(&self, other: &TransactionQuery) -> bool {
        self.with_page(DEFAULT_PAGE) == other.with_page(DEFAULT_PAGE)
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("order", self.order.as_str().to_string()),
            ("sortBy", self.sort_by.as_str().to_string()),
        ];
        if !self.search.is_empty() {
            pairs.push(("search", self.search.clone()));
        }
        if let Some(category) = self.category {
            pairs.push(("category", category.as_str().to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        if let Some(month) = self.month {
            pairs.push(("month", month.to_string()));
        }
        pairs
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_query_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }
}

/// Page envelope metadata, flattened next to `data` in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u64,
    pub has_more_pages: bool,
    pub has_previous_page: bool,
    #[serde(default)]
    pub next_page_url: Option<String>,
    #[serde(default)]
    pub previous_page_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
