use std::cmp::Ordering;

use chrono::{Datelike, NaiveDate};

use crate::errors::FieldErrors;
use crate::models::pagination::{DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT};
use crate::models::{
    Category, ListTransactionsParams, Page, PageMeta, SortField, SortOrder, Transaction,
    TransactionQuery,
};

/// Inclusive calendar date bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Date bounds for a year and/or month filter.
///
/// A missing year means the year of `today`; a missing month spans the whole year.
/// Returns `None` when neither is given.
pub fn period_range(year: Option<i32>, month: Option<u32>, today: NaiveDate) -> Option<DateRange> {
    if year.is_none() && month.is_none() {
        return None;
    }
    let year = year.unwrap_or_else(|| today.year());
    let (first_month, last_month) = match month {
        Some(m) => (m, m),
        None => (1, 12),
    };
    let start = NaiveDate::from_ymd_opt(year, first_month, 1)?;
    let end = last_day_of_month(year, last_month)?;
    Some(DateRange { start, end })
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

pub fn clamp_limit(limit: i64) -> u32 {
    limit.clamp(1, MAX_LIMIT as i64) as u32
}

/// Everything a store needs to run one page of a caller's transaction list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilter {
    pub user_id: String,
    pub query: TransactionQuery,
    pub date_range: Option<DateRange>,
}

impl ListFilter {
    /// Checks raw query parameters and builds the filter for `user_id`.
    pub fn from_params(
        user_id: &str,
        params: &ListTransactionsParams,
        today: NaiveDate,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let page = match non_empty(&params.page) {
            None => DEFAULT_PAGE,
            Some(raw) => match raw.parse::<i64>() {
                Ok(p) if p >= 1 && p <= u32::MAX as i64 => p as u32,
                Ok(p) if p < 1 => {
                    errors.add("page", "page must not be less than 1");
                    DEFAULT_PAGE
                }
                _ => {
                    errors.add("page", "page must be an integer number");
                    DEFAULT_PAGE
                }
            },
        };

        let limit = match non_empty(&params.limit) {
            None => DEFAULT_LIMIT,
            Some(raw) => match raw.parse::<i64>() {
                Ok(l) => clamp_limit(l),
                Err(_) => {
                    errors.add("limit", "limit must be an integer number");
                    DEFAULT_LIMIT
                }
            },
        };

        let order = match non_empty(&params.order) {
            None => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => {
                errors.add("order", "order must be one of the following values: asc, desc");
                SortOrder::default()
            }
        };

        let sort_by = match non_empty(&params.sort_by) {
            None => SortField::default(),
            Some("updatedAt") => SortField::UpdatedAt,
            Some("createdAt") => SortField::CreatedAt,
            Some("amount") => SortField::Amount,
            Some(_) => {
                errors.add(
                    "sortBy",
                    "sortBy must be one of the following values: createdAt, amount, updatedAt",
                );
                SortField::default()
            }
        };

        let category = match non_empty(&params.category) {
            None => None,
            Some(raw) => match raw.parse::<Category>() {
                Ok(c) => Some(c),
                Err(_) => {
                    errors.add(
                        "category",
                        "category must be one of the following values: income, expense",
                    );
                    None
                }
            },
        };

        let year = match non_empty(&params.year) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(y) if (1..=9999).contains(&y) => Some(y),
                _ => {
                    errors.add("year", "year must be an integer between 1 and 9999");
                    None
                }
            },
        };

        let month = match non_empty(&params.month) {
            None => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(m) if (1..=12).contains(&m) => Some(m),
                _ => {
                    errors.add("month", "month must be an integer between 1 and 12");
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let query = TransactionQuery {
            page,
            limit,
            order,
            sort_by,
            search: params.search.clone().unwrap_or_default(),
            category,
            year,
            month,
        };
        Ok(Self::from_query(user_id, query, today))
    }

    /// Builds a filter from an already typed query, clamping the limit.
    pub fn from_query(user_id: &str, mut query: TransactionQuery, today: NaiveDate) -> Self {
        query.page = query.page.max(DEFAULT_PAGE);
        query.limit = clamp_limit(query.limit as i64);
        let date_range = period_range(query.year, query.month, today);
        Self {
            user_id: user_id.to_string(),
            query,
            date_range,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.query.page as i64 - 1) * self.query.limit as i64
    }

    pub fn take(&self) -> i64 {
        self.query.limit as i64
    }

    pub fn search(&self) -> Option<&str> {
        Some(self.query.search.as_str()).filter(|s| !s.is_empty())
    }

    /// In-memory form of the `WHERE` clause.
    pub fn matches(&self, t: &Transaction) -> bool {
        t.user_id == self.user_id
            && self.query.category.map_or(true, |c| t.category == c)
            && self.search().map_or(true, |s| t.description.contains(s))
            && self.date_range.map_or(true, |r| r.contains(t.transaction_date))
    }

    /// In-memory form of the `ORDER BY` clause, `id` breaking ties.
    pub fn compare(&self, a: &Transaction, b: &Transaction) -> Ordering {
        let primary = match self.query.sort_by {
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Amount => a.amount.cmp(&b.amount),
        };
        let ordering = primary.then_with(|| a.id.cmp(&b.id));
        match self.query.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn page_meta(page: u32, limit: u32, total: u64) -> PageMeta {
    let limit = limit.max(1);
    let last_page = total.div_ceil(limit as u64);
    PageMeta {
        current_page: page,
        per_page: limit,
        total,
        last_page,
        has_more_pages: (page as u64) < last_page,
        has_previous_page: page > 1,
        next_page_url: None,
        previous_page_url: None,
    }
}

/// Wraps one fetched page of rows in the page envelope, with links to the
/// neighbouring pages under `base_path`.
pub fn paginate<T>(filter: &ListFilter, data: Vec<T>, total: u64, base_path: &str) -> Page<T> {
    let mut meta = page_meta(filter.query.page, filter.query.limit, total);
    let link = |page: u32| format!("{}?{}", base_path, filter.query.with_page(page).to_query_string());
    if meta.has_more_pages {
        meta.next_page_url = Some(link(filter.query.page + 1));
    }
    if meta.has_previous_page {
        meta.previous_page_url = Some(link(filter.query.page - 1));
    }
    Page { data, meta }
}
