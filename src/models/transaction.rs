use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::FieldErrors;
use crate::money;

pub const DESCRIPTION_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Income,
    Expense,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Income => "income",
            Category::Expense => "expense",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Category::Income),
            "expense" => Ok(Category::Expense),
            other => Err(format!(
                "category must be one of the following values: income, expense (got {:?})",
                other
            )),
        }
    }
}

// A stored transaction row, owner included.
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub amount: BigDecimal,
    pub description: String,
    pub category: Category,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(user_id: String, fields: ValidTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount: fields.amount,
            description: fields.description,
            category: fields.category,
            transaction_date: fields.transaction_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, changes: &TransactionChanges) {
        if let Some(amount) = &changes.amount {
            self.amount = amount.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(date) = changes.transaction_date {
            self.transaction_date = date;
        }
        self.updated_at = Utc::now();
    }
}

/// Public projection of a transaction. The owner id stays server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    #[serde(with = "crate::money")]
    pub amount: BigDecimal,
    pub description: String,
    pub category: Category,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionRecord {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            amount: t.amount,
            description: t.description,
            category: t.category,
            transaction_date: t.transaction_date,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

/// Checked fields of a new transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTransaction {
    pub amount: BigDecimal,
    pub description: String,
    pub category: Category,
    pub transaction_date: NaiveDate,
}

/// Checked partial update; `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionChanges {
    pub amount: Option<BigDecimal>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub transaction_date: Option<NaiveDate>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.transaction_date.is_none()
    }
}

/// Create request body as sent by clients, checked by [`CreateTransaction::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransaction {
    pub amount: Option<serde_json::Value>,
    pub description: Option<serde_json::Value>,
    pub category: Option<serde_json::Value>,
    pub transaction_date: Option<serde_json::Value>,
}

impl CreateTransaction {
    pub fn from_parts(
        amount: &BigDecimal,
        description: impl Into<String>,
        category: Category,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            amount: Some(amount_to_json(amount)),
            description: Some(serde_json::Value::String(description.into())),
            category: Some(category.as_str().into()),
            transaction_date: Some(date_to_json(transaction_date)),
        }
    }

    pub fn validate(&self) -> Result<ValidTransaction, FieldErrors> {
        let mut errors = FieldErrors::new();

        let amount = match &self.amount {
            None | Some(serde_json::Value::Null) => {
                errors.add("amount", "Amount is required");
                None
            }
            Some(value) => check_amount(value, &mut errors),
        };
        let description = match supplied_text(&self.description) {
            Supplied::Missing => {
                errors.add("description", "Description is required");
                None
            }
            Supplied::Text(text) => check_description(text, &mut errors),
            Supplied::WrongType => {
                errors.add("description", DESCRIPTION_NOT_TEXT);
                None
            }
        };
        let category = match supplied_text(&self.category) {
            Supplied::Missing => {
                errors.add("category", "Category is required");
                None
            }
            Supplied::Text(raw) => check_category(raw, &mut errors),
            Supplied::WrongType => {
                errors.add("category", CATEGORY_INVALID);
                None
            }
        };
        let transaction_date = match supplied_text(&self.transaction_date) {
            Supplied::Missing => {
                errors.add("transactionDate", "Date is required");
                None
            }
            Supplied::Text(raw) => check_date(raw, &mut errors),
            Supplied::WrongType => {
                errors.add("transactionDate", DATE_INVALID);
                None
            }
        };

        match (amount, description, category, transaction_date) {
            (Some(amount), Some(description), Some(category), Some(transaction_date))
                if errors.is_empty() =>
            {
                Ok(ValidTransaction {
                    amount,
                    description,
                    category,
                    transaction_date,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Partial update body; absent and `null` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<serde_json::Value>,
}

impl UpdateTransaction {
    pub fn with_amount(mut self, amount: &BigDecimal) -> Self {
        self.amount = Some(amount_to_json(amount));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(serde_json::Value::String(description.into()));
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category.as_str().into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.transaction_date = Some(date_to_json(date));
        self
    }

    pub fn validate(&self) -> Result<TransactionChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        let changes = TransactionChanges {
            amount: match &self.amount {
                None | Some(serde_json::Value::Null) => None,
                Some(value) => check_amount(value, &mut errors),
            },
            description: match supplied_text(&self.description) {
                Supplied::Missing => None,
                Supplied::Text(text) => check_description(text, &mut errors),
                Supplied::WrongType => {
                    errors.add("description", DESCRIPTION_NOT_TEXT);
                    None
                }
            },
            category: match supplied_text(&self.category) {
                Supplied::Missing => None,
                Supplied::Text(raw) => check_category(raw, &mut errors),
                Supplied::WrongType => {
                    errors.add("category", CATEGORY_INVALID);
                    None
                }
            },
            transaction_date: match supplied_text(&self.transaction_date) {
                Supplied::Missing => None,
                Supplied::Text(raw) => check_date(raw, &mut errors),
                Supplied::WrongType => {
                    errors.add("transactionDate", DATE_INVALID);
                    None
                }
            },
        };
        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }
}

const DESCRIPTION_NOT_TEXT: &str = "description must be a string";
const CATEGORY_INVALID: &str = "category must be one of the following values: income, expense";
const DATE_INVALID: &str = "transactionDate must be a valid ISO 8601 date string";

/// A text field as it arrived on the wire. Absent and `null` are both missing.
enum Supplied<'a> {
    Missing,
    Text(&'a str),
    WrongType,
}

fn supplied_text(value: &Option<serde_json::Value>) -> Supplied<'_> {
    match value {
        None | Some(serde_json::Value::Null) => Supplied::Missing,
        Some(serde_json::Value::String(text)) => Supplied::Text(text),
        Some(_) => Supplied::WrongType,
    }
}

fn date_to_json(date: NaiveDate) -> serde_json::Value {
    serde_json::Value::String(date.format("%Y-%m-%d").to_string())
}

fn amount_to_json(amount: &BigDecimal) -> serde_json::Value {
    amount
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(amount.to_string()))
}

fn check_amount(value: &serde_json::Value, errors: &mut FieldErrors) -> Option<BigDecimal> {
    let amount = match value {
        serde_json::Value::Number(n) => money::from_json_number(n),
        _ => None,
    };
    let Some(amount) = amount else {
        errors.add("amount", "Amount must be a valid number");
        return None;
    };
    let problems = money::amount_problems(&amount);
    if problems.is_empty() {
        Some(amount)
    } else {
        for problem in problems {
            errors.add("amount", problem);
        }
        None
    }
}

fn check_description(text: &str, errors: &mut FieldErrors) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        errors.add("description", "Description is required");
        return None;
    }
    if trimmed.chars().count() > DESCRIPTION_MAX_LEN {
        errors.add(
            "description",
            format!("Description must be at most {} characters", DESCRIPTION_MAX_LEN),
        );
        return None;
    }
    Some(trimmed.to_string())
}

fn check_category(raw: &str, errors: &mut FieldErrors) -> Option<Category> {
    match raw.parse::<Category>() {
        Ok(category) => Some(category),
        Err(_) => {
            errors.add("category", CATEGORY_INVALID);
            None
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, keeping only the calendar date.
pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn check_date(raw: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    let parsed = parse_transaction_date(raw);
    if parsed.is_none() {
        errors.add("transactionDate", DATE_INVALID);
    }
    parsed
}

/// Grouped totals for one category as returned by the aggregation query.
#[derive(Debug, Clone, FromRow)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: BigDecimal,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    #[serde(with = "crate::money")]
    pub total_income: BigDecimal,
    #[serde(with = "crate::money")]
    pub total_expense: BigDecimal,
    #[serde(with = "crate::money")]
    pub balance: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_valid_create_body() {
        let body: CreateTransaction = serde_json::from_value(json!({
            "amount": 1200.50,
            "description": "Salary",
            "category": "income",
            "transactionDate": "2024-01-05"
        }))
        .unwrap();

        let valid = body.validate().unwrap();
        assert_eq!(valid.amount, dec("1200.50"));
        assert_eq!(valid.description, "Salary");
        assert_eq!(valid.category, Category::Income);
        assert_eq!(valid.transaction_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_create_reports_every_bad_field() {
        let body: CreateTransaction = serde_json::from_value(json!({
            "amount": -3,
            "description": "   ",
            "category": "gift",
            "transactionDate": "05/01/2024"
        }))
        .unwrap();

        let errors = body.validate().unwrap_err();
        let fields: Vec<&String> = errors.fields().keys().collect();
        assert_eq!(fields, vec!["amount", "category", "description", "transactionDate"]);
    }

    #[test]
    fn test_amount_as_string_is_rejected() {
        let body = CreateTransaction {
            amount: Some(json!("12.00")),
            description: Some("Lunch".into()),
            category: Some("expense".into()),
            transaction_date: Some("2024-02-01".into()),
        };
        let errors = body.validate().unwrap_err();
        assert_eq!(errors.fields()["amount"], vec!["Amount must be a valid number".to_string()]);
    }

    #[test]
    fn test_wrong_json_types_are_field_errors() {
        let body: CreateTransaction = serde_json::from_value(json!({
            "amount": 12,
            "description": 5,
            "category": ["expense"],
            "transactionDate": true
        }))
        .unwrap();
        let errors = body.validate().unwrap_err();
        assert_eq!(errors.fields()["description"], vec![DESCRIPTION_NOT_TEXT.to_string()]);
        assert_eq!(errors.fields()["category"], vec![CATEGORY_INVALID.to_string()]);
        assert_eq!(errors.fields()["transactionDate"], vec![DATE_INVALID.to_string()]);
        assert!(!errors.fields().contains_key("amount"));

        let patch: UpdateTransaction =
            serde_json::from_value(json!({ "description": 5, "category": null })).unwrap();
        let errors = patch.validate().unwrap_err();
        assert_eq!(errors.fields().keys().collect::<Vec<_>>(), vec!["description"]);
    }

    #[test]
    fn test_missing_fields_are_required() {
        let errors = CreateTransaction::default().validate().unwrap_err();
        assert_eq!(errors.fields().len(), 4);
    }

    #[test]
    fn test_timestamp_date_keeps_calendar_day() {
        assert_eq!(
            parse_transaction_date("2024-03-31T23:30:00+00:00"),
            NaiveDate::from_ymd_opt(2024, 3, 31)
        );
    }

    #[test]
    fn test_update_only_carries_supplied_fields() {
        let body: UpdateTransaction =
            serde_json::from_value(json!({ "description": "Groceries", "amount": null })).unwrap();
        let changes = body.validate().unwrap();
        assert_eq!(changes.description.as_deref(), Some("Groceries"));
        assert!(changes.amount.is_none());
        assert!(changes.category.is_none());
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_update_rejects_bad_category() {
        let body = UpdateTransaction::default().with_description("ok");
        let body = UpdateTransaction {
            category: Some("transfer".into()),
            ..body
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_from_parts_round_trips_through_validation() {
        let body = CreateTransaction::from_parts(
            &dec("50.00"),
            "Refund",
            Category::Income,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        let valid = body.validate().unwrap();
        assert_eq!(valid.amount, dec("50"));
    }

    #[test]
    fn test_record_hides_owner() {
        let t = Transaction::new(
            "user_1".into(),
            ValidTransaction {
                amount: dec("9.99"),
                description: "Book".into(),
                category: Category::Expense,
                transaction_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            },
        );
        let json = serde_json::to_value(TransactionRecord::from(t)).unwrap();
        assert!(json.get("userId").is_none());
        assert_eq!(json["amount"], json!(9.99));
        assert_eq!(json["transactionDate"], json!("2024-01-01"));
    }
}
