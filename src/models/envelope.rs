use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pagination::{Page, PageMeta};
use crate::errors::FieldErrors;

/// `message` is either one sentence or a list of validation messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    One(String),
    Many(Vec<String>),
}

impl Message {
    pub fn first(&self) -> Option<&str> {
        match self {
            Message::One(text) => Some(text.as_str()),
            Message::Many(items) => items.first().map(String::as_str),
        }
    }

    pub fn joined(&self) -> String {
        match self {
            Message::One(text) => text.clone(),
            Message::Many(items) => items.join(", "),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// List response with the page metadata flattened at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn ok(message: impl Into<String>, page: Page<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: page.data,
            meta: page.meta,
        }
    }

    pub fn into_page(self) -> Page<T> {
        Page {
            data: self.data,
            meta: self.meta,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Message::One(message.into()),
            errors: None,
        }
    }

    pub fn with_fields(errors: &FieldErrors) -> Self {
        Self {
            success: false,
            message: Message::Many(errors.messages()),
            errors: Some(errors.fields().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paginated_response_flattens_meta() {
        let page = Page {
            data: vec![1, 2],
            meta: PageMeta {
                current_page: 1,
                per_page: 2,
                total: 3,
                last_page: 2,
                has_more_pages: true,
                has_previous_page: false,
                next_page_url: Some("/api/transactions?page=2".into()),
                previous_page_url: None,
            },
        };
        let value = serde_json::to_value(PaginatedResponse::ok("ok", page)).unwrap();
        assert_eq!(value["currentPage"], json!(1));
        assert_eq!(value["lastPage"], json!(2));
        assert_eq!(value["hasMorePages"], json!(true));
        assert_eq!(value["data"], json!([1, 2]));
        assert_eq!(value["previousPageUrl"], json!(null));
    }

    #[test]
    fn test_validation_failure_lists_messages() {
        let errors = FieldErrors::single("amount", "Amount is required");
        let value = serde_json::to_value(ErrorResponse::with_fields(&errors)).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "message": ["Amount is required"],
                "errors": { "amount": ["Amount is required"] }
            })
        );
    }
}
