use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::FieldErrors;

// The id is issued by the identity provider and carried as the token subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertUser {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

impl UpsertUser {
    pub fn validate(&self) -> Result<UserProfile, FieldErrors> {
        let mut errors = FieldErrors::new();
        let firstname = required(&self.firstname, "firstname", "First name is required", &mut errors);
        let lastname = required(&self.lastname, "lastname", "Last name is required", &mut errors);
        let email = required(&self.email, "email", "Email is required", &mut errors)
            .map(|email| email.to_lowercase());
        if let Some(email) = &email {
            if !looks_like_email(email) {
                errors.add("email", "email must be an email");
            }
        }
        match (firstname, lastname, email) {
            (Some(firstname), Some(lastname), Some(email)) if errors.is_empty() => Ok(UserProfile {
                firstname,
                lastname,
                email,
            }),
            _ => Err(errors),
        }
    }
}

fn required(
    value: &Option<String>,
    field: &str,
    message: &str,
    errors: &mut FieldErrors,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => {
            errors.add(field, message);
            None
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_is_trimmed_and_email_lowercased() {
        let input = UpsertUser {
            firstname: Some(" Ada ".into()),
            lastname: Some("Lovelace".into()),
            email: Some("Ada@Example.COM".into()),
        };
        let profile = input.validate().unwrap();
        assert_eq!(profile.firstname, "Ada");
        assert_eq!(profile.email, "ada@example.com");
    }

    #[test]
    fn test_bad_email_is_rejected() {
        let input = UpsertUser {
            firstname: Some("Ada".into()),
            lastname: Some("Lovelace".into()),
            email: Some("ada.example.com".into()),
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.fields().contains_key("email"));
    }
}
