use tracing::info;

use crate::errors::AppError;
use crate::models::{UpsertUser, User};
use crate::store::UserStore;

pub async fn fetch_me(store: &dyn UserStore, user_id: &str) -> Result<User, AppError> {
    store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User profile not found".to_string()))
}

pub async fn upsert_me(store: &dyn UserStore, user_id: &str, input: UpsertUser) -> Result<User, AppError> {
    let profile = input.validate()?;
    let user = store.upsert_user(user_id, &profile).await?;
    info!("Saved profile for {}", user_id);
    Ok(user)
}

/// Removes the caller's profile together with all of their transactions.
pub async fn delete_me(store: &dyn UserStore, user_id: &str) -> Result<(), AppError> {
    match store.delete_user(user_id).await? {
        0 => Err(AppError::NotFound("User profile not found".to_string())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn input(email: &str) -> UpsertUser {
        UpsertUser {
            firstname: Some("Grace".into()),
            lastname: Some("Hopper".into()),
            email: Some(email.into()),
        }
    }

    #[tokio::test]
    async fn test_profile_lifecycle() {
        let store = MemoryStore::new();
        assert!(matches!(fetch_me(&store, "u1").await, Err(AppError::NotFound(_))));

        let created = upsert_me(&store, "u1", input("grace@example.com")).await.unwrap();
        assert_eq!(created.id, "u1");

        let renamed = upsert_me(
            &store,
            "u1",
            UpsertUser {
                firstname: Some("Admiral".into()),
                ..input("grace@example.com")
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.firstname, "Admiral");
        assert_eq!(renamed.created_at, created.created_at);

        delete_me(&store, "u1").await.unwrap();
        assert!(matches!(delete_me(&store, "u1").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_profile_is_a_validation_error() {
        let store = MemoryStore::new();
        let result = upsert_me(&store, "u1", input("not-an-email")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
