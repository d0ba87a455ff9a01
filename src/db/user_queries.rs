use sqlx::PgPool;

use crate::models::{User, UserProfile};

pub async fn fetch_one(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, firstname, lastname, email, created_at, updated_at
         FROM users
         WHERE id = $1"
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn upsert(pool: &PgPool, id: &str, profile: &UserProfile) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, firstname, lastname, email)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (id)
         DO UPDATE SET
             firstname = EXCLUDED.firstname,
             lastname = EXCLUDED.lastname,
             email = EXCLUDED.email,
             updated_at = NOW()
         RETURNING id, firstname, lastname, email, created_at, updated_at"
    )
    .bind(id)
    .bind(&profile.firstname)
    .bind(&profile.lastname)
    .bind(&profile.email)
    .fetch_one(pool)
    .await
}

/// Removing a user cascades to their transactions through the foreign key.
pub async fn delete(pool: &PgPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
