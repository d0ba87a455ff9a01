use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{CategoryTotal, Transaction, TransactionChanges};
use crate::services::pagination::ListFilter;

const COLUMNS: &str =
    "id, user_id, amount, description, category, transaction_date, created_at, updated_at";

pub async fn insert(pool: &PgPool, input: &Transaction) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(&format!(
        "INSERT INTO transactions (id, user_id, amount, description, category, transaction_date, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {COLUMNS}"
    ))
    .bind(input.id)
    .bind(&input.user_id)
    .bind(&input.amount)
    .bind(&input.description)
    .bind(input.category)
    .bind(input.transaction_date)
    .bind(input.created_at)
    .bind(input.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {COLUMNS}
         FROM transactions
         WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Appends the list `WHERE` clause shared by the page and count queries.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    builder.push(" WHERE user_id = ");
    builder.push_bind(filter.user_id.clone());

    if let Some(category) = filter.query.category {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }
    if let Some(search) = filter.search() {
        // strpos keeps the match literal and case sensitive
        builder.push(" AND strpos(description, ");
        builder.push_bind(search.to_string());
        builder.push(") > 0");
    }
    if let Some(range) = filter.date_range {
        builder.push(" AND transaction_date BETWEEN ");
        builder.push_bind(range.start);
        builder.push(" AND ");
        builder.push_bind(range.end);
    }
}

pub fn list_query(filter: &ListFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {COLUMNS} FROM transactions"));
    push_filter(&mut builder, filter);

    let direction = filter.query.order.as_sql();
    builder.push(format!(
        " ORDER BY {} {}, id {}",
        filter.query.sort_by.column(),
        direction,
        direction
    ));
    builder.push(" LIMIT ");
    builder.push_bind(filter.take());
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset());
    builder
}

pub fn count_query(filter: &ListFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM transactions");
    push_filter(&mut builder, filter);
    builder
}

pub async fn fetch_page(pool: &PgPool, filter: &ListFilter) -> Result<Vec<Transaction>, sqlx::Error> {
    list_query(filter)
        .build_query_as::<Transaction>()
        .fetch_all(pool)
        .await
}

pub async fn count(pool: &PgPool, filter: &ListFilter) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = count_query(filter)
        .build_query_as()
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn category_totals(pool: &PgPool, user_id: &str) -> Result<Vec<CategoryTotal>, sqlx::Error> {
    sqlx::query_as::<_, CategoryTotal>(
        "SELECT category, SUM(amount) AS total, COUNT(id) AS count
         FROM transactions
         WHERE user_id = $1
         GROUP BY category"
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Applies `changes` only if the row exists and belongs to `user_id`.
/// `None` means nothing matched both conditions.
pub async fn update_owned(
    pool: &PgPool,
    id: Uuid,
    user_id: &str,
    changes: &TransactionChanges,
) -> Result<Option<Transaction>, sqlx::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE transactions SET ");

    let mut separated = query_builder.separated(", ");
    if let Some(amount) = &changes.amount {
        separated.push("amount = ");
        separated.push_bind_unseparated(amount.clone());
    }
    if let Some(description) = &changes.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description.clone());
    }
    if let Some(category) = changes.category {
        separated.push("category = ");
        separated.push_bind_unseparated(category);
    }
    if let Some(date) = changes.transaction_date {
        separated.push("transaction_date = ");
        separated.push_bind_unseparated(date);
    }
    separated.push("updated_at = NOW()");

    query_builder.push(" WHERE id = ");
    query_builder.push_bind(id);
    query_builder.push(" AND user_id = ");
    query_builder.push_bind(user_id.to_string());
    query_builder.push(format!(" RETURNING {COLUMNS}"));

    query_builder
        .build_query_as::<Transaction>()
        .fetch_optional(pool)
        .await
}

pub async fn delete_owned(pool: &PgPool, id: Uuid, user_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
