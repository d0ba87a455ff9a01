use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{TransactionStore, UserStore};
use crate::errors::AppError;
use crate::models::{Category, CategoryTotal, Transaction, TransactionChanges, User, UserProfile};
use crate::services::pagination::ListFilter;

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    transactions: HashMap<Uuid, Transaction>,
}

/// Process-local store with the same semantics as the PostgreSQL one.
/// Used when no `DATABASE_URL` is configured and by the test suite.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, transaction: Transaction) -> Result<Transaction, AppError> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&transaction.user_id) {
            return Err(AppError::NotFound("User profile not found".to_string()));
        }
        if tables.transactions.contains_key(&transaction.id) {
            return Err(AppError::Conflict("Resource already exists".to_string()));
        }
        tables.transactions.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        Ok(self.tables.read().transactions.get(&id).cloned())
    }

    async fn list(&self, filter: &ListFilter) -> Result<(Vec<Transaction>, u64), AppError> {
        let tables = self.tables.read();
        let mut matching: Vec<&Transaction> = tables
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .collect();
        matching.sort_by(|a, b| filter.compare(a, b));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.take().max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn category_totals(&self, user_id: &str) -> Result<Vec<CategoryTotal>, AppError> {
        let tables = self.tables.read();
        let mut grouped: HashMap<Category, (BigDecimal, i64)> = HashMap::new();
        for t in tables.transactions.values().filter(|t| t.user_id == user_id) {
            let entry = grouped
                .entry(t.category)
                .or_insert_with(|| (BigDecimal::zero(), 0));
            entry.0 += t.amount.clone();
            entry.1 += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|(category, (total, count))| CategoryTotal {
                category,
                total,
                count,
            })
            .collect())
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: &str,
        changes: &TransactionChanges,
    ) -> Result<Option<Transaction>, AppError> {
        let mut tables = self.tables.write();
        match tables.transactions.get_mut(&id) {
            Some(t) if t.user_id == user_id => {
                t.apply(changes);
                Ok(Some(t.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_owned(&self, id: Uuid, user_id: &str) -> Result<u64, AppError> {
        let mut tables = self.tables.write();
        let owned = tables
            .transactions
            .get(&id)
            .map_or(false, |t| t.user_id == user_id);
        if owned {
            tables.transactions.remove(&id);
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().users.get(id).cloned())
    }

    async fn upsert_user(&self, id: &str, profile: &UserProfile) -> Result<User, AppError> {
        let mut tables = self.tables.write();
        let email_taken = tables
            .users
            .values()
            .any(|u| u.id != id && u.email == profile.email);
        if email_taken {
            return Err(AppError::Conflict("Email is already in use".to_string()));
        }

        let now = Utc::now();
        let user = tables.users.entry(id.to_string()).or_insert_with(|| User {
            id: id.to_string(),
            firstname: String::new(),
            lastname: String::new(),
            email: String::new(),
            created_at: now,
            updated_at: now,
        });
        user.firstname = profile.firstname.clone();
        user.lastname = profile.lastname.clone();
        user.email = profile.email.clone();
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &str) -> Result<u64, AppError> {
        let mut tables = self.tables.write();
        if tables.users.remove(id).is_none() {
            return Ok(0);
        }
        tables.transactions.retain(|_, t| t.user_id != id);
        Ok(1)
    }
}
