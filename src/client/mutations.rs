use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};
use uuid::Uuid;

use super::cache::{CacheSnapshot, QueryCache, QueryKey};
use super::notify::{Notice, Notifier};
use crate::models::TransactionRecord;

pub const DELETED: &str = "Transaction deleted successfully";
pub const DELETE_FAILED: &str = "There was a problem deleting the transaction.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteState {
    Idle,
    InFlight,
    Committed,
    RolledBack,
}

/// Removes a transaction from the cache before the server confirms it.
///
/// `begin` snapshots and patches the cache, then exactly one of `commit`
/// (invalidate so the next read refetches) or `rollback` (put the snapshot
/// back) settles it.
pub struct OptimisticDelete {
    cache: QueryCache,
    id: Uuid,
    state: DeleteState,
    snapshot: Option<CacheSnapshot>,
}

fn touched_by(id: Uuid) -> impl Fn(&QueryKey) -> bool {
    move |key| match key {
        QueryKey::TransactionList(_) | QueryKey::Summary => true,
        QueryKey::Transaction(other) => *other == id,
    }
}

impl OptimisticDelete {
    pub fn new(cache: QueryCache, id: Uuid) -> Self {
        Self {
            cache,
            id,
            state: DeleteState::Idle,
            snapshot: None,
        }
    }

    pub fn state(&self) -> DeleteState {
        self.state
    }

    /// Applies the delete locally. Returns the row that was taken out, if the
    /// cache knew it.
    pub fn begin(&mut self) -> Option<TransactionRecord> {
        if self.state != DeleteState::Idle {
            return None;
        }
        // in-flight reads would overwrite the patch
        self.cache.cancel_where(touched_by(self.id));
        self.snapshot = Some(self.cache.snapshot(touched_by(self.id)));

        let removed = self
            .cache
            .remove_from_lists(self.id)
            .or_else(|| self.cache.transaction(self.id));
        match &removed {
            Some(record) => {
                self.cache.adjust_summary(record.category, &record.amount);
            }
            None => debug!("Transaction {} not cached, nothing to patch", self.id),
        }
        self.state = DeleteState::InFlight;
        removed
    }

    pub fn commit(&mut self) {
        if self.state != DeleteState::InFlight {
            return;
        }
        self.cache.invalidate_where(touched_by(self.id));
        self.snapshot = None;
        self.state = DeleteState::Committed;
    }

    pub fn rollback(&mut self) {
        if self.state != DeleteState::InFlight {
            return;
        }
        if let Some(snapshot) = self.snapshot.take() {
            self.cache.restore(snapshot);
        }
        self.state = DeleteState::RolledBack;
    }

    /// Runs the whole cycle around `request`, reporting the outcome through `notifier`.
    pub async fn run<T, E, Fut>(mut self, request: Fut, notifier: &dyn Notifier) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.begin();
        match request.await {
            Ok(value) => {
                self.commit();
                notifier.notify(Notice::success(DELETED));
                Ok(value)
            }
            Err(e) => {
                warn!("Delete of {} failed, rolling back: {}", self.id, e);
                self.rollback();
                notifier.notify(Notice::error(DELETE_FAILED));
                Err(e)
            }
        }
    }
}
