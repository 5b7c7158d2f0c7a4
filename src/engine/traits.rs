//! Trait abstractions for negotiation I/O
//!
//! These traits enable testing the engine with in-memory implementations.

use crate::db::{Database, DbError, ExchangeRecord, ExchangeStatus, TransitionCommit};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Exchange for {item_id} is no longer {expected}")]
    Conflict {
        item_id: String,
        expected: ExchangeStatus,
    },
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("{0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ExchangeConflict { item_id, expected } => {
                StoreError::Conflict { item_id, expected }
            }
            DbError::ItemNotFound(id) => StoreError::ItemNotFound(id),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Storage for per-item exchange records
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Get the record, creating a `pending` one if absent. `true` if created.
    async fn get_or_create(&self, item_id: &str) -> Result<(ExchangeRecord, bool), StoreError>;

    /// Compare-and-set commit of a status change. When
    /// `mark_item_unavailable` is set the catalog flip is part of the same unit.
    async fn commit(&self, commit: &TransitionCommit) -> Result<ExchangeRecord, StoreError>;

    /// All records, most recently changed first
    async fn list(&self) -> Result<Vec<ExchangeRecord>, StoreError>;
}

/// Read side of the item catalog the engine consults
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn owner_of(&self, item_id: &str) -> Result<Option<String>, StoreError>;
}

/// Combined storage trait for convenience
pub trait NegotiationStorage: ExchangeStore + ItemCatalog {}
impl<T: ExchangeStore + ItemCatalog> NegotiationStorage for T {}

// ============================================================================
// Production implementation
// ============================================================================

/// Adapter exposing the sqlite database through the engine traits
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ExchangeStore for DatabaseStorage {
    async fn get_or_create(&self, item_id: &str) -> Result<(ExchangeRecord, bool), StoreError> {
        Ok(self.db.get_or_create_exchange(item_id)?)
    }

    async fn commit(&self, commit: &TransitionCommit) -> Result<ExchangeRecord, StoreError> {
        Ok(self.db.commit_transition(commit)?)
    }

    async fn list(&self) -> Result<Vec<ExchangeRecord>, StoreError> {
        Ok(self.db.list_exchanges()?)
    }
}

#[async_trait]
impl ItemCatalog for DatabaseStorage {
    async fn owner_of(&self, item_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.db.item_owner(item_id)?)
    }
}
