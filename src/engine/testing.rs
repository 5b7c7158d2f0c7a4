//! In-memory implementations for testing
//!
//! These let engine tests script races and store failures deterministically.

use super::traits::{ExchangeStore, ItemCatalog, StoreError};
use crate::db::{ExchangeRecord, ExchangeStatus, TransitionCommit};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Exchange store and item catalog held in memory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ExchangeRecord>>,
    owners: Mutex<HashMap<String, String>>,
    /// Number of times each item was flipped to unavailable
    unavailable_writes: Mutex<HashMap<String, u32>>,
    /// Status another actor commits right before our next commit lands
    race_next_commit: Mutex<Option<ExchangeStatus>>,
    fail_next_commit: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, item_id: &str, owner_id: &str) -> Self {
        self.owners
            .lock()
            .unwrap()
            .insert(item_id.to_string(), owner_id.to_string());
        self
    }

    pub fn status(&self, item_id: &str) -> Option<ExchangeStatus> {
        self.records.lock().unwrap().get(item_id).map(|r| r.status)
    }

    pub fn unavailable_writes(&self, item_id: &str) -> u32 {
        self.unavailable_writes
            .lock()
            .unwrap()
            .get(item_id)
            .copied()
            .unwrap_or(0)
    }

    /// Make another writer win the next commit by moving the record to `status`
    pub fn race_next_commit(&self, status: ExchangeStatus) {
        *self.race_next_commit.lock().unwrap() = Some(status);
    }

    /// Make the next commit fail as a transient backend error
    pub fn fail_next_commit(&self) {
        *self.fail_next_commit.lock().unwrap() = true;
    }
}

#[async_trait]
impl ExchangeStore for MemoryStore {
    async fn get_or_create(&self, item_id: &str) -> Result<(ExchangeRecord, bool), StoreError> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.get(item_id) {
            return Ok((record.clone(), false));
        }
        let now = Utc::now();
        let record = ExchangeRecord {
            item_id: item_id.to_string(),
            status: ExchangeStatus::Pending,
            initiator_id: None,
            counterparty_id: None,
            created_at: now,
            updated_at: now,
        };
        records.insert(item_id.to_string(), record.clone());
        Ok((record, true))
    }

    async fn commit(&self, commit: &TransitionCommit) -> Result<ExchangeRecord, StoreError> {
        if std::mem::take(&mut *self.fail_next_commit.lock().unwrap()) {
            return Err(StoreError::Backend("disk I/O error".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&commit.item_id)
            .ok_or_else(|| StoreError::Backend(format!("no record for {}", commit.item_id)))?;

        if let Some(winner) = self.race_next_commit.lock().unwrap().take() {
            record.status = winner;
            record.updated_at = Utc::now();
        }

        if record.status != commit.expected {
            return Err(StoreError::Conflict {
                item_id: commit.item_id.clone(),
                expected: commit.expected,
            });
        }

        if commit.mark_item_unavailable {
            if !self.owners.lock().unwrap().contains_key(&commit.item_id) {
                return Err(StoreError::ItemNotFound(commit.item_id.clone()));
            }
            *self
                .unavailable_writes
                .lock()
                .unwrap()
                .entry(commit.item_id.clone())
                .or_default() += 1;
        }

        record.status = commit.next;
        if let Some(id) = &commit.initiator_id {
            record.initiator_id = Some(id.clone());
        }
        if let Some(id) = &commit.counterparty_id {
            record.counterparty_id = Some(id.clone());
        }
        record.updated_at = Utc::now().max(record.updated_at);
        Ok(record.clone())
    }

    async fn list(&self) -> Result<Vec<ExchangeRecord>, StoreError> {
        let mut all: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}

#[async_trait]
impl ItemCatalog for MemoryStore {
    async fn owner_of(&self, item_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.owners.lock().unwrap().get(item_id).cloned())
    }
}
