//! Database schema and types

pub use crate::state_machine::state::ExchangeStatus;
use crate::state_machine::Participants;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'available',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner_id);

CREATE TABLE IF NOT EXISTS exchanges (
    item_id TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'pending',
    initiator_id TEXT,
    counterparty_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_exchanges_updated ON exchanges(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_item ON messages(item_id, timestamp, id);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);
CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id);
";

/// Negotiation record, one per item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub item_id: String,
    pub status: ExchangeStatus,
    pub initiator_id: Option<String>,
    pub counterparty_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRecord {
    pub fn participants(&self) -> Participants {
        Participants::new(self.initiator_id.clone(), self.counterparty_id.clone())
    }
}

/// A status change to be committed with compare-and-set on `expected`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub item_id: String,
    pub expected: ExchangeStatus,
    pub next: ExchangeStatus,
    /// Only set by the first request; existing values are kept otherwise
    pub initiator_id: Option<String>,
    pub counterparty_id: Option<String>,
    pub mark_item_unavailable: bool,
}

/// Chat message in an item thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub item_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One (item, other participant) thread in a user's inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub item_id: String,
    pub other_user_id: String,
    pub item_title: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub message_count: i64,
}

/// Item availability as seen by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    #[default]
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "not available")]
    NotAvailable,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::NotAvailable => "not available",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry for a tradeable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::Available
    }
}

// ============================================================================
// SQL conversions
// ============================================================================

impl ToSql for ExchangeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ExchangeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ItemStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ItemStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "available" => Ok(ItemStatus::Available),
            "not available" => Ok(ItemStatus::NotAvailable),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
