//! Database module for swapdesk
//!
//! Provides persistence for exchange records, chat messages, and the slice of
//! the item catalog the negotiation needs.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("Item already exists: {0}")]
    ItemExists(String),
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),
    #[error("Exchange for {item_id} is no longer {expected}")]
    ExchangeConflict {
        item_id: String,
        expected: ExchangeStatus,
    },
}

pub type DbResult<T> = Result<T, DbError>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Item Catalog ====================

    /// Register an item as available
    pub fn create_item(&self, id: &str, title: &str, owner_id: &str) -> DbResult<Item> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO items (id, title, owner_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, title, owner_id, ItemStatus::Available, format_timestamp(now)],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                DbError::ItemExists(id.to_string())
            }
            other => DbError::Sqlite(other),
        })?;

        Ok(Item {
            id: id.to_string(),
            title: title.to_string(),
            owner_id: owner_id.to_string(),
            status: ItemStatus::Available,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get item by ID
    pub fn get_item(&self, id: &str) -> DbResult<Item> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, title, owner_id, status, created_at, updated_at FROM items WHERE id = ?1",
            params![id],
            |row| {
                Ok(Item {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    owner_id: row.get(2)?,
                    status: row.get(3)?,
                    created_at: timestamp_column(row, 4)?,
                    updated_at: timestamp_column(row, 5)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ItemNotFound(id.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    /// Owner of an item, if the catalog knows it
    pub fn item_owner(&self, id: &str) -> DbResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT owner_id FROM items WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(DbError::from)
    }

    // ==================== Exchange Operations ====================

    /// Get the exchange record for an item, creating a `pending` one if absent.
    ///
    /// Returns `true` alongside the record when this call created it.
    pub fn get_or_create_exchange(&self, item_id: &str) -> DbResult<(ExchangeRecord, bool)> {
        let conn = self.conn.lock().unwrap();
        let now = format_timestamp(Utc::now());

        // INSERT OR IGNORE keeps concurrent first touches converging on one row
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO exchanges (item_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![item_id, ExchangeStatus::Pending, now],
        )?;

        if inserted == 1 {
            tracing::debug!(item_id = %item_id, "Created pending exchange record");
        }

        let record = read_exchange(&conn, item_id)?;
        Ok((record, inserted == 1))
    }

    /// Get an existing exchange record
    pub fn get_exchange(&self, item_id: &str) -> DbResult<ExchangeRecord> {
        let conn = self.conn.lock().unwrap();
        read_exchange(&conn, item_id).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::ExchangeNotFound(item_id.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    /// List all exchange records, most recently changed first
    pub fn list_exchanges(&self) -> DbResult<Vec<ExchangeRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT item_id, status, initiator_id, counterparty_id, created_at, updated_at
             FROM exchanges ORDER BY updated_at DESC, item_id ASC",
        )?;

        let rows = stmt.query_map([], parse_exchange_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Apply a status change and, on completion, the item availability flip
    /// as one all-or-nothing unit.
    ///
    /// The status write is a compare-and-set on `commit.expected`; a record
    /// that moved on since it was read yields `ExchangeConflict` and nothing
    /// is written.
    pub fn commit_transition(&self, commit: &TransitionCommit) -> DbResult<ExchangeRecord> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = tx
            .query_row(
                "SELECT updated_at FROM exchanges WHERE item_id = ?1",
                params![commit.item_id],
                |row| timestamp_column(row, 0),
            )
            .optional()?;

        // updated_at never goes backwards, even if the wall clock does
        let now = Utc::now();
        let updated_at = previous.filter(|prev| *prev > now).unwrap_or(now);

        let updated = tx.execute(
            "UPDATE exchanges
             SET status = ?1,
                 initiator_id = COALESCE(?2, initiator_id),
                 counterparty_id = COALESCE(?3, counterparty_id),
                 updated_at = ?4
             WHERE item_id = ?5 AND status = ?6",
            params![
                commit.next,
                commit.initiator_id,
                commit.counterparty_id,
                format_timestamp(updated_at),
                commit.item_id,
                commit.expected,
            ],
        )?;

        if updated == 0 {
            return Err(DbError::ExchangeConflict {
                item_id: commit.item_id.clone(),
                expected: commit.expected,
            });
        }

        if commit.mark_item_unavailable {
            let flipped = tx.execute(
                "UPDATE items SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    ItemStatus::NotAvailable,
                    format_timestamp(now),
                    commit.item_id
                ],
            )?;
            if flipped == 0 {
                return Err(DbError::ItemNotFound(commit.item_id.clone()));
            }
        }

        let record = read_exchange(&tx, &commit.item_id)?;
        tx.commit()?;
        Ok(record)
    }

    // ==================== Message Operations ====================

    /// Append a message to an item thread
    pub fn append_message(
        &self,
        item_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> DbResult<Message> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO messages (item_id, sender_id, receiver_id, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![item_id, sender_id, receiver_id, content, format_timestamp(now)],
        )?;

        Ok(Message {
            id: conn.last_insert_rowid(),
            item_id: item_id.to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            timestamp: now,
        })
    }

    /// Messages between two users about an item, in either direction, oldest first
    pub fn list_messages(&self, item_id: &str, user_a: &str, user_b: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, item_id, sender_id, receiver_id, content, timestamp
             FROM messages
             WHERE item_id = ?1 AND (
                 (sender_id = ?2 AND receiver_id = ?3) OR
                 (sender_id = ?3 AND receiver_id = ?2)
             )
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![item_id, user_a, user_b], parse_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// One entry per (item, other user) thread the user takes part in, newest first
    pub fn list_conversations(&self, user_id: &str) -> DbResult<Vec<ConversationSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT m.item_id,
                    CASE WHEN m.sender_id = ?1 THEN m.receiver_id ELSE m.sender_id END AS other_user_id,
                    i.title,
                    MAX(m.timestamp) AS last_message_at,
                    COUNT(*) AS message_count
             FROM messages m
             LEFT JOIN items i ON i.id = m.item_id
             WHERE m.sender_id = ?1 OR m.receiver_id = ?1
             GROUP BY m.item_id, other_user_id
             ORDER BY last_message_at DESC, MAX(m.id) DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ConversationSummary {
                item_id: row.get(0)?,
                other_user_id: row.get(1)?,
                item_title: row.get(2)?,
                last_message_at: timestamp_column(row, 3)?,
                message_count: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn read_exchange(conn: &Connection, item_id: &str) -> rusqlite::Result<ExchangeRecord> {
    conn.query_row(
        "SELECT item_id, status, initiator_id, counterparty_id, created_at, updated_at
         FROM exchanges WHERE item_id = ?1",
        params![item_id],
        parse_exchange_row,
    )
}

fn parse_exchange_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExchangeRecord> {
    Ok(ExchangeRecord {
        item_id: row.get(0)?,
        status: row.get(1)?,
        initiator_id: row.get(2)?,
        counterparty_id: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

fn parse_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        item_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        content: row.get(4)?,
        timestamp: timestamp_column(row, 5)?,
    })
}

/// Fixed-width RFC 3339 so text ordering in SQL matches time ordering
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamp column; an unparseable value is a conversion error, not "now"
fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(item_id: &str) -> TransitionCommit {
        TransitionCommit {
            item_id: item_id.to_string(),
            expected: ExchangeStatus::Agreed,
            next: ExchangeStatus::Completed,
            initiator_id: None,
            counterparty_id: None,
            mark_item_unavailable: true,
        }
    }

    fn force_status(db: &Database, item_id: &str, status: ExchangeStatus) {
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "UPDATE exchanges SET status = ?1 WHERE item_id = ?2",
            params![status, item_id],
        )
        .unwrap();
    }

    #[test]
    fn test_exchange_is_created_once() {
        let db = Database::open_in_memory().unwrap();

        let (first, created) = db.get_or_create_exchange("item-1").unwrap();
        assert!(created);
        assert_eq!(first.status, ExchangeStatus::Pending);
        assert_eq!(first.initiator_id, None);

        let (second, created) = db.get_or_create_exchange("item-1").unwrap();
        assert!(!created);
        assert_eq!(second, first);
        assert_eq!(db.list_exchanges().unwrap().len(), 1);
    }

    #[test]
    fn test_get_exchange_missing() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_exchange("nope"),
            Err(DbError::ExchangeNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.get_or_create_exchange("item-1").unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "UPDATE exchanges SET updated_at = 'yesterday' WHERE item_id = 'item-1'",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            db.get_exchange("item-1"),
            Err(DbError::Sqlite(rusqlite::Error::FromSqlConversionFailure(5, Type::Text, _)))
        ));
        assert!(db.list_exchanges().is_err());
    }

    #[test]
    fn test_commit_sets_participants_once() {
        let db = Database::open_in_memory().unwrap();
        db.get_or_create_exchange("item-1").unwrap();

        let record = db
            .commit_transition(&TransitionCommit {
                item_id: "item-1".into(),
                expected: ExchangeStatus::Pending,
                next: ExchangeStatus::Requested,
                initiator_id: Some("alice".into()),
                counterparty_id: Some("bob".into()),
                mark_item_unavailable: false,
            })
            .unwrap();
        assert_eq!(record.status, ExchangeStatus::Requested);
        assert_eq!(record.initiator_id.as_deref(), Some("alice"));

        let record = db
            .commit_transition(&TransitionCommit {
                item_id: "item-1".into(),
                expected: ExchangeStatus::Requested,
                next: ExchangeStatus::Agreed,
                initiator_id: None,
                counterparty_id: None,
                mark_item_unavailable: false,
            })
            .unwrap();
        assert_eq!(record.initiator_id.as_deref(), Some("alice"));
        assert_eq!(record.counterparty_id.as_deref(), Some("bob"));
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_commit_with_stale_expectation_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_item("item-1", "Desk lamp", "bob").unwrap();
        db.get_or_create_exchange("item-1").unwrap();

        // Record is still pending, so an agreed -> completed commit is stale
        let result = db.commit_transition(&completion("item-1"));
        assert!(matches!(result, Err(DbError::ExchangeConflict { .. })));

        assert!(db.get_item("item-1").unwrap().is_available());
        assert_eq!(
            db.get_exchange("item-1").unwrap().status,
            ExchangeStatus::Pending
        );
    }

    #[test]
    fn test_completion_flips_item_atomically() {
        let db = Database::open_in_memory().unwrap();
        db.create_item("item-1", "Desk lamp", "bob").unwrap();
        db.get_or_create_exchange("item-1").unwrap();
        force_status(&db, "item-1", ExchangeStatus::Agreed);

        let record = db.commit_transition(&completion("item-1")).unwrap();
        assert_eq!(record.status, ExchangeStatus::Completed);

        let item = db.get_item("item-1").unwrap();
        assert_eq!(item.status, ItemStatus::NotAvailable);
    }

    #[test]
    fn test_completion_rolls_back_without_catalog_item() {
        let db = Database::open_in_memory().unwrap();
        db.get_or_create_exchange("ghost").unwrap();
        force_status(&db, "ghost", ExchangeStatus::Agreed);

        let result = db.commit_transition(&completion("ghost"));
        assert!(matches!(result, Err(DbError::ItemNotFound(_))));

        // Status write was rolled back with the failed item update
        assert_eq!(
            db.get_exchange("ghost").unwrap().status,
            ExchangeStatus::Agreed
        );
    }

    #[test]
    fn test_duplicate_item() {
        let db = Database::open_in_memory().unwrap();
        db.create_item("item-1", "Desk lamp", "bob").unwrap();
        assert!(matches!(
            db.create_item("item-1", "Other", "carol"),
            Err(DbError::ItemExists(_))
        ));
        assert_eq!(db.item_owner("item-1").unwrap().as_deref(), Some("bob"));
        assert_eq!(db.item_owner("item-2").unwrap(), None);
    }

    #[test]
    fn test_messages_are_scoped_and_ordered() {
        let db = Database::open_in_memory().unwrap();

        db.append_message("item-1", "alice", "bob", "hi").unwrap();
        db.append_message("item-1", "bob", "alice", "hello").unwrap();
        db.append_message("item-1", "alice", "carol", "elsewhere").unwrap();
        db.append_message("item-2", "alice", "bob", "other item").unwrap();
        db.append_message("item-1", "alice", "bob", "still there?").unwrap();

        let thread = db.list_messages("item-1", "bob", "alice").unwrap();
        let contents: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello", "still there?"]);

        for pair in thread.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_conversation_inbox() {
        let db = Database::open_in_memory().unwrap();
        db.create_item("item-1", "Desk lamp", "bob").unwrap();

        db.append_message("item-1", "alice", "bob", "hi").unwrap();
        db.append_message("item-1", "bob", "alice", "hello").unwrap();
        db.append_message("item-9", "carol", "alice", "unlisted item").unwrap();

        let inbox = db.list_conversations("alice").unwrap();
        assert_eq!(inbox.len(), 2);

        // Newest thread first
        assert_eq!(inbox[0].item_id, "item-9");
        assert_eq!(inbox[0].other_user_id, "carol");
        assert_eq!(inbox[0].item_title, None);

        assert_eq!(inbox[1].other_user_id, "bob");
        assert_eq!(inbox[1].item_title.as_deref(), Some("Desk lamp"));
        assert_eq!(inbox[1].message_count, 2);
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swapdesk.db");

        {
            let db = Database::open(&path).unwrap();
            db.get_or_create_exchange("item-1").unwrap();
            db.append_message("item-1", "alice", "bob", "hi").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let (record, created) = db.get_or_create_exchange("item-1").unwrap();
        assert!(!created);
        assert_eq!(record.status, ExchangeStatus::Pending);
        assert_eq!(db.list_messages("item-1", "alice", "bob").unwrap().len(), 1);
    }
}
