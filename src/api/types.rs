//! API request and response types
//!
//! Shared by the server handlers and the watcher's HTTP client.

use crate::db::{ConversationSummary, ExchangeRecord, ExchangeStatus, Item, Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to move an item's negotiation to a new status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequestBody {
    #[serde(alias = "itemId")]
    pub item_id: String,
    #[serde(alias = "actorId", alias = "userId")]
    pub actor_id: String,
    /// Target status, e.g. `"requested"`
    pub status: String,
    #[serde(default, alias = "counterpartyId", skip_serializing_if = "Option::is_none")]
    pub counterparty_id: Option<String>,
}

/// Request to append a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageRequest {
    #[serde(alias = "itemId")]
    pub item_id: String,
    #[serde(alias = "senderId")]
    pub sender_id: String,
    #[serde(alias = "receiverId")]
    pub receiver_id: String,
    pub content: String,
}

/// Request to register an item in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(alias = "ownerId")]
    pub owner_id: String,
}

/// Current negotiation status of an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeStatusResponse {
    pub item_id: String,
    pub status: ExchangeStatus,
    pub initiator_id: Option<String>,
    pub counterparty_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ExchangeRecord> for ExchangeStatusResponse {
    fn from(record: ExchangeRecord) -> Self {
        Self {
            item_id: record.item_id,
            status: record.status,
            initiator_id: record.initiator_id,
            counterparty_id: record.counterparty_id,
            updated_at: record.updated_at,
        }
    }
}

/// Response for an accepted transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub item_id: String,
    pub status: ExchangeStatus,
    pub previous: ExchangeStatus,
    /// Chat line announcing the transition
    pub narration: String,
    pub updated_at: DateTime<Utc>,
}

/// Response with every exchange record
#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangeHistoryResponse {
    pub exchanges: Vec<ExchangeRecord>,
}

/// Response for a stored message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: Message,
}

/// Response with a user's threads
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// Response with a single item
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemResponse {
    pub item: Item,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
