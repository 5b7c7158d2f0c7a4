//! Events that can occur in a negotiation

use super::state::ExchangeStatus;
use serde::{Deserialize, Serialize};

/// A negotiation step, independent of who performs it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Request,
    Accept,
    Decline,
    MarkReceived,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Request,
        Action::Accept,
        Action::Decline,
        Action::MarkReceived,
    ];

    /// Status this action moves the negotiation into
    pub fn target(self) -> ExchangeStatus {
        match self {
            Action::Request => ExchangeStatus::Requested,
            Action::Accept => ExchangeStatus::Agreed,
            Action::Decline => ExchangeStatus::Declined,
            Action::MarkReceived => ExchangeStatus::Completed,
        }
    }

    /// Inverse of [`Action::target`]. `pending` is never a target.
    pub fn for_target(status: ExchangeStatus) -> Option<Self> {
        match status {
            ExchangeStatus::Pending => None,
            ExchangeStatus::Requested => Some(Action::Request),
            ExchangeStatus::Agreed => Some(Action::Accept),
            ExchangeStatus::Declined => Some(Action::Decline),
            ExchangeStatus::Completed => Some(Action::MarkReceived),
        }
    }

    /// Chat line announcing this action in the item's thread
    pub fn narration(self) -> &'static str {
        match self {
            Action::Request => "🔄 I would like to exchange this item.",
            Action::Accept => "✅ I agree to exchange this item.",
            Action::Decline => "❌ I do not want to exchange this item.",
            Action::MarkReceived => "📦 I have received this item.",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Request => "Request Exchange",
            Action::Accept => "Accept",
            Action::Decline => "Decline",
            Action::MarkReceived => "Mark Received",
        }
    }
}

/// Events that trigger status transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Request {
        actor_id: String,
        /// Resolved by the engine (explicit or item owner) before the transition runs
        counterparty_id: Option<String>,
    },
    Accept {
        actor_id: String,
    },
    Decline {
        actor_id: String,
    },
    MarkReceived {
        actor_id: String,
    },
}

impl Event {
    pub fn new(action: Action, actor_id: impl Into<String>, counterparty_id: Option<String>) -> Self {
        let actor_id = actor_id.into();
        match action {
            Action::Request => Event::Request {
                actor_id,
                counterparty_id,
            },
            Action::Accept => Event::Accept { actor_id },
            Action::Decline => Event::Decline { actor_id },
            Action::MarkReceived => Event::MarkReceived { actor_id },
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Event::Request { .. } => Action::Request,
            Event::Accept { .. } => Action::Accept,
            Event::Decline { .. } => Action::Decline,
            Event::MarkReceived { .. } => Action::MarkReceived,
        }
    }

    pub fn actor_id(&self) -> &str {
        match self {
            Event::Request { actor_id, .. }
            | Event::Accept { actor_id }
            | Event::Decline { actor_id }
            | Event::MarkReceived { actor_id } => actor_id,
        }
    }
}
