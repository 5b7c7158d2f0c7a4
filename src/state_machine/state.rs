//! Negotiation status and participant types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status of the exchange negotiation for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// Nothing has happened yet. Exists so status reads never come back empty.
    #[default]
    Pending,
    Requested,
    Agreed,
    Declined,
    Completed,
}

impl ExchangeStatus {
    pub const ALL: [ExchangeStatus; 5] = [
        ExchangeStatus::Pending,
        ExchangeStatus::Requested,
        ExchangeStatus::Agreed,
        ExchangeStatus::Declined,
        ExchangeStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Requested => "requested",
            ExchangeStatus::Agreed => "agreed",
            ExchangeStatus::Declined => "declined",
            ExchangeStatus::Completed => "completed",
        }
    }

    /// Terminal statuses accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeStatus::Declined | ExchangeStatus::Completed)
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown exchange status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ExchangeStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(ExchangeStatus::Pending),
            "requested" => Ok(ExchangeStatus::Requested),
            "agreed" => Ok(ExchangeStatus::Agreed),
            "declined" => Ok(ExchangeStatus::Declined),
            "completed" => Ok(ExchangeStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Which side of the negotiation an actor is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Counterparty,
    /// Neither participant, or participants not fixed yet
    Outsider,
}

/// The two participants of a negotiation, fixed by the first request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participants {
    pub initiator_id: Option<String>,
    pub counterparty_id: Option<String>,
}

impl Participants {
    pub fn new(initiator_id: Option<String>, counterparty_id: Option<String>) -> Self {
        Self {
            initiator_id,
            counterparty_id,
        }
    }

    pub fn role_of(&self, actor_id: &str) -> Role {
        if self.initiator_id.as_deref() == Some(actor_id) {
            Role::Initiator
        } else if self.counterparty_id.as_deref() == Some(actor_id) {
            Role::Counterparty
        } else {
            Role::Outsider
        }
    }
}
