//! Negotiation engine
//!
//! Validates requested status changes against the state machine, fills in
//! missing exchange records, and commits accepted transitions together with
//! the item availability side effect.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::db::{ExchangeRecord, ExchangeStatus, TransitionCommit};
use crate::state_machine::{transition, Action, Effect, Event, TransitionError};
use thiserror::Error;

/// Engine wired to the sqlite database
pub type ProductionEngine = NegotiationEngine<DatabaseStorage>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Exchange for {item_id} changed concurrently (expected {expected})")]
    Conflict {
        item_id: String,
        expected: ExchangeStatus,
    },
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("Storage error: {0}")]
    Store(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { item_id, expected } => EngineError::Conflict { item_id, expected },
            StoreError::ItemNotFound(id) => EngineError::ItemNotFound(id),
            StoreError::Backend(msg) => EngineError::Store(msg),
        }
    }
}

/// A participant asking to move an item's negotiation to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub item_id: String,
    pub actor_id: String,
    pub target: ExchangeStatus,
    /// Who the request is addressed to. Defaults to the item owner.
    pub counterparty_id: Option<String>,
}

/// An accepted and committed transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub record: ExchangeRecord,
    pub previous: ExchangeStatus,
    /// Chat line the caller should append to the item thread
    pub narration: String,
}

pub struct NegotiationEngine<S> {
    storage: S,
}

impl<S: NegotiationStorage> NegotiationEngine<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Current record for an item. Never "not found": a `pending` record is
    /// created on first access, flagged by the returned `bool`.
    pub async fn get_status(&self, item_id: &str) -> Result<(ExchangeRecord, bool), EngineError> {
        Ok(self.storage.get_or_create(item_id).await?)
    }

    /// Validate and commit a transition.
    ///
    /// Illegal or unauthorized requests leave state untouched. A request that
    /// loses a race against another commit gets `EngineError::Conflict`.
    pub async fn request_transition(
        &self,
        request: &TransitionRequest,
    ) -> Result<TransitionOutcome, EngineError> {
        let action = Action::for_target(request.target)
            .ok_or(TransitionError::InvalidTarget(request.target))?;

        let (record, _) = self.storage.get_or_create(&request.item_id).await?;

        let counterparty_id = if action == Action::Request && record.status == ExchangeStatus::Pending {
            match &request.counterparty_id {
                Some(id) => Some(id.clone()),
                None => self.storage.owner_of(&request.item_id).await?,
            }
        } else {
            None
        };

        let event = Event::new(action, request.actor_id.clone(), counterparty_id);
        let result = transition(record.status, &record.participants(), event).map_err(|e| {
            tracing::info!(
                item_id = %request.item_id,
                actor_id = %request.actor_id,
                status = %record.status,
                target = %request.target,
                error = %e,
                "Exchange transition rejected"
            );
            e
        })?;

        let mut commit = TransitionCommit {
            item_id: request.item_id.clone(),
            expected: record.status,
            next: result.new_status,
            initiator_id: None,
            counterparty_id: None,
            mark_item_unavailable: false,
        };
        for effect in &result.effects {
            match effect {
                Effect::FixParticipants {
                    initiator_id,
                    counterparty_id,
                } => {
                    commit.initiator_id = Some(initiator_id.clone());
                    commit.counterparty_id = Some(counterparty_id.clone());
                }
                Effect::MarkItemUnavailable => commit.mark_item_unavailable = true,
                // Appended by the acting client, outside the commit
                Effect::Narrate { .. } => {}
            }
        }

        let committed = self.storage.commit(&commit).await.map_err(|e| {
            tracing::warn!(
                item_id = %request.item_id,
                actor_id = %request.actor_id,
                from = %record.status,
                to = %result.new_status,
                error = %e,
                "Exchange transition commit failed"
            );
            EngineError::from(e)
        })?;

        tracing::info!(
            item_id = %request.item_id,
            actor_id = %request.actor_id,
            from = %record.status,
            to = %committed.status,
            item_unavailable = commit.mark_item_unavailable,
            "Exchange transition committed"
        );

        Ok(TransitionOutcome {
            record: committed,
            previous: record.status,
            narration: result.narration().unwrap_or_default().to_string(),
        })
    }

    /// All exchange records, most recently changed first
    pub async fn history(&self) -> Result<Vec<ExchangeRecord>, EngineError> {
        Ok(self.storage.list().await?)
    }
}
