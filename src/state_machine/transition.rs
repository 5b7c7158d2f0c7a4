//! Pure status transition function
//!
//! | From        | Event         | Actor                       | To          |
//! |-------------|---------------|-----------------------------|-------------|
//! | `pending`   | request       | anyone but the counterparty | `requested` |
//! | `requested` | accept        | counterparty                | `agreed`    |
//! | `requested` | decline       | counterparty                | `declined`  |
//! | `agreed`    | mark received | initiator                   | `completed` |
//!
//! The counterparty is the one named in the request, else the item owner, so
//! an owner may initiate when another counterparty is named.
//!
//! Once the first request has fixed the participants, actions are checked
//! against the caller's role before anything else: request and mark received
//! belong to the initiator, accept and decline to the counterparty.
//! `declined` and `completed` are terminal.

use super::{Action, Effect, Event, ExchangeStatus, Participants, Role};
use thiserror::Error;

/// Result of a status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_status: ExchangeStatus,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(status: ExchangeStatus) -> Self {
        Self {
            new_status: status,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn narration(&self) -> Option<&str> {
        self.effects.iter().find_map(|e| match e {
            Effect::Narrate { content } => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn marks_item_unavailable(&self) -> bool {
        self.effects.contains(&Effect::MarkItemUnavailable)
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Exchange is already {0}")]
    AlreadyInState(ExchangeStatus),
    #[error("Exchange is {0}; no further transitions are allowed")]
    Terminal(ExchangeStatus),
    #[error("Cannot {action:?} an exchange that is {from}")]
    InvalidTransition { from: ExchangeStatus, action: Action },
    #[error("{0} is not a transition target")]
    InvalidTarget(ExchangeStatus),
    #[error("User {actor_id} may not {action:?} this exchange")]
    Unauthorized { actor_id: String, action: Action },
    #[error("User {0} cannot request an exchange with themselves")]
    SelfExchange(String),
    #[error("No counterparty known for this exchange request")]
    MissingCounterparty,
}

impl TransitionError {
    /// Rejections caused by who is asking rather than by the current status
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            TransitionError::Unauthorized { .. } | TransitionError::SelfExchange(_)
        )
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    status: ExchangeStatus,
    participants: &Participants,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let action = event.action();

    if participants.initiator_id.is_some() {
        let role = participants.role_of(event.actor_id());
        if role != required_role(action) {
            return Err(TransitionError::Unauthorized {
                actor_id: event.actor_id().to_string(),
                action,
            });
        }
    }

    // Replays leave state alone and produce no side effects
    if action.target() == status {
        return Err(TransitionError::AlreadyInState(status));
    }
    if status.is_terminal() {
        return Err(TransitionError::Terminal(status));
    }

    match (status, event) {
        (
            ExchangeStatus::Pending,
            Event::Request {
                actor_id,
                counterparty_id,
            },
        ) => {
            let counterparty_id = counterparty_id.ok_or(TransitionError::MissingCounterparty)?;
            if counterparty_id == actor_id {
                return Err(TransitionError::SelfExchange(actor_id));
            }
            Ok(TransitionResult::new(ExchangeStatus::Requested)
                .with_effect(Effect::FixParticipants {
                    initiator_id: actor_id,
                    counterparty_id,
                })
                .with_effect(Effect::narrate(Action::Request.narration())))
        }

        (ExchangeStatus::Requested, Event::Accept { actor_id } | Event::Decline { actor_id }) => {
            if participants.role_of(&actor_id) != Role::Counterparty {
                return Err(TransitionError::Unauthorized { actor_id, action });
            }
            Ok(TransitionResult::new(action.target())
                .with_effect(Effect::narrate(action.narration())))
        }

        (ExchangeStatus::Agreed, Event::MarkReceived { actor_id }) => {
            if participants.role_of(&actor_id) != Role::Initiator {
                return Err(TransitionError::Unauthorized { actor_id, action });
            }
            Ok(TransitionResult::new(ExchangeStatus::Completed)
                .with_effect(Effect::MarkItemUnavailable)
                .with_effect(Effect::narrate(action.narration())))
        }

        (from, _) => Err(TransitionError::InvalidTransition { from, action }),
    }
}

fn required_role(action: Action) -> Role {
    match action {
        Action::Request | Action::MarkReceived => Role::Initiator,
        Action::Accept | Action::Decline => Role::Counterparty,
    }
}
