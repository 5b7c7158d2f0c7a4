//! Pure render logic: who the caller is and what they may do

use crate::db::Message;
use crate::state_machine::{Action, ExchangeStatus, Participants, Role};

/// The single set of controls shown to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controls {
    Request,
    AcceptOrDecline,
    MarkReceived,
    None,
}

impl Controls {
    pub fn actions(self) -> &'static [Action] {
        match self {
            Controls::Request => &[Action::Request],
            Controls::AcceptOrDecline => &[Action::Accept, Action::Decline],
            Controls::MarkReceived => &[Action::MarkReceived],
            Controls::None => &[],
        }
    }

    pub fn allows(self, action: Action) -> bool {
        self.actions().contains(&action)
    }
}

/// Exactly one control set for a status and the caller's role
pub fn available_actions(status: ExchangeStatus, role: Role) -> Controls {
    match (status, role) {
        (ExchangeStatus::Pending, Role::Initiator) => Controls::Request,
        (ExchangeStatus::Requested, Role::Counterparty) => Controls::AcceptOrDecline,
        (ExchangeStatus::Agreed, Role::Initiator) => Controls::MarkReceived,
        _ => Controls::None,
    }
}

/// Initiator for display purposes.
///
/// The server's fixed `initiator_id` wins; before the first request the
/// sender of the earliest message stands in.
pub fn infer_initiator(server_initiator: Option<&str>, transcript: &[Message]) -> Option<String> {
    server_initiator
        .map(str::to_string)
        .or_else(|| transcript.first().map(|m| m.sender_id.clone()))
}

/// Role of `user_id` in a conversation with `other_user_id`.
///
/// With no initiator known yet (no request, empty thread) the caller is the
/// would-be initiator.
pub fn role_for(
    user_id: &str,
    other_user_id: &str,
    initiator: Option<&str>,
    counterparty: Option<&str>,
) -> Role {
    let Some(initiator) = initiator else {
        return Role::Initiator;
    };
    let counterparty = counterparty.unwrap_or(if initiator == user_id {
        other_user_id
    } else {
        user_id
    });
    Participants::new(Some(initiator.to_string()), Some(counterparty.to_string())).role_of(user_id)
}

/// One line per message, from the caller's point of view
pub fn transcript_line(user_id: &str, sender_id: &str, content: &str) -> String {
    if sender_id == user_id {
        format!("You: {content}")
    } else {
        format!("Them: {content}")
    }
}

pub fn status_line(status: ExchangeStatus) -> String {
    format!("Exchange status: {status}")
}

/// Control hints as typed on the watcher prompt
pub fn controls_line(controls: Controls) -> Option<String> {
    let hints: Vec<String> = controls
        .actions()
        .iter()
        .map(|action| format!("[{}] {}", command_for(*action), action.label()))
        .collect();
    (!hints.is_empty()).then(|| hints.join("  "))
}

pub fn command_for(action: Action) -> &'static str {
    match action {
        Action::Request => "request",
        Action::Accept => "accept",
        Action::Decline => "decline",
        Action::MarkReceived => "received",
    }
}

pub fn parse_command(input: &str) -> Option<Action> {
    Action::ALL
        .into_iter()
        .find(|action| command_for(*action) == input.trim())
}
