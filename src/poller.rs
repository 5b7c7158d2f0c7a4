//! Client poller
//!
//! Holds an explicit session `(item, me, them)`, polls the message thread and
//! the exchange status, and exposes the one control set the caller may use.
//! The server is authoritative: every poll replaces local state, and actions
//! whose outcome is unknown are left for the next poll to reconcile.

pub mod client;
pub mod render;

#[cfg(test)]
pub mod testing;

pub use client::{ClientError, ExchangeApi, HttpExchangeApi};
pub use render::{available_actions, Controls};

use crate::api::{ExchangeStatusResponse, NewMessageRequest, TransitionRequestBody};
use crate::db::Message;
use crate::state_machine::{Action, ExchangeStatus, Role};

/// Who is looking at which conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub item_id: String,
    pub user_id: String,
    pub other_user_id: String,
}

impl Session {
    pub fn new(
        item_id: impl Into<String>,
        user_id: impl Into<String>,
        other_user_id: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: user_id.into(),
            other_user_id: other_user_id.into(),
        }
    }
}

/// Everything a client renders after a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub status: ExchangeStatus,
    pub role: Role,
    pub controls: Controls,
    pub lines: Vec<String>,
}

impl View {
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&render::status_line(self.status));
        if let Some(controls) = render::controls_line(self.controls) {
            out.push('\n');
            out.push_str(&controls);
        }
        out
    }
}

pub struct Poller<A> {
    api: A,
    session: Session,
    status: Option<ExchangeStatusResponse>,
    messages: Vec<Message>,
    /// Narrations appended locally and not yet seen in a poll
    optimistic: Vec<String>,
}

impl<A: ExchangeApi> Poller<A> {
    pub fn new(api: A, session: Session) -> Self {
        Self {
            api,
            session,
            status: None,
            messages: Vec::new(),
            optimistic: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One poll cycle: thread first, then status.
    ///
    /// On failure the previous view is kept unchanged.
    pub async fn poll(&mut self) -> Result<View, ClientError> {
        let messages = self
            .api
            .messages(
                &self.session.item_id,
                &self.session.user_id,
                &self.session.other_user_id,
            )
            .await?;
        let status = self.api.status(&self.session.item_id).await?;

        self.messages = messages;
        self.status = Some(status);
        self.optimistic.clear();
        Ok(self.view())
    }

    pub fn view(&self) -> View {
        let (status, initiator, counterparty) = match &self.status {
            Some(s) => (
                s.status,
                s.initiator_id.as_deref(),
                s.counterparty_id.as_deref(),
            ),
            None => (ExchangeStatus::Pending, None, None),
        };

        let initiator = render::infer_initiator(initiator, &self.messages);
        let role = render::role_for(
            &self.session.user_id,
            &self.session.other_user_id,
            initiator.as_deref(),
            counterparty,
        );

        let user_id = &self.session.user_id;
        let lines = self
            .messages
            .iter()
            .map(|m| render::transcript_line(user_id, &m.sender_id, &m.content))
            .chain(
                self.optimistic
                    .iter()
                    .map(|content| render::transcript_line(user_id, user_id, content)),
            )
            .collect();

        View {
            status,
            role,
            controls: available_actions(status, role),
            lines,
        }
    }

    /// Ask the server for the transition behind `action`, then narrate it.
    ///
    /// Only actions in the current control set are sent. A rejection or
    /// timeout leaves the displayed status alone until the next poll. The
    /// narration is best effort: its failure is logged and the transition
    /// stands.
    pub async fn perform(&mut self, action: Action) -> Result<ExchangeStatus, ClientError> {
        if !self.view().controls.allows(action) {
            return Err(ClientError::NotAvailable(action));
        }

        let request = TransitionRequestBody {
            item_id: self.session.item_id.clone(),
            actor_id: self.session.user_id.clone(),
            status: action.target().to_string(),
            counterparty_id: (action == Action::Request)
                .then(|| self.session.other_user_id.clone()),
        };

        let response = match self.api.transition(&request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_unknown_outcome() {
                    tracing::warn!(
                        item_id = %self.session.item_id,
                        action = ?action,
                        error = %e,
                        "Transition outcome unknown; waiting for next poll"
                    );
                }
                return Err(e);
            }
        };

        if let Some(status) = self.status.as_mut() {
            status.status = response.status;
            status.updated_at = response.updated_at;
            if action == Action::Request {
                status.initiator_id = Some(self.session.user_id.clone());
                status.counterparty_id = Some(self.session.other_user_id.clone());
            }
        }

        let narration = if response.narration.is_empty() {
            action.narration().to_string()
        } else {
            response.narration
        };
        let message = NewMessageRequest {
            item_id: self.session.item_id.clone(),
            sender_id: self.session.user_id.clone(),
            receiver_id: self.session.other_user_id.clone(),
            content: narration.clone(),
        };
        if let Err(e) = self.api.send_message(&message).await {
            tracing::warn!(
                item_id = %self.session.item_id,
                status = %response.status,
                error = %e,
                "Narration failed; transition stands"
            );
        }
        self.optimistic.push(narration);

        Ok(response.status)
    }

    /// Send a plain chat line
    pub async fn say(&mut self, content: &str) -> Result<(), ClientError> {
        let message = self
            .api
            .send_message(&NewMessageRequest {
                item_id: self.session.item_id.clone(),
                sender_id: self.session.user_id.clone(),
                receiver_id: self.session.other_user_id.clone(),
                content: content.to_string(),
            })
            .await?;
        self.messages.push(message);
        Ok(())
    }
}
