//! In-process API for poller tests
//!
//! Drives the real router over an in-memory database, with scriptable
//! timeouts and failures.

use super::client::{ClientError, ExchangeApi};
use crate::api::{
    create_router, AppState, ErrorResponse, ExchangeStatusResponse, MessageResponse,
    NewMessageRequest, TransitionRequestBody, TransitionResponse,
};
use crate::db::{Database, Message};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Mutex;
use tower::ServiceExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Next transition never reaches the server
    TimeoutBeforeApply,
    /// Next transition is applied but the response is lost
    TimeoutAfterApply,
    /// Next message append fails
    FailNextMessage,
}

pub struct LoopbackApi {
    db: Database,
    router: Router,
    faults: Mutex<VecDeque<Fault>>,
    transition_calls: Mutex<u32>,
}

impl LoopbackApi {
    pub fn with_item(item_id: &str, owner_id: &str) -> Self {
        let db = Database::open_in_memory().unwrap();
        db.create_item(item_id, "Test item", owner_id).unwrap();
        Self {
            router: create_router(AppState::new(db.clone())),
            db,
            faults: Mutex::new(VecDeque::new()),
            transition_calls: Mutex::new(0),
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap().push_back(fault);
    }

    pub fn item_available(&self, item_id: &str) -> bool {
        self.db.get_item(item_id).unwrap().is_available()
    }

    pub fn message_count(&self) -> usize {
        let all = self.db.list_exchanges().unwrap();
        all.iter()
            .map(|record| {
                let Some(initiator) = record.initiator_id.as_deref() else {
                    return 0;
                };
                let counterparty = record.counterparty_id.as_deref().unwrap_or_default();
                self.db
                    .list_messages(&record.item_id, initiator, counterparty)
                    .unwrap()
                    .len()
            })
            .sum()
    }

    pub fn transition_calls(&self) -> u32 {
        *self.transition_calls.lock().unwrap()
    }

    fn take_fault(&self, wanted: &[Fault]) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap();
        let position = faults.iter().position(|f| wanted.contains(f))?;
        faults.remove(position)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        uri: &str,
        body: Option<String>,
    ) -> Result<T, ClientError> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json)),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|e| e.error)
                .unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ExchangeApi for LoopbackApi {
    async fn status(&self, item_id: &str) -> Result<ExchangeStatusResponse, ClientError> {
        self.call(Method::GET, &format!("/api/exchange/status/{item_id}"), None)
            .await
    }

    async fn transition(
        &self,
        request: &TransitionRequestBody,
    ) -> Result<TransitionResponse, ClientError> {
        *self.transition_calls.lock().unwrap() += 1;
        let fault = self.take_fault(&[Fault::TimeoutBeforeApply, Fault::TimeoutAfterApply]);
        if fault == Some(Fault::TimeoutBeforeApply) {
            return Err(ClientError::Timeout("injected".into()));
        }

        let body = serde_json::to_string(request).unwrap();
        let result = self
            .call(Method::POST, "/api/exchange/status", Some(body))
            .await;

        if fault == Some(Fault::TimeoutAfterApply) {
            return Err(ClientError::Timeout("injected".into()));
        }
        result
    }

    async fn messages(
        &self,
        item_id: &str,
        user_id: &str,
        other_user_id: &str,
    ) -> Result<Vec<Message>, ClientError> {
        self.call(
            Method::GET,
            &format!("/api/messages/{item_id}/{user_id}/{other_user_id}"),
            None,
        )
        .await
    }

    async fn send_message(&self, request: &NewMessageRequest) -> Result<Message, ClientError> {
        if self.take_fault(&[Fault::FailNextMessage]).is_some() {
            return Err(ClientError::Rejected {
                status: 500,
                message: "Server error".into(),
            });
        }
        let body = serde_json::to_string(request).unwrap();
        let created: MessageResponse = self
            .call(Method::POST, "/api/messages", Some(body))
            .await?;
        Ok(created.message)
    }
}
