//! HTTP access to the exchange server

use crate::api::{
    ErrorResponse, ExchangeStatusResponse, MessageResponse, NewMessageRequest,
    TransitionRequestBody, TransitionResponse,
};
use crate::db::Message;
use crate::state_machine::Action;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No response observed in time. The request may or may not have been applied.
    #[error("Request timed out, outcome unknown: {0}")]
    Timeout(String),
    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("{} is not available right now", .0.label())]
    NotAvailable(Action),
}

impl ClientError {
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Rejected { status: 409, .. })
    }
}

/// The server surface the poller depends on
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn status(&self, item_id: &str) -> Result<ExchangeStatusResponse, ClientError>;

    async fn transition(
        &self,
        request: &TransitionRequestBody,
    ) -> Result<TransitionResponse, ClientError>;

    async fn messages(
        &self,
        item_id: &str,
        user_id: &str,
        other_user_id: &str,
    ) -> Result<Vec<Message>, ClientError>;

    async fn send_message(&self, request: &NewMessageRequest) -> Result<Message, ClientError>;
}

#[async_trait]
impl<T: ExchangeApi + ?Sized> ExchangeApi for Arc<T> {
    async fn status(&self, item_id: &str) -> Result<ExchangeStatusResponse, ClientError> {
        (**self).status(item_id).await
    }

    async fn transition(
        &self,
        request: &TransitionRequestBody,
    ) -> Result<TransitionResponse, ClientError> {
        (**self).transition(request).await
    }

    async fn messages(
        &self,
        item_id: &str,
        user_id: &str,
        other_user_id: &str,
    ) -> Result<Vec<Message>, ClientError> {
        (**self).messages(item_id, user_id, other_user_id).await
    }

    async fn send_message(&self, request: &NewMessageRequest) -> Result<Message, ClientError> {
        (**self).send_message(request).await
    }
}

/// `reqwest` client for a running swapdesk server
pub struct HttpExchangeApi {
    client: Client,
    base_url: Url,
}

impl HttpExchangeApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::Transport(format!("Invalid server URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "Server URL cannot carry a path: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Base URL with percent-encoded path segments appended
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn classify(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(e.to_string())
    } else if e.is_decode() {
        ClientError::Decode(e.to_string())
    } else {
        ClientError::Transport(e.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(classify)?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Decode(format!("{e} - body: {body}")))
}

#[async_trait]
impl ExchangeApi for HttpExchangeApi {
    async fn status(&self, item_id: &str) -> Result<ExchangeStatusResponse, ClientError> {
        let url = self.endpoint(&["api", "exchange", "status", item_id]);
        let response = self.client.get(url).send().await.map_err(classify)?;
        read_json(response).await
    }

    async fn transition(
        &self,
        request: &TransitionRequestBody,
    ) -> Result<TransitionResponse, ClientError> {
        let url = self.endpoint(&["api", "exchange", "status"]);
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        read_json(response).await
    }

    async fn messages(
        &self,
        item_id: &str,
        user_id: &str,
        other_user_id: &str,
    ) -> Result<Vec<Message>, ClientError> {
        let url = self.endpoint(&["api", "messages", item_id, user_id, other_user_id]);
        let response = self.client.get(url).send().await.map_err(classify)?;
        read_json(response).await
    }

    async fn send_message(&self, request: &NewMessageRequest) -> Result<Message, ClientError> {
        let url = self.endpoint(&["api", "messages"]);
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        let created: MessageResponse = read_json(response).await?;
        Ok(created.message)
    }
}
