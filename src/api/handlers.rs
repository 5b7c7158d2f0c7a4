//! HTTP request handlers

use super::types::{
    ConversationListResponse, CreateItemRequest, ErrorResponse, ExchangeHistoryResponse,
    ExchangeStatusResponse, ItemResponse, MessageResponse, NewMessageRequest,
    TransitionRequestBody, TransitionResponse,
};
use super::AppState;
use crate::db::{DbError, ExchangeStatus};
use crate::engine::{EngineError, TransitionRequest};
use crate::state_machine::TransitionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Negotiation
        .route("/api/exchange/status/:item_id", get(get_exchange_status))
        .route("/api/exchange/status", post(request_transition))
        .route("/api/exchange/history", get(exchange_history))
        // Messages
        .route("/api/messages", post(send_message))
        .route(
            "/api/messages/:item_id/:user_id/:other_user_id",
            get(list_messages),
        )
        .route("/api/conversations/:user_id", get(list_conversations))
        // Item catalog boundary
        .route("/api/items", post(create_item))
        .route("/api/items/:id", get(get_item))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Negotiation
// ============================================================

/// 201 when this read created the record, 200 otherwise
async fn get_exchange_status(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<(StatusCode, Json<ExchangeStatusResponse>), AppError> {
    let (record, created) = state.engine.get_status(&item_id).await?;
    let code = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((code, Json(record.into())))
}

async fn request_transition(
    State(state): State<AppState>,
    Json(req): Json<TransitionRequestBody>,
) -> Result<Json<TransitionResponse>, AppError> {
    require("item_id", &req.item_id)?;
    require("actor_id", &req.actor_id)?;
    let target: ExchangeStatus = req
        .status
        .parse()
        .map_err(|e: crate::state_machine::UnknownStatus| AppError::BadRequest(e.to_string()))?;

    let outcome = state
        .engine
        .request_transition(&TransitionRequest {
            item_id: req.item_id,
            actor_id: req.actor_id,
            target,
            counterparty_id: req.counterparty_id.filter(|id| !id.trim().is_empty()),
        })
        .await?;

    Ok(Json(TransitionResponse {
        item_id: outcome.record.item_id,
        status: outcome.record.status,
        previous: outcome.previous,
        narration: outcome.narration,
        updated_at: outcome.record.updated_at,
    }))
}

async fn exchange_history(
    State(state): State<AppState>,
) -> Result<Json<ExchangeHistoryResponse>, AppError> {
    let exchanges = state.engine.history().await?;
    Ok(Json(ExchangeHistoryResponse { exchanges }))
}

// ============================================================
// Messages
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<NewMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    require("item_id", &req.item_id)?;
    require("sender_id", &req.sender_id)?;
    require("receiver_id", &req.receiver_id)?;
    require("content", &req.content)?;

    let message = state
        .db
        .append_message(&req.item_id, &req.sender_id, &req.receiver_id, &req.content)?;

    tracing::debug!(
        item_id = %message.item_id,
        sender_id = %message.sender_id,
        message_id = message.id,
        "Message appended"
    );

    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

async fn list_messages(
    State(state): State<AppState>,
    Path((item_id, user_id, other_user_id)): Path<(String, String, String)>,
) -> Result<Json<Vec<crate::db::Message>>, AppError> {
    let messages = state.db.list_messages(&item_id, &user_id, &other_user_id)?;
    Ok(Json(messages))
}

async fn list_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state.db.list_conversations(&user_id)?;
    Ok(Json(ConversationListResponse { conversations }))
}

// ============================================================
// Item Catalog
// ============================================================

async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    require("title", &req.title)?;
    require("owner_id", &req.owner_id)?;

    let id = req
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let item = state.db.create_item(&id, req.title.trim(), &req.owner_id)?;

    tracing::info!(item_id = %item.id, owner_id = %item.owner_id, "Item registered");
    Ok((StatusCode::CREATED, Json(ItemResponse { item })))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, AppError> {
    let item = state.db.get_item(&id)?;
    Ok(Json(ItemResponse { item }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("swapdesk ", env!("CARGO_PKG_VERSION"))
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Transition(t) if t.is_authorization() => AppError::Forbidden(t.to_string()),
            EngineError::Transition(
                t @ (TransitionError::MissingCounterparty | TransitionError::InvalidTarget(_)),
            ) => AppError::BadRequest(t.to_string()),
            EngineError::Transition(t) => AppError::Conflict(t.to_string()),
            e @ EngineError::Conflict { .. } => AppError::Conflict(e.to_string()),
            e @ EngineError::ItemNotFound(_) => AppError::NotFound(e.to_string()),
            EngineError::Store(msg) => {
                tracing::error!(error = %msg, "Exchange store failure");
                AppError::Internal("Server error".to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ItemNotFound(_) | DbError::ExchangeNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            DbError::ItemExists(_) | DbError::ExchangeConflict { .. } => {
                AppError::Conflict(e.to_string())
            }
            DbError::Sqlite(err) => {
                tracing::error!(error = %err, "Database failure");
                AppError::Internal("Server error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
