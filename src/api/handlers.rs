//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ConversationListResponse, ConversationResponse, ConversationSummary, CreateContractRequest,
    ErrorResponse, RejectProposalRequest, SendMessageRequest, SendProposalRequest,
    StartConversationRequest,
};
use super::AppState;
use crate::db::Conversation;
use crate::deal::Participant;
use crate::store::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversation listing
        .route("/api/conversations", get(list_conversations))
        // Conversation creation
        .route("/api/conversations/new", post(start_conversation))
        // Conversation retrieval
        .route("/api/conversations/:id", get(get_conversation))
        // SSE streaming
        .route("/api/conversations/:id/stream", get(stream_conversation))
        // Message log
        .route("/api/conversations/:id/messages", post(add_message))
        // Proposal engine
        .route("/api/conversations/:id/proposal", post(send_proposal))
        .route(
            "/api/conversations/:id/proposal/approve",
            post(approve_proposal),
        )
        .route(
            "/api/conversations/:id/proposal/reject",
            post(reject_proposal),
        )
        // Contract formation and work lifecycle
        .route("/api/conversations/:id/contract", post(create_contract))
        .route("/api/conversations/:id/complete", post(mark_complete))
        .route("/api/conversations/:id/close", post(close_conversation))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Caller identity
// ============================================================

/// The authenticated caller, taken from headers set by the session provider
#[derive(Debug, Clone)]
pub struct Caller(pub Participant);

impl Caller {
    fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let id = header("x-user-id")
            .ok_or_else(|| AppError::Unauthorized("missing x-user-id header".to_string()))?;
        let name = header("x-user-name")
            .ok_or_else(|| AppError::Unauthorized("missing x-user-name header".to_string()))?;

        Ok(Caller(Participant::new(id, name, header("x-user-avatar"))))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_headers(&parts.headers)
    }
}

/// JSON body whose decode failures are reported as validation errors
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(AppError::from(rejection)),
        }
    }
}

// ============================================================
// Reads
// ============================================================

async fn list_conversations(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Json<ConversationListResponse> {
    let conversations = state
        .store
        .list_conversations_for(&caller.id)
        .iter()
        .map(|c| ConversationSummary::for_viewer(c, &caller.id))
        .collect();

    Json(ConversationListResponse { conversations })
}

async fn get_conversation(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = visible_conversation(&state, &caller, &id)?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn stream_conversation(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before the snapshot so nothing committed in between is lost.
    // Messages already in the snapshot are filtered out by sequence id.
    let broadcast_rx = state.store.subscribe();
    let conversation = visible_conversation(&state, &caller, &id)?;

    Ok(sse_stream(conversation, caller.id, broadcast_rx))
}

fn visible_conversation(
    state: &AppState,
    caller: &Participant,
    id: &str,
) -> Result<Conversation, AppError> {
    let conversation = state.store.get_conversation(id)?;
    if !conversation.is_participant(&caller.id) {
        return Err(AppError::Forbidden(format!(
            "{} is not a participant in conversation {id}",
            caller.id
        )));
    }
    Ok(conversation)
}

// ============================================================
// Writes
// ============================================================

async fn start_conversation(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ValidJson(req): ValidJson<StartConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), AppError> {
    let conversation = state
        .store
        .start_conversation(req.post, caller, req.counterpart)?;
    Ok((StatusCode::CREATED, Json(ConversationResponse { conversation })))
}

async fn add_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<SendMessageRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    respond(state.store.add_message(&id, &caller, req.text))
}

async fn send_proposal(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<SendProposalRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    respond(state.store.send_proposal(&id, &caller, req.amount, req.note))
}

async fn approve_proposal(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    respond(state.store.approve_proposal(&id, &caller))
}

async fn reject_proposal(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ConversationResponse>, AppError> {
    // The body is optional; an empty one means no reason
    let reason = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RejectProposalRequest>(&body)
            .map_err(|e| AppError::InvalidBody(e.to_string()))?
            .reason
    };
    respond(state.store.reject_proposal(&id, &caller, reason))
}

async fn create_contract(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<CreateContractRequest>,
) -> Result<Json<ConversationResponse>, AppError> {
    respond(state.store.create_contract(&id, &caller, req.final_amount))
}

async fn mark_complete(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    respond(state.store.mark_complete(&id, &caller))
}

async fn close_conversation(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    respond(state.store.close_conversation(&id, &caller))
}

fn respond(
    result: Result<Conversation, StoreError>,
) -> Result<Json<ConversationResponse>, AppError> {
    let conversation = result?;
    Ok(Json(ConversationResponse { conversation }))
}

async fn get_version() -> &'static str {
    concat!("dealflow ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Forbidden(String),
    InvalidBody(String),
    Store(StoreError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.body_text())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "permission", msg),
            AppError::InvalidBody(msg) => (
                StatusCode::BAD_REQUEST,
                "validation",
                format!("Invalid request body: {msg}"),
            ),
            AppError::Store(e) => {
                let status = match e.kind() {
                    "not_found" => StatusCode::NOT_FOUND,
                    "permission" => StatusCode::FORBIDDEN,
                    "invalid_state" | "conversation_closed" => StatusCode::CONFLICT,
                    "validation" => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %e, "Request failed");
                }
                (status, e.kind(), e.to_string())
            }
        };

        let body = Json(ErrorResponse::new(message, kind));
        (status, body).into_response()
    }
}
