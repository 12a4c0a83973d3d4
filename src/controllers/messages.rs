use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

use crate::{
    controllers::{forwarded, invalid_payload},
    error::{AppError, AppResult},
    middleware::AuthSession,
    models::{EmailableRequest, MessagePayload},
    services::wikimedia::Emailability,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", get(list_messages).post(send_message))
        .route("/messages/check_emailable", post(check_emailable))
}

// GET /api/messages?limit=&offset=
async fn list_messages(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(query): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let params = forwarded(query);
    let messages = state
        .backend
        .get("/message/", Some(&session.authorization()), &params)
        .await?;
    Ok(Json(messages))
}

// POST /api/messages
async fn send_message(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(message): Json<MessagePayload>,
) -> AppResult<impl IntoResponse> {
    message.validate().map_err(invalid_payload)?;
    let sent = state
        .backend
        .post("/message/", Some(&session.authorization()), &message)
        .await?;
    tracing::info!("User {} sent a message to {}", session.user_id(), message.receiver);
    Ok((StatusCode::CREATED, Json(sent)))
}

// POST /api/messages/check_emailable
async fn check_emailable(
    State(state): State<Arc<AppState>>,
    _session: AuthSession,
    Json(req): Json<EmailableRequest>,
) -> AppResult<Json<Emailability>> {
    if req.sender.trim().is_empty() || req.receiver.trim().is_empty() {
        return Err(AppError::validation(
            "sender and receiver are required",
            Value::Null,
        ));
    }
    let result = state
        .wikimedia
        .check_emailable(&req.sender, &req.receiver)
        .await
        .map_err(|e| AppError::transport("Failed to check emailable users", e))?;
    Ok(Json(result))
}
