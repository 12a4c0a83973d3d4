use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::{
    controllers::{forwarded, invalid_payload},
    error::AppResult,
    middleware::AuthSession,
    models::EventPayload,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

// GET /api/events?limit=&offset=&organization=&related_skills=
async fn list_events(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(query): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let events = state
        .backend
        .get("/events/", Some(&session.authorization()), &forwarded(query))
        .await?;
    Ok(Json(events))
}

// GET /api/events/{id}
async fn get_event(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let event = state
        .backend
        .get(&format!("/events/{id}/"), Some(&session.authorization()), &[])
        .await?;
    Ok(Json(event))
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(event): Json<EventPayload>,
) -> AppResult<impl IntoResponse> {
    event.validate().map_err(invalid_payload)?;
    let created = state
        .backend
        .post("/events/", Some(&session.authorization()), &event)
        .await?;
    tracing::info!("Event '{}' created by user {}", event.name, session.user_id());
    Ok((StatusCode::CREATED, Json(created)))
}

// PUT /api/events/{id}
async fn update_event(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
    Json(event): Json<EventPayload>,
) -> AppResult<Json<Value>> {
    event.validate().map_err(invalid_payload)?;
    let saved = state
        .backend
        .put(&format!("/events/{id}/"), Some(&session.authorization()), &event)
        .await?;
    Ok(Json(saved))
}

// DELETE /api/events/{id}
async fn delete_event(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    state
        .backend
        .delete(&format!("/events/{id}/"), Some(&session.authorization()))
        .await?;
    tracing::info!("Event {} deleted by user {}", id, session.user_id());
    Ok(Json(json!({ "success": true })))
}
