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
    models::DocumentPayload,
    services::commons::convert_to_commons_page_url,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route("/documents/{id}", get(get_document).delete(delete_document))
}

// GET /api/documents?limit=&offset=
async fn list_documents(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(query): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let params = forwarded(query);
    let documents = state
        .backend
        .get("/document/", Some(&session.authorization()), &params)
        .await?;
    Ok(Json(documents))
}

// POST /api/documents
async fn create_document(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Json(mut document): Json<DocumentPayload>,
) -> AppResult<impl IntoResponse> {
    document.validate().map_err(invalid_payload)?;

    // Commons file links are stored as their description page
    document.url = convert_to_commons_page_url(&document.url);

    let created = state
        .backend
        .post("/document/", Some(&session.authorization()), &document)
        .await?;
    tracing::info!("Document {} added by user {}", document.url, session.user_id());
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/documents/{id}
async fn get_document(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let document = state
        .backend
        .get(&format!("/document/{id}/"), Some(&session.authorization()), &[])
        .await?;
    Ok(Json(document))
}

// DELETE /api/documents/{id}
async fn delete_document(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    state
        .backend
        .delete(&format!("/document/{id}/"), Some(&session.authorization()))
        .await?;
    tracing::info!("Document {} deleted by user {}", id, session.user_id());
    Ok(Json(json!({ "success": true })))
}
