use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::{controllers::forwarded, error::AppResult, middleware::AuthSession, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/organizations", get(list_organizations))
        .route("/organizations/{id}", get(get_organization).put(update_organization))
}

async fn list_organizations(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(query): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let params = forwarded(query);
    let organizations = state
        .backend
        .get("/organizations/", Some(&session.authorization()), &params)
        .await?;
    Ok(Json(organizations))
}

async fn get_organization(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let organization = state
        .backend
        .get(&format!("/organizations/{id}/"), Some(&session.authorization()), &[])
        .await?;
    Ok(Json(organization))
}

// Only managers can update; the backend enforces it
async fn update_organization(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let saved = state
        .backend
        .put(&format!("/organizations/{id}/"), Some(&session.authorization()), &body)
        .await?;
    Ok(Json(saved))
}
