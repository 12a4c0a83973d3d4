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
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
}

// GET /api/users?search=&limit=&offset=&skills_known=...
async fn list_users(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(query): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let params = forwarded(query);
    let users = state
        .backend
        .get("/users/", Some(&session.authorization()), &params)
        .await?;
    Ok(Json(users))
}

// GET /api/users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let user = state
        .backend
        .get(&format!("/users/{id}/"), Some(&session.authorization()), &[])
        .await?;
    Ok(Json(user))
}
