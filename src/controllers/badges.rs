use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;
use std::sync::Arc;

use crate::{error::AppResult, middleware::AuthSession, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/badges", get(list_badges))
        .route("/badges/user", get(user_badges))
}

async fn list_badges(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> AppResult<Json<Value>> {
    let badges = state
        .backend
        .get("/badges/", Some(&session.authorization()), &[])
        .await?;
    Ok(Json(badges))
}

// Badges earned by the signed-in user, with progress
async fn user_badges(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> AppResult<Json<Value>> {
    let path = format!("/users/{}/badges/", session.user_id());
    let badges = state
        .backend
        .get(&path, Some(&session.authorization()), &[])
        .await?;
    Ok(Json(badges))
}
