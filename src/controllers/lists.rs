use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::AuthSession,
    AppState,
};

/// Reference lists the backend exposes under `/list/{kind}/`.
pub const LIST_KINDS: [&str; 5] = [
    "affiliation",
    "territory",
    "language",
    "wikimedia_project",
    "skills",
];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/list/{kind}", get(get_list))
}

async fn get_list(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Path(kind): Path<String>,
) -> AppResult<Json<Value>> {
    if !LIST_KINDS.contains(&kind.as_str()) {
        return Err(AppError::NotFound(format!("Unknown list '{kind}'")));
    }
    let list = state
        .backend
        .get(&format!("/list/{kind}/"), Some(&session.authorization()), &[])
        .await?;
    Ok(Json(list))
}
