use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::{
    controllers::invalid_payload,
    error::{AppError, AppResult},
    middleware::AuthSession,
    models::ProfileUpdate,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/profile",
        get(get_profile)
            .put(update_profile)
            .delete(delete_profile)
            .options(profile_options),
    )
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
}

impl ProfileQuery {
    fn path(&self, session: &AuthSession) -> String {
        format!("/profile/{}/", self.user_id.unwrap_or(session.user_id()))
    }
}

// GET /api/profile?userId=
async fn get_profile(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(params): Query<ProfileQuery>,
) -> AppResult<Json<Value>> {
    let profile = state
        .backend
        .get(&params.path(&session), Some(&session.authorization()), &[])
        .await?;
    Ok(Json(profile))
}

// PUT /api/profile?userId=
async fn update_profile(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(params): Query<ProfileQuery>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<Value>> {
    update.validate().map_err(invalid_payload)?;

    let invalid = update.invalid_capacities();
    if !invalid.is_empty() {
        return Err(AppError::validation(
            "Available capacities must also be known capacities",
            json!({ "invalid_capacities": invalid }),
        ));
    }

    let saved = state
        .backend
        .put(&params.path(&session), Some(&session.authorization()), &update)
        .await?;
    tracing::info!("Profile {} updated by user {}", params.path(&session), session.user_id());
    Ok(Json(saved))
}

// DELETE /api/profile?userId=
async fn delete_profile(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
    Query(params): Query<ProfileQuery>,
) -> AppResult<impl IntoResponse> {
    state
        .backend
        .delete(&params.path(&session), Some(&session.authorization()))
        .await?;
    tracing::info!("Profile {} deleted by user {}", params.path(&session), session.user_id());
    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

// OPTIONS /api/profile
async fn profile_options() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::ALLOW, "GET, PUT, DELETE, OPTIONS")],
    )
}
