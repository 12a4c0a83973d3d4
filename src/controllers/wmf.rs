use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::AuthSession,
    services::export::{affiliation_names, is_wmf_member, users_csv},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/wmf", get(export_users))
}

// GET /wmf
async fn export_users(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> AppResult<Response> {
    let auth = session.authorization();
    let backend = &state.backend;

    // 1. Caller profile, affiliation names and every page of users at once
    let (caller, affiliations, users) = futures::future::try_join3(
        backend.get(&format!("/users/{}/", session.user_id()), Some(&auth), &[]),
        backend.get("/list/affiliation/", Some(&auth), &[]),
        backend.get_all("/users/", Some(&auth), &[]),
    )
    .await?;
    let affiliations = affiliation_names(&affiliations);

    // 2. Only Foundation staff may export
    if !is_wmf_member(&caller, &affiliations) {
        tracing::warn!("User {} denied WMF export", session.user_id());
        return Err(AppError::Forbidden(
            "Export is restricted to Wikimedia Foundation members".to_string(),
        ));
    }

    // 3. Render
    let csv = users_csv(&users, &affiliations)?;
    tracing::info!("User {} exported {} profiles", session.user_id(), users.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"capx-users.csv\""),
        ],
        csv,
    )
        .into_response())
}
