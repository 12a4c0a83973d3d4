use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{error::AppResult, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/language", get(get_bundle))
        .route("/language/available", get(available_languages))
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub lang: Option<String>,
}

// GET /api/language?lang=pt-br
async fn get_bundle(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LanguageQuery>,
) -> AppResult<Response> {
    let requested = params
        .lang
        .unwrap_or_else(|| state.locales.default_language().to_string());
    let (served, bundle) = state.locales.bundle(&requested).await?;
    if served != requested {
        tracing::debug!("Language '{}' served as '{}'", requested, served);
    }
    Ok(([(header::CONTENT_LANGUAGE, served)], Json(bundle.as_ref().clone())).into_response())
}

// GET /api/language/available
async fn available_languages(State(state): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    let languages = state.locales.available_languages().await?;
    Ok(Json(json!({
        "default": state.locales.default_language(),
        "languages": languages,
    })))
}
