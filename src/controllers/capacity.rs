use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::MaybeSession,
    models::Capacity,
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/capacity", get(list_roots))
        .route("/capacity/search", get(search_capacities))
        .route("/capacity/type/{id}", get(list_children))
        .route("/capacity/{id}", get(get_capacity))
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub language: Option<String>,
}

fn language(state: &AppState, requested: Option<String>) -> String {
    requested
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.i18n.default_language.clone())
}

fn authorization(session: &MaybeSession) -> Option<String> {
    session.0.as_ref().map(|s| s.authorization())
}

// GET /api/capacity?language=
async fn list_roots(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Query(params): Query<LanguageQuery>,
) -> AppResult<Json<Vec<Capacity>>> {
    let lang = language(&state, params.language);
    let roots = state
        .capacities
        .roots(authorization(&session).as_deref(), &lang)
        .await?;
    Ok(Json(roots))
}

// GET /api/capacity/{id}?language=
async fn get_capacity(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Path(id): Path<i64>,
    Query(params): Query<LanguageQuery>,
) -> AppResult<Json<Capacity>> {
    let lang = language(&state, params.language);
    let capacity = state
        .capacities
        .get(authorization(&session).as_deref(), id, &lang)
        .await?;
    Ok(Json(capacity))
}

// GET /api/capacity/type/{id}?language=
async fn list_children(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Path(id): Path<i64>,
    Query(params): Query<LanguageQuery>,
) -> AppResult<Json<Vec<Capacity>>> {
    let lang = language(&state, params.language);
    let children = state
        .capacities
        .children(authorization(&session).as_deref(), id, &lang)
        .await?;
    Ok(Json(children))
}

// GET /api/capacity/search?q=&language=
async fn search_capacities(
    State(state): State<Arc<AppState>>,
    session: MaybeSession,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<Capacity>>> {
    let lang = language(&state, params.language);
    let found = state
        .capacities
        .search(
            authorization(&session).as_deref(),
            params.q.as_deref().unwrap_or_default(),
            &lang,
        )
        .await?;
    Ok(Json(found))
}
