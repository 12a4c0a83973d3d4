use axum::{
    extract::{Query, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_cookies::Cookies;
use tracing::{info, warn};

use crate::{
    cache::login::LoginDedup,
    error::{AppError, AppResult},
    middleware::{clear_session_cookie, issue_session, session_cookie, AuthSession},
    models::{CallbackRequest, LoginResult, OAuthHostRecord},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(start_login))
        .route("/login/callback", post(login_callback))
        .route("/check", post(check_host))
        .route("/logout", post(logout))
        .route("/session", get(current_session))
}

pub fn pages() -> Router<Arc<AppState>> {
    Router::new().route("/oauth", get(oauth_page))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub oauth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthPageQuery {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
}

/// Exchanges the verifier once per token tuple and signs a session.
async fn complete_login(
    state: &Arc<AppState>,
    mut request: CallbackRequest,
) -> AppResult<(LoginResult, String)> {
    if request.stored_token_secret.is_none() {
        if let Ok(Some(record)) = state.cache.oauth_host(&request.oauth_token).await {
            request.stored_token_secret = Some(record.oauth_token_secret);
            request.stored_token.get_or_insert_with(|| request.oauth_token.clone());
        }
    }

    let key = LoginDedup::fingerprint(&request);
    let oauth = state.oauth.clone();
    let result = state
        .login
        .run(&key, || async move { oauth.exchange(&request).await })
        .await?;

    let jwt = issue_session(&state.config.session, &result.token, result.id, &result.username)?;
    Ok((result, jwt))
}

// POST /api/login
async fn start_login(State(state): State<Arc<AppState>>) -> AppResult<Json<serde_json::Value>> {
    let host = state.config.public_host().to_string();
    let start = state.oauth.start(&host).await?;

    let record = OAuthHostRecord {
        host: host.clone(),
        oauth_token_secret: start.oauth_token_secret.clone(),
    };
    state
        .cache
        .record_oauth_host(&start.oauth_token, &record)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to record OAuth host: {e}")))?;

    info!("OAuth login started on {}", host);
    Ok(Json(json!({
        "redirect_url": state.oauth.authorize_url(&start.oauth_token),
        "oauth_token": start.oauth_token,
    })))
}

// POST /api/check
async fn check_host(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let record = state
        .cache
        .oauth_host(&req.oauth_token)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read OAuth host: {e}")))?
        .ok_or_else(|| AppError::NotFound("Unknown OAuth token".to_string()))?;
    Ok(Json(json!({ "host": record.host })))
}

// POST /api/login/callback
async fn login_callback(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<CallbackRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if req.oauth_token.is_empty() || req.oauth_verifier.is_empty() {
        return Err(AppError::validation(
            "oauth_token and oauth_verifier are required",
            serde_json::Value::Null,
        ));
    }
    let (result, jwt) = complete_login(&state, req).await?;
    cookies.add(session_cookie(&state.config.session, &jwt));
    Ok(Json(json!({
        "user": {
            "id": result.id,
            "username": result.username,
            "first_login": result.first_login,
        },
        "session": jwt,
    })))
}

// GET /oauth: the consent page redirects here
async fn oauth_page(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Query(params): Query<OAuthPageQuery>,
    RawQuery(raw): RawQuery,
) -> AppResult<Response> {
    let (Some(oauth_token), Some(oauth_verifier)) = (params.oauth_token, params.oauth_verifier)
    else {
        return Ok(Redirect::to("/").into_response());
    };

    let record = state.cache.oauth_host(&oauth_token).await.ok().flatten();
    if let Some(record) = &record {
        let own = state.config.public_host();
        let known = state.config.oauth.hosts.iter().any(|h| h == &record.host);
        if record.host != own && known {
            // The login started on another deployment; finish it there
            let target = format!("{}/oauth?{}", record.host, raw.unwrap_or_default());
            info!("Redirecting OAuth callback to {}", record.host);
            return Ok(Redirect::temporary(&target).into_response());
        }
        if record.host != own {
            warn!("OAuth token recorded for unknown host {}, finishing here", record.host);
        }
    }

    let request = CallbackRequest {
        stored_token: record.as_ref().map(|_| oauth_token.clone()),
        stored_token_secret: record.map(|r| r.oauth_token_secret),
        oauth_token,
        oauth_verifier,
    };
    let (_, jwt) = complete_login(&state, request).await?;
    cookies.add(session_cookie(&state.config.session, &jwt));
    Ok(Redirect::to("/home").into_response())
}

// POST /api/logout
async fn logout(cookies: Cookies) -> Json<serde_json::Value> {
    cookies.add(clear_session_cookie());
    Json(json!({ "success": true }))
}

// GET /api/session
async fn current_session(session: AuthSession) -> Json<serde_json::Value> {
    Json(json!({
        "user_id": session.0.user_id,
        "username": session.0.username,
        "expires_at": session.0.exp,
    }))
}
