use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_cookies::cookie::{time, SameSite};
use tower_cookies::{Cookie, Cookies};

use crate::config::SessionConfig;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "capx_session";

/// JWT payload of a signed-in user. `token` is the backend API token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub exp: i64,
}

/// Authenticated session, rejected with 401 when absent or invalid.
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionClaims);

impl AuthSession {
    /// Value for the backend `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Token {}", self.0.token)
    }

    pub fn user_id(&self) -> i64 {
        self.0.user_id
    }
}

/// Session when present; anonymous requests pass through.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<AuthSession>);

pub fn issue_session(
    config: &SessionConfig,
    token: &str,
    user_id: i64,
    username: &str,
) -> Result<String, AppError> {
    let claims = SessionClaims {
        token: token.to_string(),
        user_id,
        username: username.to_string(),
        exp: (Utc::now() + Duration::hours(config.ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign session: {e}")))
}

pub fn verify_session(config: &SessionConfig, jwt: &str) -> Option<SessionClaims> {
    decode::<SessionClaims>(
        jwt,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Session cookie carrying `jwt`, valid as long as the JWT itself.
pub fn session_cookie(config: &SessionConfig, jwt: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, jwt.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(time::Duration::hours(config.ttl_hours))
        .build()
}

/// Removal cookie for the session; always emitted, even when the request
/// carried no session cookie.
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

// Bearer header first, then the session cookie
async fn session_jwt(parts: &mut Parts, state: &Arc<crate::AppState>) -> Option<String> {
    if let Some(bearer) = bearer_token(parts) {
        return Some(bearer);
    }
    let cookies = Cookies::from_request_parts(parts, state).await.ok()?;
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

impl FromRequestParts<Arc<crate::AppState>> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jwt = session_jwt(parts, state).await.ok_or(AppError::Unauthorized)?;
        let claims = verify_session(&state.config.session, &jwt).ok_or(AppError::Unauthorized)?;
        Ok(AuthSession(claims))
    }
}

impl FromRequestParts<Arc<crate::AppState>> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = session_jwt(parts, state)
            .await
            .and_then(|jwt| verify_session(&state.config.session, &jwt))
            .map(AuthSession);
        Ok(MaybeSession(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn config() -> SessionConfig {
        SessionConfig {
            secret: "test-secret".into(),
            ttl_hours: 1,
            cookie_secure: false,
        }
    }

    #[test]
    fn session_round_trip() {
        let jwt = issue_session(&config(), "abc", 7, "Alice").unwrap();
        let claims = verify_session(&config(), &jwt).unwrap();
        assert_eq!(claims.token, "abc");
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "Alice");
    }

    #[test]
    fn tampered_secret_is_rejected() {
        let jwt = issue_session(&config(), "abc", 7, "Alice").unwrap();
        let other = SessionConfig { secret: "other".into(), ..config() };
        assert!(verify_session(&other, &jwt).is_none());
    }

    #[test]
    fn bearer_header_is_read() {
        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc"));

        let (parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Token abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie(&config(), "xyz");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "xyz");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));

        let removal = clear_session_cookie();
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
    }
}
