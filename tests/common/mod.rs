#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

use capx::{
    app,
    cache::CacheService,
    config::{
        AppConfig, BackendConfig, Config, FeatureFlags, I18nConfig, OAuthConfig, RedisConfig,
        SessionConfig, WikimediaConfig,
    },
    middleware::issue_session,
    AppState,
};

pub const USER_ID: i64 = 7;
pub const BACKEND_TOKEN: &str = "backend-token";

/// Gateway wired to one mock server standing in for every upstream.
pub struct TestApp {
    pub upstream: MockServer,
    pub state: Arc<AppState>,
    pub router: Router,
}

pub fn config(upstream: &str) -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            rust_log: "capx=debug".into(),
            log_format: "text".into(),
            public_url: "http://capx.test".into(),
        },
        backend: BackendConfig { base_url: upstream.to_string(), timeout_seconds: 5 },
        oauth: OAuthConfig {
            step01_url: format!("{upstream}/login/step01"),
            step02_url: format!("{upstream}/login/step02"),
            step03_url: format!("{upstream}/login/step03"),
            hosts: vec!["http://capx.test".into(), "http://capx-staging.test".into()],
        },
        wikimedia: WikimediaConfig {
            metabase_url: format!("{upstream}/metabase/sparql"),
            wikidata_api_url: format!("{upstream}/wikidata/api.php"),
            mediawiki_api_url: format!("{upstream}/meta/api.php"),
        },
        session: SessionConfig {
            secret: "integration-secret".into(),
            ttl_hours: 1,
            cookie_secure: false,
        },
        redis: RedisConfig { url: None },
        i18n: I18nConfig {
            locales_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("locales"),
            default_language: "en".into(),
        },
        features: FeatureFlags { enable_metabase: true, enable_wikidata: true },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let upstream = MockServer::start().await;
        let state = AppState::with_cache(config(&upstream.uri()), CacheService::in_memory())
            .expect("clients build");
        let router = app(state.clone());
        Self { upstream, state, router }
    }

    pub fn bearer(&self) -> String {
        self.bearer_for(BACKEND_TOKEN, USER_ID)
    }

    /// Bearer header for a session holding another backend token.
    pub fn bearer_for(&self, backend_token: &str, user_id: i64) -> String {
        let jwt = issue_session(&self.state.config.session, backend_token, user_id, "Alice")
            .expect("session signs");
        format!("Bearer {jwt}")
    }

    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, axum::http::HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.expect("router answers");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, headers, body)
    }

    pub fn get(&self, uri: &str) -> Request<Body> {
        Request::get(uri)
            .header("authorization", self.bearer())
            .body(Body::empty())
            .expect("request")
    }

    pub fn json(&self, method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", self.bearer())
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }
}
