//! Client for the three-step Wikimedia OAuth 1.0a login service.
//!
//! 1. `start` asks the login service for a request token;
//! 2. the browser is sent to the consent page (`step02_url`);
//! 3. `exchange` trades the verifier for a backend API token.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::login::LoginFailure;
use crate::config::OAuthConfig;
use crate::models::login::OAuthStart;
use crate::models::{CallbackRequest, LoginResult};

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    step01_url: String,
    step02_url: String,
    step03_url: String,
}

impl OAuthClient {
    pub fn from_config(config: &OAuthConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?,
            step01_url: config.step01_url.clone(),
            step02_url: config.step02_url.clone(),
            step03_url: config.step03_url.clone(),
        })
    }

    /// Step 1: request token for a login started on `host`.
    pub async fn start(&self, host: &str) -> Result<OAuthStart, LoginFailure> {
        let response = self
            .http
            .post(&self.step01_url)
            .json(&json!({ "callback_url": format!("{host}/oauth"), "domain": host }))
            .send()
            .await
            .map_err(|e| LoginFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let details = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(LoginFailure::Upstream { status: status.as_u16(), details });
        }
        response
            .json::<OAuthStart>()
            .await
            .map_err(|e| LoginFailure::Transport(e.to_string()))
    }

    /// Step 2: consent page for a request token.
    pub fn authorize_url(&self, oauth_token: &str) -> String {
        let query = serde_urlencoded::to_string(&[("oauth_token", oauth_token)]).unwrap_or_default();
        let separator = if self.step02_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.step02_url, separator, query)
    }

    /// Step 3: exchanges the verifier. A 400 means the verifier was already
    /// used by an earlier request.
    pub async fn exchange(&self, request: &CallbackRequest) -> Result<LoginResult, LoginFailure> {
        let response = self
            .http
            .post(&self.step03_url)
            .json(&json!({
                "oauth_token": request.oauth_token,
                "oauth_verifier": request.oauth_verifier,
                "stored_token": request.stored_token,
                "stored_token_secret": request.stored_token_secret,
            }))
            .send()
            .await
            .map_err(|e| LoginFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            warn!("Login service rejected verifier as already consumed");
            return Err(LoginFailure::Consumed);
        }
        if !status.is_success() {
            let details = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(LoginFailure::Upstream { status: status.as_u16(), details });
        }

        let result = response
            .json::<LoginResult>()
            .await
            .map_err(|e| LoginFailure::Transport(e.to_string()))?;
        info!("OAuth exchange completed for user {}", result.username);
        Ok(result)
    }
}
