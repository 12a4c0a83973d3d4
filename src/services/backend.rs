//! Client for the CapX Django backend.
//!
//! Every proxied route goes through [`BackendClient::request`], which attaches
//! the `Authorization: Token <token>` header, forwards query parameters and
//! turns non-success responses into [`AppError`]s carrying the upstream
//! status and body.

use reqwest::{header, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{is_invalid_token, AppError, AppResult};

/// Upper bound on pages followed by [`BackendClient::get_all`].
const MAX_PAGES: usize = 200;

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn from_config(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .build()?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    /// Absolute URL for a backend path. Django routes end with a slash.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.ends_with('/') || path.contains('?') {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}/", self.base_url, path)
        }
    }

    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        authorization: Option<&str>,
        query: &[(String, String)],
        body: Option<&B>,
    ) -> AppResult<Value> {
        let url = self.url(path);
        self.send(method, &url, path, authorization, query, body).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        path: &str,
        authorization: Option<&str>,
        query: &[(String, String)],
        body: Option<&B>,
    ) -> AppResult<Value> {
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), url);
        if let Some(auth) = authorization {
            request = request.header(header::AUTHORIZATION, auth);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let context = format!("{} {}", method, path);
        let response = request
            .send()
            .await
            .map_err(|e| AppError::transport(format!("Failed to reach backend for {context}"), e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::transport(format!("Failed to read backend response for {context}"), e))?;
        let body = parse_body(&bytes);

        if status.is_success() {
            return Ok(body);
        }
        if is_invalid_token(status, &body) {
            return Err(AppError::SessionExpired);
        }
        Err(AppError::Upstream {
            status,
            message: format!("Backend request {context} failed"),
            details: body,
        })
    }

    pub async fn get(
        &self,
        path: &str,
        authorization: Option<&str>,
        query: &[(String, String)],
    ) -> AppResult<Value> {
        self.request::<Value>(Method::GET, path, authorization, query, None).await
    }

    /// Every row of a list endpoint. Paginated responses are followed
    /// through their `next` links; plain arrays are returned as they are.
    pub async fn get_all(
        &self,
        path: &str,
        authorization: Option<&str>,
        query: &[(String, String)],
    ) -> AppResult<Vec<Value>> {
        let mut page = self.get(path, authorization, query).await?;
        let mut rows = Vec::new();
        for _ in 0..MAX_PAGES {
            let next = self.next_page(&page);
            rows.extend(page_rows(page));
            let Some(url) = next else {
                return Ok(rows);
            };
            page = self
                .send::<Value>(Method::GET, &url, path, authorization, &[], None)
                .await?;
        }
        warn!("Stopped following {} after {} pages", path, MAX_PAGES);
        Ok(rows)
    }

    // Only links back into the backend are followed
    fn next_page(&self, page: &Value) -> Option<String> {
        let next = page.get("next")?.as_str()?;
        if next.starts_with(&format!("{}/", self.base_url)) {
            Some(next.to_string())
        } else if next.starts_with('/') {
            Some(format!("{}{}", self.base_url, next))
        } else {
            warn!("Ignoring foreign pagination link {}", next);
            None
        }
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        path: &str,
        authorization: Option<&str>,
        query: &[(String, String)],
    ) -> AppResult<T> {
        let value = self.get(path, authorization, query).await?;
        serde_json::from_value(value).map_err(|e| {
            AppError::Internal(format!("Unexpected backend payload for {path}: {e}"))
        })
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        authorization: Option<&str>,
        body: &B,
    ) -> AppResult<Value> {
        self.request(Method::POST, path, authorization, &[], Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        authorization: Option<&str>,
        body: &B,
    ) -> AppResult<Value> {
        self.request(Method::PUT, path, authorization, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str, authorization: Option<&str>) -> AppResult<Value> {
        self.request::<Value>(Method::DELETE, path, authorization, &[], None).await
    }
}

// Paginated responses carry the rows under `results`
fn page_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

// Empty bodies (204) become null, non-JSON bodies are kept as text
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> BackendClient {
        BackendClient::from_config(&BackendConfig {
            base_url: "http://backend.test/".into(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn urls_get_trailing_slash() {
        let c = client();
        assert_eq!(c.url("/profile/3"), "http://backend.test/profile/3/");
        assert_eq!(c.url("events/"), "http://backend.test/events/");
    }

    #[test]
    fn rows_accept_plain_and_paginated_lists() {
        assert_eq!(page_rows(json!([1, 2])).len(), 2);
        assert_eq!(page_rows(json!({ "count": 1, "results": [{ "id": 1 }] })).len(), 1);
        assert!(page_rows(json!({ "detail": "nope" })).is_empty());
    }

    #[test]
    fn next_links_stay_on_the_backend() {
        let c = client();
        assert_eq!(
            c.next_page(&json!({ "next": "http://backend.test/users/?page=2" })).as_deref(),
            Some("http://backend.test/users/?page=2")
        );
        assert_eq!(
            c.next_page(&json!({ "next": "/users/?page=3" })).as_deref(),
            Some("http://backend.test/users/?page=3")
        );
        assert_eq!(c.next_page(&json!({ "next": "http://elsewhere.test/users/?page=2" })), None);
        assert_eq!(c.next_page(&json!({ "next": null })), None);
        assert_eq!(c.next_page(&json!([1, 2])), None);
    }

    #[test]
    fn bodies_are_parsed_leniently() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(br#"{"a":1}"#)["a"], 1);
        assert_eq!(parse_body(b"<html>oops</html>"), Value::String("<html>oops</html>".into()));
    }
}
