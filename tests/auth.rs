mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use futures::future::join_all;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use capx::middleware::verify_session;
use common::TestApp;

fn callback(token: &str, verifier: &str) -> Request<Body> {
    Request::post("/api/login/callback")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "oauth_token": token, "oauth_verifier": verifier }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn login_start_records_the_originating_host() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/login/step01"))
        .and(body_string_contains("http://capx.test/oauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "oauth_token": "req-token",
            "oauth_token_secret": "req-secret"
        })))
        .expect(1)
        .mount(&app.upstream)
        .await;

    let request = Request::post("/api/login").body(Body::empty()).unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["redirect_url"].as_str().unwrap().ends_with("oauth_token=req-token"));

    let check = Request::post("/api/check")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "oauth_token": "req-token" }).to_string()))
        .unwrap();
    let (status, _, body) = app.send(check).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["host"], "http://capx.test");
}

#[tokio::test]
async fn concurrent_callbacks_exchange_the_verifier_once() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/login/step03"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "api-token", "id": 42, "username": "Alice", "first_login": true }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&app.upstream)
        .await;

    let responses = join_all((0..5).map(|_| app.router.clone().oneshot(callback("tok", "ver")))).await;
    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }

    // A retry right after success is answered from the memoized result
    let (status, headers, body) = app.send(callback("tok", "ver")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], 42);
    assert!(headers["set-cookie"].to_str().unwrap().starts_with("capx_session="));

    let claims = verify_session(&app.state.config.session, body["session"].as_str().unwrap()).unwrap();
    assert_eq!(claims.token, "api-token");
    assert_eq!(claims.username, "Alice");
}

#[tokio::test]
async fn consumed_verifier_is_a_client_error() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/login/step03"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "consumed" })))
        .mount(&app.upstream)
        .await;

    let (status, _, body) = app.send(callback("tok", "old")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "token already consumed");
}

#[tokio::test]
async fn callback_needs_token_and_verifier() {
    let app = TestApp::spawn().await;
    let (status, _, _) = app.send(callback("", "ver")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_route_reports_the_signed_in_user() {
    let app = TestApp::spawn().await;
    let (status, _, body) = app.send(app.get("/api/session")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], common::USER_ID);
    assert_eq!(body["username"], "Alice");
}

#[tokio::test]
async fn session_cookie_is_found_among_other_cookies() {
    let app = TestApp::spawn().await;
    let jwt = capx::middleware::issue_session(&app.state.config.session, "api-token", 9, "Bob").unwrap();
    let request = Request::get("/api/session")
        .header("cookie", format!("theme=dark; capx_session={jwt}; lang=pt"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], 9);
    assert_eq!(body["username"], "Bob");
}

#[tokio::test]
async fn empty_session_cookie_is_anonymous() {
    let app = TestApp::spawn().await;
    let request = Request::get("/api/session")
        .header("cookie", "capx_session=")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = TestApp::spawn().await;
    let request = Request::post("/api/logout").body(Body::empty()).unwrap();
    let (status, headers, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers["set-cookie"].to_str().unwrap();
    assert!(cookie.starts_with("capx_session=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn oauth_page_hands_off_to_the_originating_deployment() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/login/step03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&app.upstream)
        .await;

    let record = capx::models::OAuthHostRecord {
        host: "http://capx-staging.test".into(),
        oauth_token_secret: "s".into(),
    };
    app.state.cache.record_oauth_host("staged", &record).await.unwrap();

    let request = Request::get("/oauth?oauth_token=staged&oauth_verifier=v")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = app.send(request).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        headers["location"],
        "http://capx-staging.test/oauth?oauth_token=staged&oauth_verifier=v"
    );
}
