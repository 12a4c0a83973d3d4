mod common;

use axum::{body::Body, http::{Request, StatusCode}};

use common::TestApp;

fn language(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn translations_losing_placeholders_fall_back() {
    let app = TestApp::spawn().await;
    let (status, headers, body) = app.send(language("/api/language?lang=es")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-language"], "es");
    assert_eq!(body["navbar-link-home"], "Inicio");
    // Spanish drops `$1`
    assert_eq!(body["welcome-user"], "Welcome, $1!");
    // Missing from the Spanish file
    assert_eq!(body["session-expired"], "Your session expired. Please sign in again.");
}

#[tokio::test]
async fn unknown_and_hostile_codes_get_the_default_bundle() {
    let app = TestApp::spawn().await;
    let (status, headers, body) = app.send(language("/api/language?lang=xx")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-language"], "en");
    assert_eq!(body["navbar-link-home"], "Home");

    let (status, headers, _) = app.send(language("/api/language?lang=..%2F..%2Fetc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-language"], "en");
}

#[tokio::test]
async fn available_languages_lists_locale_files() {
    let app = TestApp::spawn().await;
    let (status, _, body) = app.send(language("/api/language/available")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["default"], "en");
    assert_eq!(body["languages"], serde_json::json!(["en", "es", "pt-br"]));
}
