#![allow(clippy::unwrap_used)]
// Integration tests for `NanoleafClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leafline_api::{Error, NanoleafClient, StateField, StateValue, StateWrite};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, NanoleafClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = NanoleafClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn token() -> SecretString {
    SecretString::from("tok3n".to_string())
}

// ── Pairing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_user_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth_token": "abc123" })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client.add_user().await.unwrap();
    assert_eq!(token, "abc123");
}

#[tokio::test]
async fn test_add_user_window_closed() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/new"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.add_user().await;
    assert!(
        matches!(result, Err(Error::PairingWindowClosed)),
        "expected PairingWindowClosed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_add_user_without_token_field() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let result = client.add_user().await;
    assert!(matches!(result, Err(Error::MissingToken)), "got: {result:?}");
}

// ── State writes ────────────────────────────────────────────────────

#[tokio::test]
async fn test_put_state_sends_single_field_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok3n/state"))
        .and(body_json(json!({ "ct": { "value": 2700 } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let write = StateWrite::new(StateField::Ct, StateValue::Int(2700));
    let status = client.put_state(&token(), &write).await.unwrap();
    assert_eq!(status, 204);
}

#[tokio::test]
async fn test_put_state_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok3n/state"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let write = StateWrite::new(StateField::On, StateValue::Bool(true));
    let err = client.put_state(&token(), &write).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_put_state_server_error_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok3n/state"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Unprocessable Entity"))
        .mount(&server)
        .await;

    let write = StateWrite::new(StateField::Hue, StateValue::Int(120));
    let err = client.put_state(&token(), &write).await.unwrap_err();
    match err {
        Error::Api { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "Unprocessable Entity");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ── Effects ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_effect() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/tok3n/effects"))
        .and(body_json(json!({ "select": "Rainbow Flow" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.select_effect(&token(), "Rainbow Flow").await.unwrap();
    assert_eq!(status, 204);
}

#[tokio::test]
async fn test_effects_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/tok3n/effects/effectsList"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!(["Forest", "Nemo", "Snowfall"])),
        )
        .mount(&server)
        .await;

    let effects = client.effects_list(&token()).await.unwrap();
    assert_eq!(effects, vec!["Forest", "Nemo", "Snowfall"]);
}

#[tokio::test]
async fn test_effects_list_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/tok3n/effects/effectsList"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.effects_list(&token()).await.unwrap_err();
    assert!(err.is_not_found(), "got: {err:?}");
}

// ── Full state ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_device_info() {
    let (server, client) = setup().await;

    let body = json!({
        "name": "Canvas 0A1B",
        "model": "NL29",
        "state": {
            "on": { "value": false },
            "brightness": { "value": 30, "min": 0, "max": 100 },
            "hue": { "value": 200, "min": 0, "max": 360 },
            "sat": { "value": 80, "min": 0, "max": 100 },
            "ct": { "value": 3200, "min": 1200, "max": 6500 },
            "colorMode": "hs"
        },
        "effects": { "select": "*Solid*", "effectsList": ["Forest"] }
    });

    Mock::given(method("GET"))
        .and(path("/api/v1/tok3n/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let info = client.device_info(&token()).await.unwrap();
    assert_eq!(info.name.as_deref(), Some("Canvas 0A1B"));
    assert!(!info.state.on.unwrap().value);
    assert_eq!(info.state.hue.unwrap().value, 200);
    assert_eq!(info.state.color_mode.as_deref(), Some("hs"));
    assert_eq!(info.effects.select.as_deref(), Some("*Solid*"));
}

#[tokio::test]
async fn test_device_info_garbage_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/tok3n/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client.device_info(&token()).await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

// ── Transport ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind then drop a listener so the port is known-closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let base_url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();

    let client = NanoleafClient::with_client(reqwest::Client::new(), base_url);
    let err = client.effects_list(&token()).await.unwrap_err();
    assert!(err.is_transient(), "got: {err:?}");
}
