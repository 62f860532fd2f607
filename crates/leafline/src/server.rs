//! `leafline serve`: the HTTP relay the browser panel talks to.
//!
//! Each route maps onto one `ControlScope` method. The outcome decides the
//! HTTP status; device tokens never leave the relay except from
//! `/api/add-user`, which hands the freshly paired token to the caller.
//!
//! Browser calls are same-origin unless `server.allowed_origins` lists
//! more; a request carrying any other `Origin` is refused before routing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, HOST, ORIGIN};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use leafline_config::ServerSection;
use leafline_core::{ControlIntent, ControlScope, Controller, Outcome, SessionContext};

use crate::config::normalize_host;
use crate::error::CliError;

/// Request header naming the device a call is meant for.
pub const HOST_HEADER: &str = "x-nanoleaf-host";

/// Who may call the relay, and how far the host header reaches.
#[derive(Debug, Clone)]
pub struct RelayPolicy {
    /// Browser origins accepted besides the relay's own.
    pub allowed_origins: Vec<HeaderValue>,
    pub host_header: bool,
    pub max_host_sessions: usize,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        let section = ServerSection::default();
        Self {
            allowed_origins: Vec::new(),
            host_header: section.host_header,
            max_host_sessions: section.max_host_sessions,
        }
    }
}

impl RelayPolicy {
    pub fn from_section(section: &ServerSection) -> Result<Self, CliError> {
        let allowed_origins = section
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim_end_matches('/')).map_err(|_| CliError::Validation {
                    field: "server.allowed_origins".into(),
                    reason: format!("'{origin}' is not a valid origin"),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            allowed_origins,
            host_header: section.host_header,
            max_host_sessions: section.max_host_sessions,
        })
    }

    /// Same-origin, or listed.
    fn admits(&self, origin: &HeaderValue, host: Option<&HeaderValue>) -> bool {
        if self.allowed_origins.contains(origin) {
            return true;
        }
        let (Ok(origin), Some(Ok(host))) = (origin.to_str(), host.map(HeaderValue::to_str)) else {
            return false;
        };
        origin
            .split_once("://")
            .is_some_and(|(_, authority)| authority.eq_ignore_ascii_case(host))
    }
}

#[derive(Clone)]
pub struct AppState {
    controller: Controller,
    policy: Arc<RelayPolicy>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router(controller: Controller, policy: RelayPolicy) -> Router {
    let state = AppState {
        controller,
        policy: Arc::new(policy),
    };
    let app = Router::new()
        .route("/api/add-user", post(add_user))
        .route("/api/set-on-state", post(set_on_state))
        .route("/api/set-brightness", post(set_brightness))
        .route("/api/set-ct", post(set_ct))
        .route("/api/set-hue", post(set_hue))
        .route("/api/set-sat", post(set_sat))
        .route("/api/select-effect", post(select_effect))
        .route("/api/get-effects-list", get(get_effects_list))
        .route("/api/get-state", get(get_state))
        .route("/api/discover", post(discover))
        .route("/api/set-address", post(set_address))
        .layer(middleware::from_fn_with_state(state.clone(), same_origin))
        .layer(TraceLayer::new_for_http());

    let app = if state.policy.allowed_origins.is_empty() {
        app
    } else {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(state.policy.allowed_origins.clone()))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE, HeaderName::from_static(HOST_HEADER)]),
        )
    };
    app.with_state(state)
}

/// Refuse requests whose `Origin` is neither this relay nor allowed.
async fn same_origin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(origin) = req.headers().get(ORIGIN) {
        if !state.policy.admits(origin, req.headers().get(HOST)) {
            warn!(origin = ?origin, path = %req.uri().path(), "cross-origin request refused");
            return refuse(StatusCode::FORBIDDEN, "origin not allowed");
        }
    }
    next.run(req).await
}

/// Bind, serve until Ctrl-C, then tear down discovery.
pub async fn run(controller: Controller, bind: SocketAddr, policy: RelayPolicy) -> Result<(), CliError> {
    if controller.process().snapshot().address.is_none() {
        let startup = controller.process();
        tokio::spawn(async move {
            info!("no device address configured; attempting discovery");
            match startup.discover().await {
                Outcome::Success { value, .. } => info!(address = %value, "device discovered"),
                other => warn!(outcome = other.kind(), "startup discovery failed: {other}"),
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, router(controller.clone(), policy))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.stop_discovery();
    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

// ── Request helpers ─────────────────────────────────────────────────

/// The process session, or the host session the header names.
#[allow(clippy::result_large_err)]
fn scope_for(state: &AppState, headers: &HeaderMap) -> Result<ControlScope, Response> {
    let Some(raw) = headers.get(HOST_HEADER) else {
        return Ok(state.controller.process());
    };
    if !state.policy.host_header {
        return Err(invalid(format!("{HOST_HEADER} is disabled on this relay")));
    }
    let host = raw
        .to_str()
        .map_err(|_| invalid(format!("{HOST_HEADER} is not valid text")))?;
    let address = normalize_host(host, state.controller.config().default_port)
        .map_err(|e| invalid(format!("{HOST_HEADER}: {e}")))?;
    let context = SessionContext::Host(address);
    if !state.controller.has_scope(&context)
        && state.controller.host_sessions() >= state.policy.max_host_sessions
    {
        warn!(%context, limit = state.policy.max_host_sessions, "host session limit reached");
        return Err(refuse(StatusCode::SERVICE_UNAVAILABLE, "too many device sessions"));
    }
    Ok(state.controller.scope(&context))
}

fn parse_body(body: &[u8]) -> Result<Value, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| format!("request body is not valid JSON: {e}"))
}

/// An integer, or a string holding one.
fn int_field(body: &Value, field: &str) -> Result<i64, String> {
    match body.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| format!("{field} must be an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("{field} must be an integer, got '{s}'")),
        Some(_) => Err(format!("{field} must be an integer")),
        None => Err(format!("missing {field}")),
    }
}

fn bool_field(body: &Value, field: &str) -> Result<bool, String> {
    match body.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("{field} must be true or false")),
        None => Err(format!("missing {field}")),
    }
}

fn text_field(body: &Value, field: &str) -> Result<String, String> {
    match body.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("{field} must be a string")),
        None => Err(format!("missing {field}")),
    }
}

// ── Response helpers ────────────────────────────────────────────────

fn status_of<T>(outcome: &Outcome<T>) -> StatusCode {
    StatusCode::from_u16(outcome.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn failure<T>(outcome: &Outcome<T>) -> Response {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(false));
    body.insert("outcome".into(), outcome.kind().into());
    body.insert("error".into(), outcome.to_string().into());
    if let Outcome::NotConfigured { missing } = outcome {
        body.insert("missing".into(), json!(missing));
    }
    (status_of(outcome), Json(Value::Object(body))).into_response()
}

fn invalid(reason: String) -> Response {
    failure(&Outcome::<()>::validation(reason))
}

/// Refusals that happen before any session is involved.
fn refuse(status: StatusCode, reason: &str) -> Response {
    (status, Json(json!({ "success": false, "error": reason }))).into_response()
}

fn ok(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Response {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    for (k, v) in fields {
        body.insert(k.into(), v);
    }
    (StatusCode::OK, Json(Value::Object(body))).into_response()
}

/// Parse, relay, and echo the applied value under `field`.
async fn write(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    field: &'static str,
    build: impl FnOnce(&Value) -> Result<ControlIntent, String>,
) -> Response {
    let scope = match scope_for(state, headers) {
        Ok(scope) => scope,
        Err(rejection) => return rejection,
    };
    let intent = match parse_body(body).and_then(|v| build(&v)) {
        Ok(intent) => intent,
        Err(reason) => return invalid(reason),
    };
    match scope.execute(&intent).await {
        Outcome::Success { value, status } => ok([
            (field, json!(value)),
            ("apiStatus", json!(status)),
        ]),
        other => failure(&other),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn set_on_state(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    write(&state, &headers, &body, "onState", |b| {
        bool_field(b, "onState").map(ControlIntent::SetPower)
    })
    .await
}

async fn set_brightness(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    write(&state, &headers, &body, "brightness", |b| {
        int_field(b, "brightness").map(ControlIntent::SetBrightness)
    })
    .await
}

async fn set_ct(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    write(&state, &headers, &body, "ct", |b| {
        int_field(b, "ct").map(ControlIntent::SetColorTemperature)
    })
    .await
}

async fn set_hue(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    write(&state, &headers, &body, "hue", |b| {
        int_field(b, "hue").map(ControlIntent::SetHue)
    })
    .await
}

async fn set_sat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    write(&state, &headers, &body, "sat", |b| {
        int_field(b, "sat").map(ControlIntent::SetSaturation)
    })
    .await
}

async fn select_effect(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    write(&state, &headers, &body, "effectName", |b| {
        text_field(b, "effectName").map(ControlIntent::SelectEffect)
    })
    .await
}

async fn get_state(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let scope = match scope_for(&state, &headers) {
        Ok(scope) => scope,
        Err(rejection) => return rejection,
    };
    match scope.get_state().await {
        Outcome::Success { value, .. } => Json(value.device).into_response(),
        other => failure(&other),
    }
}

async fn get_effects_list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let scope = match scope_for(&state, &headers) {
        Ok(scope) => scope,
        Err(rejection) => return rejection,
    };
    match scope.get_effects_list().await {
        Outcome::Success { value, .. } => Json(value).into_response(),
        other => failure(&other),
    }
}

async fn add_user(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let scope = match scope_for(&state, &headers) {
        Ok(scope) => scope,
        Err(rejection) => return rejection,
    };
    match scope.pair().await {
        Outcome::Success { value, .. } => ok([
            ("message", json!("paired with device")),
            ("auth_token", json!(value.expose())),
        ]),
        other => failure(&other),
    }
}

async fn discover(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let scope = match scope_for(&state, &headers) {
        Ok(scope) => scope,
        Err(rejection) => return rejection,
    };
    match scope.discover().await {
        Outcome::Success { value, .. } => ok([("address", json!(value.to_string()))]),
        other => failure(&other),
    }
}

async fn set_address(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let scope = match scope_for(&state, &headers) {
        Ok(scope) => scope,
        Err(rejection) => return rejection,
    };
    let input = match parse_body(&body).and_then(|v| text_field(&v, "address")) {
        Ok(input) => input,
        Err(reason) => return invalid(reason),
    };
    let address = match normalize_host(&input, state.controller.config().default_port) {
        Ok(address) => address,
        Err(e) => return invalid(e.to_string()),
    };
    match scope.set_address(&address.to_string()) {
        Outcome::Success { value, .. } => ok([("address", json!(value.to_string()))]),
        other => failure(&other),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::{Arc, Mutex};

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tokio::sync::mpsc;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use leafline_core::{
        Advertisement, CoreConfig, Credential, DeviceAddress, LocateError, MemoryStore,
        ServiceBrowser,
    };

    use super::*;

    /// Hands out a fixed set of advertisements, then stays silent.
    #[derive(Default)]
    struct FixedBrowser {
        ads: Vec<Advertisement>,
        sender: Mutex<Option<mpsc::Sender<Advertisement>>>,
    }

    impl ServiceBrowser for FixedBrowser {
        fn start(&self, _service_type: &str) -> Result<mpsc::Receiver<Advertisement>, LocateError> {
            let (tx, rx) = mpsc::channel(8);
            for ad in &self.ads {
                tx.try_send(ad.clone()).unwrap();
            }
            *self.sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        fn stop(&self, _service_type: &str) -> Result<(), LocateError> {
            self.sender.lock().unwrap().take();
            Ok(())
        }
    }

    fn address_of(server: &MockServer) -> DeviceAddress {
        DeviceAddress::from_ip(server.address().ip(), server.address().port()).unwrap()
    }

    fn app(config: CoreConfig, browser: FixedBrowser) -> Router {
        app_with(config, browser, RelayPolicy::default())
    }

    fn app_with(config: CoreConfig, browser: FixedBrowser, policy: RelayPolicy) -> Router {
        let controller = Controller::builder(config)
            .browser(Arc::new(browser))
            .store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        router(controller, policy)
    }

    fn with_headers(req: Request<Body>, headers: &[(&'static str, &str)]) -> Request<Body> {
        let (mut parts, body) = req.into_parts();
        for (name, value) in headers {
            parts.headers.insert(*name, value.parse().unwrap());
        }
        Request::from_parts(parts, body)
    }

    fn paired_with(server: &MockServer) -> CoreConfig {
        CoreConfig {
            address: Some(address_of(server)),
            credential: Some(Credential::new("abc123")),
            ..CoreConfig::default()
        }
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn brightness_accepts_integer_strings() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/abc123/state"))
            .and(body_json(json!({ "brightness": { "value": 42 } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let app = app(paired_with(&server), FixedBrowser::default());

        let (status, body) = call(&app, post_json("/api/set-brightness", &json!({ "brightness": "42" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "brightness": 42, "apiStatus": 204 }));
    }

    #[tokio::test]
    async fn invalid_input_is_400_without_device_call() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        let app = app(paired_with(&server), FixedBrowser::default());

        for (uri, body) in [
            ("/api/set-brightness", json!({ "brightness": 101 })),
            ("/api/set-hue", json!({ "hue": "abc" })),
            ("/api/set-sat", json!({ "sat": 4.5 })),
            ("/api/set-on-state", json!({ "onState": "true" })),
            ("/api/set-ct", json!({})),
            ("/api/select-effect", json!({ "effectName": "   " })),
        ] {
            let (status, reply) = call(&app, post_json(uri, &body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(reply["outcome"], "validation_error", "{uri}");
            assert_eq!(reply["success"], false);
        }
    }

    #[tokio::test]
    async fn rejected_token_is_401_then_428() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/abc123/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        let app = app(paired_with(&server), FixedBrowser::default());

        let (status, body) = call(&app, get_req("/api/get-state")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["outcome"], "unauthorized");

        let (status, body) = call(&app, get_req("/api/get-state")).await;
        assert_eq!(status.as_u16(), 428);
        assert_eq!(body["missing"], "credential");
    }

    #[tokio::test]
    async fn get_state_returns_device_json() {
        let server = MockServer::start().await;
        let device = json!({
            "name": "Shapes 4D2A",
            "state": { "on": { "value": true }, "brightness": { "value": 60, "min": 0, "max": 100 } },
            "effects": { "select": "Northern Lights", "effectsList": ["Northern Lights"] },
        });
        Mock::given(method("GET"))
            .and(path("/api/v1/abc123/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&device))
            .mount(&server)
            .await;
        let app = app(paired_with(&server), FixedBrowser::default());

        let (status, body) = call(&app, get_req("/api/get-state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Shapes 4D2A");
        assert_eq!(body["state"]["brightness"]["value"], 60);
        assert_eq!(body["effects"]["select"], "Northern Lights");
    }

    #[tokio::test]
    async fn unconfigured_relay_reports_428() {
        let app = app(CoreConfig::default(), FixedBrowser::default());
        let (status, body) = call(&app, get_req("/api/get-effects-list")).await;
        assert_eq!(status.as_u16(), 428);
        assert_eq!(body["missing"], "both");
    }

    #[tokio::test]
    async fn host_header_selects_its_own_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth_token": "xyz789" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/xyz789/effects/effectsList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Flames", "Rainbow Flow"])))
            .mount(&server)
            .await;
        let app = app(CoreConfig::default(), FixedBrowser::default());
        let host = address_of(&server).to_string();
        let with_host = |req: Request<Body>| {
            let (mut parts, body) = req.into_parts();
            parts.headers.insert(HOST_HEADER, host.parse().unwrap());
            Request::from_parts(parts, body)
        };

        let (status, body) = call(&app, with_host(get_req("/api/get-effects-list"))).await;
        assert_eq!(status.as_u16(), 428);
        assert_eq!(body["missing"], "credential");

        let (status, body) = call(&app, with_host(post_json("/api/add-user", &Value::Null))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["auth_token"], "xyz789");

        let (status, body) = call(&app, with_host(get_req("/api/get-effects-list"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["Flames", "Rainbow Flow"]));

        // The process session is untouched.
        let (status, _) = call(&app, get_req("/api/get-effects-list")).await;
        assert_eq!(status.as_u16(), 428);
    }

    #[tokio::test]
    async fn pairing_window_closed_is_403() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/new"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let config = CoreConfig {
            address: Some(address_of(&server)),
            ..CoreConfig::default()
        };
        let app = app(config, FixedBrowser::default());

        let (status, body) = call(&app, post_json("/api/add-user", &Value::Null)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["outcome"], "pairing_window_closed");
    }

    #[tokio::test]
    async fn set_address_accepts_bare_host() {
        let app = app(CoreConfig::default(), FixedBrowser::default());

        let (status, body) = call(&app, post_json("/api/set-address", &json!({ "address": "192.168.1.50" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], "192.168.1.50:16021");

        let (status, _) = call(&app, post_json("/api/set-address", &json!({ "address": "not a host" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Address known, credential still missing.
        let (status, body) = call(&app, get_req("/api/get-state")).await;
        assert_eq!(status.as_u16(), 428);
        assert_eq!(body["missing"], "credential");
    }

    #[tokio::test]
    async fn discover_binds_the_advertised_device() {
        let browser = FixedBrowser {
            ads: vec![Advertisement {
                name: "Shapes 4D2A._nanoleafapi._tcp.local.".into(),
                addresses: vec!["192.168.1.50".parse().unwrap()],
                port: Some(16021),
            }],
            ..FixedBrowser::default()
        };
        let app = app(CoreConfig::default(), browser);

        let (status, body) = call(&app, post_json("/api/discover", &Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "address": "192.168.1.50:16021" }));
    }

    #[tokio::test]
    async fn foreign_origin_is_refused_before_the_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth_token": "xyz789" })))
            .expect(0)
            .mount(&server)
            .await;
        let app = app(paired_with(&server), FixedBrowser::default());
        let foreign = [("origin", "http://evil.example"), ("host", "127.0.0.1:8778")];

        let req = with_headers(post_json("/api/set-on-state", &json!({ "onState": true })), &foreign);
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "success": false, "error": "origin not allowed" }));

        let req = with_headers(post_json("/api/add-user", &Value::Null), &foreign);
        let (status, _) = call(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn same_origin_passes_without_cors_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/abc123/state"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let app = app(paired_with(&server), FixedBrowser::default());

        let req = with_headers(
            post_json("/api/set-on-state", &json!({ "onState": true })),
            &[("origin", "http://127.0.0.1:8778"), ("host", "127.0.0.1:8778")],
        );
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn listed_origin_gets_cors_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/abc123/effects/effectsList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Flames"])))
            .mount(&server)
            .await;
        let policy = RelayPolicy::from_section(&ServerSection {
            allowed_origins: vec!["http://panel.lan:3000/".into()],
            ..ServerSection::default()
        })
        .unwrap();
        let app = app_with(paired_with(&server), FixedBrowser::default(), policy);
        let listed = [("origin", "http://panel.lan:3000"), ("host", "127.0.0.1:8778")];

        let resp = app
            .clone()
            .oneshot(with_headers(get_req("/api/get-effects-list"), &listed))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "http://panel.lan:3000");

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/set-brightness")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(with_headers(preflight, &listed)).await.unwrap();
        assert_eq!(resp.headers()["access-control-allow-origin"], "http://panel.lan:3000");
    }

    #[test]
    fn malformed_allowed_origin_is_a_config_error() {
        let section = ServerSection {
            allowed_origins: vec!["http://bad\norigin".into()],
            ..ServerSection::default()
        };
        assert!(matches!(
            RelayPolicy::from_section(&section),
            Err(CliError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn host_header_can_be_disabled() {
        let policy = RelayPolicy {
            host_header: false,
            ..RelayPolicy::default()
        };
        let app = app_with(CoreConfig::default(), FixedBrowser::default(), policy);

        let req = with_headers(get_req("/api/get-state"), &[(HOST_HEADER, "192.168.1.50")]);
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["outcome"], "validation_error");
    }

    #[tokio::test]
    async fn host_sessions_are_capped() {
        let policy = RelayPolicy {
            max_host_sessions: 1,
            ..RelayPolicy::default()
        };
        let app = app_with(CoreConfig::default(), FixedBrowser::default(), policy);
        let to = |host: &str| with_headers(get_req("/api/get-state"), &[(HOST_HEADER, host)]);

        let (status, _) = call(&app, to("192.168.1.50")).await;
        assert_eq!(status.as_u16(), 428);

        let (status, body) = call(&app, to("192.168.1.51")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "too many device sessions");

        // A host that already has a session is still served.
        let (status, _) = call(&app, to("192.168.1.50")).await;
        assert_eq!(status.as_u16(), 428);
    }

    #[test]
    fn numeric_fields_parse_ints_and_int_strings_only() {
        let body = json!({ "a": 7, "b": " 12 ", "c": "12px", "d": true, "e": -3 });
        assert_eq!(int_field(&body, "a"), Ok(7));
        assert_eq!(int_field(&body, "b"), Ok(12));
        assert!(int_field(&body, "c").is_err());
        assert!(int_field(&body, "d").is_err());
        assert_eq!(int_field(&body, "e"), Ok(-3));
        assert_eq!(int_field(&body, "missing"), Err("missing missing".into()));
    }
}
