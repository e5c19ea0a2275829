//! An in-process stand-in for the home-automation controller's REST API.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";

/// A request the fake controller received
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    /// Served by GET /api/states and GET /api/states/:id
    pub states: Vec<Value>,
    /// Served by every POST /api/services/...
    pub service_response: Vec<Value>,
    /// Served verbatim instead of `states` when set
    pub raw_states_body: Option<String>,
    /// Every request fails with this status when set
    pub status: Option<u16>,
    /// Delay before answering
    pub delay: Option<Duration>,
    pub requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeController {
    pub url: String,
    state: Shared,
}

impl FakeController {
    pub async fn start(state: FakeState) -> Self {
        let state = Arc::new(Mutex::new(state));

        let app = Router::new()
            .route("/api/states", get(all_states))
            .route("/api/states/:entity_id", get(one_state))
            .route("/api/services/:domain/:service", post(call_service))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

/// Record the request and decide whether it is answered normally.
async fn admit(
    state: &Shared,
    method: &str,
    path: String,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Result<(), Response> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (status, delay) = {
        let mut state = state.lock().unwrap();
        state.requests.push(Recorded {
            method: method.to_string(),
            path,
            authorization: authorization.clone(),
            body,
        });
        (state.status, state.delay)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let expected = format!("Bearer {}", TOKEN);
    if authorization.as_deref() != Some(expected.as_str()) {
        return Err((StatusCode::UNAUTHORIZED, "401: Unauthorized").into_response());
    }

    if let Some(status) = status {
        let status = StatusCode::from_u16(status).unwrap();
        return Err((status, "upstream failure").into_response());
    }

    Ok(())
}

fn json(value: &impl serde::Serialize) -> Response {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        serde_json::to_string(value).unwrap(),
    )
        .into_response()
}

async fn all_states(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = admit(&state, "GET", "/api/states".to_string(), &headers, None).await {
        return response;
    }

    let state = state.lock().unwrap();
    match &state.raw_states_body {
        Some(raw) => (StatusCode::OK, raw.clone()).into_response(),
        None => json(&state.states),
    }
}

async fn one_state(
    State(state): State<Shared>,
    Path(entity_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/api/states/{}", entity_id);
    if let Err(response) = admit(&state, "GET", path, &headers, None).await {
        return response;
    }

    let state = state.lock().unwrap();
    match state
        .states
        .iter()
        .find(|entity| entity["entity_id"] == entity_id.as_str())
    {
        Some(entity) => json(entity),
        None => (StatusCode::NOT_FOUND, "Entity not found.").into_response(),
    }
}

async fn call_service(
    State(state): State<Shared>,
    Path((domain, service)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = format!("/api/services/{}/{}", domain, service);
    let body = serde_json::from_str(&body).ok();
    if let Err(response) = admit(&state, "POST", path, &headers, body).await {
        return response;
    }

    let state = state.lock().unwrap();
    json(&state.service_response)
}

/// A state record the way the controller reports it
pub fn entity(entity_id: &str, state: &str, friendly_name: &str) -> Value {
    serde_json::json!({
        "entity_id": entity_id,
        "state": state,
        "attributes": {"friendly_name": friendly_name},
        "last_changed": "2025-10-19T21:31:10.990756+00:00",
        "last_updated": "2025-10-19T21:31:10.990756+00:00",
        "context": {"id": "01K7Z64AS24W318GX1E2FYHCGM", "parent_id": null, "user_id": null}
    })
}

/// A script record with its last run
pub fn script(entity_id: &str, friendly_name: &str, last_triggered: Option<&str>) -> Value {
    serde_json::json!({
        "entity_id": entity_id,
        "state": "off",
        "attributes": {
            "last_triggered": last_triggered,
            "mode": "single",
            "current": 0,
            "friendly_name": friendly_name
        }
    })
}
