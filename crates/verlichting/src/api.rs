use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::catalog::EntityCategory;
use crate::entity::OnOff;
use crate::entity::Scene;
use crate::entity::Switch;
use crate::gateway::Gateway;
use crate::gateway::GatewayError;
use crate::upstream::Upstream;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    /// Number of exposed entities per category
    exposed: Vec<(String, usize)>,
}

/// Body of every error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
struct AppState<U> {
    version: &'static str,
    gateway: Gateway<U>,
}

/// Errors a handler can answer with
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Gateway(GatewayError),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Gateway(err) if err.is_forbidden() => {
                tracing::info!("Rejected: {}", err);
                (StatusCode::FORBIDDEN, err.to_string())
            }
            ApiError::Gateway(err) => {
                tracing::warn!("Request failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info<U: Upstream>(State(state): State<Arc<AppState<U>>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let catalog = state.gateway.catalog();
    let exposed = [
        EntityCategory::Scenes,
        EntityCategory::Switches,
        EntityCategory::Lights,
        EntityCategory::States,
    ]
    .into_iter()
    .map(|category| (category.to_string(), catalog.allow_list(category).len()))
    .collect();

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            exposed,
        }),
    )
}

fn parse_state(new_state: &str) -> Result<OnOff, ApiError> {
    new_state.parse().map_err(|_| {
        ApiError::BadRequest(format!("invalid state {new_state:?}, expected on or off"))
    })
}

/// Handler for GET /api/scenes
#[tracing::instrument(skip(state))]
async fn list_scenes<U: Upstream>(State(state): State<Arc<AppState<U>>>) -> ApiResult<Vec<Scene>> {
    Ok(Json(state.gateway.list_scenes().await?))
}

/// Handler for POST /api/start_scene/:id/on
#[tracing::instrument(skip(state))]
async fn start_scene<U: Upstream>(
    State(state): State<Arc<AppState<U>>>,
    Path(id): Path<String>,
) -> ApiResult<Scene> {
    Ok(Json(state.gateway.start_scene(&id).await?))
}

/// Handler for GET /api/switches
#[tracing::instrument(skip(state))]
async fn list_switches<U: Upstream>(
    State(state): State<Arc<AppState<U>>>,
) -> ApiResult<Vec<Switch>> {
    Ok(Json(state.gateway.list_switches().await?))
}

/// Handler for POST /api/set_switch/:id/:new_state
#[tracing::instrument(skip(state))]
async fn set_switch<U: Upstream>(
    State(state): State<Arc<AppState<U>>>,
    Path((id, new_state)): Path<(String, String)>,
) -> ApiResult<Switch> {
    let desired = parse_state(&new_state)?;
    Ok(Json(state.gateway.set_switch(&id, desired).await?))
}

/// Handler for GET /api/lights
#[tracing::instrument(skip(state))]
async fn list_lights<U: Upstream>(State(state): State<Arc<AppState<U>>>) -> ApiResult<Vec<Switch>> {
    Ok(Json(state.gateway.list_lights().await?))
}

/// Handler for POST /api/set_light/:id/:new_state
#[tracing::instrument(skip(state))]
async fn set_light<U: Upstream>(
    State(state): State<Arc<AppState<U>>>,
    Path((id, new_state)): Path<(String, String)>,
) -> ApiResult<Switch> {
    let desired = parse_state(&new_state)?;
    Ok(Json(state.gateway.set_light(&id, desired).await?))
}

/// Handler for GET /api/states
#[tracing::instrument(skip(state))]
async fn list_states<U: Upstream>(State(state): State<Arc<AppState<U>>>) -> ApiResult<Vec<Switch>> {
    Ok(Json(state.gateway.list_boolean_states().await?))
}

/// Handler for POST /api/set_state/:id/:new_state
#[tracing::instrument(skip(state))]
async fn set_state<U: Upstream>(
    State(state): State<Arc<AppState<U>>>,
    Path((id, new_state)): Path<(String, String)>,
) -> ApiResult<Switch> {
    let desired = parse_state(&new_state)?;
    Ok(Json(state.gateway.set_boolean_state(&id, desired).await?))
}

/// Create the API router with all endpoints
pub fn create_router<U: Upstream + 'static>(gateway: Gateway<U>) -> Router {
    let state = Arc::new(AppState {
        version: env!("CARGO_PKG_VERSION"),
        gateway,
    });

    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info::<U>))
        .route("/api/scenes", get(list_scenes::<U>))
        .route("/api/start_scene/:id/on", post(start_scene::<U>))
        .route("/api/switches", get(list_switches::<U>))
        .route("/api/set_switch/:id/:new_state", post(set_switch::<U>))
        .route("/api/lights", get(list_lights::<U>))
        .route("/api/set_light/:id/:new_state", post(set_light::<U>))
        .route("/api/states", get(list_states::<U>))
        .route("/api/set_state/:id/:new_state", post(set_state::<U>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway on `listen:port` until `shutdown_rx` fires.
///
/// In-flight requests are allowed to finish. Fails if the address does not
/// parse or cannot be bound.
pub async fn serve<U: Upstream + 'static>(
    listen: &str,
    port: u16,
    gateway: Gateway<U>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(gateway);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
