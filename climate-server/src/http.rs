//! HTTP surface for the ingestion pipeline.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use climate_core::{Observation, ObservationRecorder, ObservationStore, StoreError};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub recorder: ObservationRecorder,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub enum ApiError {
    Store(StoreError),
    NotFound(i64),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Store(err) => {
                error!(error = %err, "record store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store observation".to_string())
            }
            ApiError::NotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Observation {id} not found"))
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// GET /api/climate/live/{city} - Fetch, persist and return current weather.
///
/// A provider failure yields `200` with a `null` body.
async fn live_climate(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<Option<Observation>>, ApiError> {
    let observation = state.recorder.record_current_weather(&city).await?;
    Ok(Json(observation))
}

/// GET /api/climate/records/{id} - Read back a stored observation.
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Observation>, ApiError> {
    state
        .recorder
        .store()
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Create the HTTP router
pub fn create_router(recorder: ObservationRecorder) -> Router {
    let state = AppState { recorder };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/climate/live/{city}", get(live_climate))
        .route("/api/climate/records/{id}", get(get_record))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_http_server(recorder: ObservationRecorder, bind: &str) -> anyhow::Result<()> {
    let app = create_router(recorder);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
