//! Request Gateway
//!
//! HTTP front door for the conductor.
//!
//! # Endpoints
//!
//! - POST /generateVariant - Generate variants (alias: POST /api/generateVariant)
//! - GET /health - Liveness and configured model
//!
//! Authentication runs before body validation, and both run before any
//! upstream call. Failures are returned as `{"error": "..."}` with the status
//! chosen by [`VariantErrorExt::status_code`].

pub mod auth;
pub mod request;

pub use auth::BearerAuth;
pub use request::parse_request;

use crate::conductor::Conductor;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sdk::errors::{VariantError, VariantErrorExt};
use sdk::types::VariantResult;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Gateway state shared across handlers
#[derive(Clone)]
pub struct AppState {
    conductor: Arc<Conductor>,
    auth: Arc<BearerAuth>,
}

impl AppState {
    pub fn new(conductor: Arc<Conductor>, auth: BearerAuth) -> Self {
        Self {
            conductor,
            auth: Arc::new(auth),
        }
    }
}

/// Caller-facing error response
#[derive(Debug)]
pub struct ApiError(pub VariantError);

impl From<VariantError> for ApiError {
    fn from(err: VariantError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/generateVariant", post(generate_variant_handler))
        .route("/api/generateVariant", post(generate_variant_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    if !state.auth.is_configured() {
        tracing::warn!("No bearer token configured; every generation request will be rejected");
    }
    tracing::info!(
        model = state.conductor.provider().model(),
        "Gateway listening on http://{}",
        local
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Gateway shutting down gracefully");
        })
        .await?;

    Ok(())
}

async fn generate_variant_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<VariantResult>, ApiError> {
    if let Err(e) = state.auth.verify(&headers) {
        tracing::warn!("Rejected unauthenticated request");
        return Err(e.into());
    }

    let request = parse_request(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected invalid request");
        ApiError(e)
    })?;

    state
        .conductor
        .generate(&request)
        .await
        .map(Json)
        .map_err(|failure| ApiError(failure.error))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.conductor.provider().model(),
    }))
}
