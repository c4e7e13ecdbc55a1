//! Data Product API
//!
//! HTTP endpoints under `/api/dataproducts`:
//! - Product and artifact discovery by uuid
//! - Placeholder sample files from the metadata directory
//! - Health and metrics
//!
//! Every read is served from whichever snapshot the store currently holds.
//! Until the first snapshot is published, discovery endpoints answer 503.

use crate::context::AppContext;
use crate::models::{Artifact, FqProduct};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::path::Component;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const ENDPOINT_PREFIX: &str = "/api/dataproducts";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_ready() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Metadata not loaded yet".to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Current snapshot, if it belongs to `uuid`
fn product_for(ctx: &AppContext, uuid: &str) -> Result<Arc<FqProduct>, ApiError> {
    let fqproduct = ctx.store.get().ok_or_else(ApiError::not_ready)?;
    if !fqproduct.matches(uuid) {
        let msg = format!("Invalid uuid:{} (does not match uuid for product)", uuid);
        warn!("{}", msg);
        return Err(ApiError::not_found(msg));
    }
    Ok(fqproduct)
}

// ============================================================================
// DISCOVERY
// ============================================================================

async fn get_product(
    State(ctx): State<Arc<AppContext>>,
    Path(uuid): Path<String>,
) -> Result<Json<FqProduct>, ApiError> {
    let fqproduct = product_for(&ctx, &uuid)?;
    Ok(Json(fqproduct.as_ref().clone()))
}

async fn list_artifacts(
    State(ctx): State<Arc<AppContext>>,
    Path(uuid): Path<String>,
) -> Result<Json<Vec<Artifact>>, ApiError> {
    let fqproduct = product_for(&ctx, &uuid)?;
    Ok(Json(fqproduct.artifacts.clone()))
}

async fn get_artifact(
    State(ctx): State<Arc<AppContext>>,
    Path((uuid, artifact_uuid)): Path<(String, String)>,
) -> Result<Json<Artifact>, ApiError> {
    let fqproduct = product_for(&ctx, &uuid)?;
    fqproduct
        .artifact(&artifact_uuid)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Artifact not found: {}", artifact_uuid)))
}

/// Sample and placeholder files, relative to the metadata directory
///
/// `.json` files are returned as JSON, anything else as text.
async fn get_tmp_file(
    State(ctx): State<Arc<AppContext>>,
    Path((_uuid, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let relative = std::path::Path::new(&path);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(ApiError::bad_request(format!("Invalid path: {}", path)));
    }

    let fqpath = ctx.metadata.directory().join(relative);
    info!("Reading fqpath: {}", fqpath.display());

    let contents = tokio::fs::read_to_string(&fqpath).await.map_err(|e| {
        let msg = format!("Could not read file, path:{} error:{}", fqpath.display(), e);
        error!("{}", msg);
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::not_found(msg)
        } else {
            ApiError::internal(msg)
        }
    })?;

    if fqpath.extension().is_some_and(|ext| ext == "json") {
        let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            let msg = format!("Invalid JSON, path:{} error:{}", fqpath.display(), e);
            error!("{}", msg);
            ApiError::internal(msg)
        })?;
        return Ok(Json(value).into_response());
    }

    Ok(contents.into_response())
}

async fn not_implemented(Path(_uuid): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "msg": "Not implemented" }))
}

// ============================================================================
// MONITORING
// ============================================================================

async fn health(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    Json(json!({
        "health": "OK",
        "ready": ctx.store.is_ready(),
        "state": ctx.status.state(),
    }))
}

async fn metrics(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let artifacts = ctx.store.get().map(|fq| fq.artifacts.len()).unwrap_or(0);
    Json(json!({
        "metrics": {
            "reloads": ctx.status.completed(),
            "state": ctx.status.state(),
            "artifacts": artifacts,
        }
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(ctx: Arc<AppContext>) -> Router {
    let routes = Router::new()
        .route("/uuid/:uuid", get(get_product))
        .route("/uuid/:uuid/artifacts", get(list_artifacts))
        .route("/uuid/:uuid/artifacts/:artifact_uuid", get(get_artifact))
        .route("/uuid/:uuid/tmp/*path", get(get_tmp_file))
        .route("/uuid/:uuid/metrics", get(not_implemented))
        .route("/uuid/:uuid/admin", get(not_implemented))
        .route("/health", get(health))
        .route("/metrics", get(metrics));

    Router::new()
        .nest(ENDPOINT_PREFIX, routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(ctx)
}

/// Serve the API until the listener fails
pub async fn serve(ctx: Arc<AppContext>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("START: service on {}", addr);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
