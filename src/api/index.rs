//! Application index and resolver endpoints

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;

/// Index status
#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub building: bool,
    pub entries: usize,
}

/// Rebuild request outcome
#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub started: bool,
}

/// Resolution result
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub target: String,
    pub hints: Vec<String>,
    pub kind: &'static str,
    pub path: Option<PathBuf>,
}

/// Build the `/api` router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/index", get(status))
        .route("/index/rebuild", post(rebuild))
        .route("/resolve", get(resolve))
        .with_state(state)
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<IndexStatus> {
    let index = state.resolver.index();
    Json(IndexStatus {
        ready: index.is_ready(),
        building: index.is_building(),
        entries: index.snapshot().len(),
    })
}

async fn rebuild(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<RebuildResponse>) {
    // The build publishes on its own; the handle is not awaited
    let started = state.resolver.rebuild_index().is_some();
    tracing::info!(started, "index rebuild requested");

    let code = if started {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };
    (code, Json(RebuildResponse { started }))
}

/// `GET /api/resolve?target=chrome&hint=browser&hint=google`
async fn resolve(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ResolveResponse>, (StatusCode, String)> {
    let mut target = None;
    let mut hints = Vec::new();
    for (key, value) in params {
        match key.as_str() {
            "target" => target = Some(value),
            "hint" => hints.push(value),
            _ => {}
        }
    }
    let target = target.ok_or_else(|| (StatusCode::BAD_REQUEST, "missing target".to_string()))?;

    // Resolution walks the filesystem
    let resolver = Arc::clone(&state.resolver);
    let (target, hints, resolved) = tokio::task::spawn_blocking(move || {
        let resolved = resolver.resolve(&target, &hints);
        (target, hints, resolved)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ResolveResponse {
        target,
        hints,
        kind: resolved.kind(),
        path: resolved.path().map(PathBuf::from),
    }))
}
