//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use tokio::net::TcpListener;

use service_runtime::config::ServerConfig;

/// Server config on an ephemeral loopback port with the given drain budget.
pub fn server_config(grace: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        shutdown_grace_ms: grace.as_millis() as u64,
        ..Default::default()
    }
}

/// Minimal application used by lifecycle tests.
pub fn health_app() -> Router {
    Router::new().route("/healthz", get(|| async { "ok" }))
}

#[derive(Clone)]
struct MetadataState {
    values: Arc<HashMap<String, String>>,
    hits: Arc<AtomicUsize>,
}

/// Start a mock metadata server serving `values` (path → body) under
/// `/computeMetadata/v1/`. A key may carry the raw query string, as in
/// `path?audience=...`. Requests without `Metadata-Flavor: Google` get 403,
/// unknown paths 404.
///
/// Returns the API root URL and a counter of answered requests.
pub async fn start_metadata_server(values: &[(&str, &str)]) -> (String, Arc<AtomicUsize>) {
    let state = MetadataState {
        values: Arc::new(
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let hits = Arc::clone(&state.hits);

    let app = Router::new()
        .route("/computeMetadata/v1/{*path}", get(metadata_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/computeMetadata/v1", addr), hits)
}

async fn metadata_handler(
    State(state): State<MetadataState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let flavor = headers.get("metadata-flavor").and_then(|v| v.to_str().ok());
    if flavor != Some("Google") {
        return (StatusCode::FORBIDDEN, "missing Metadata-Flavor header".into());
    }

    state.hits.fetch_add(1, Ordering::SeqCst);
    let key = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    match state.values.get(&key) {
        Some(value) => (StatusCode::OK, format!("{}\n", value)),
        None => (StatusCode::NOT_FOUND, "not found".into()),
    }
}
