//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Expose service identity, health and runtime introspection routes

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::environment::Environment;
use crate::observability::logging::{StructuredLogger, TRACE_CONTEXT_HEADER};
use crate::registry::{Registry, RegistryError};
use crate::store::ConfigStore;

/// Registry name of the shared [`Environment`].
pub const ENVIRONMENT: &str = "environment";

/// Who this service is, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub revision: String,
    pub project_id: String,
    pub region: String,
    pub url: String,
}

impl ServiceIdentity {
    pub async fn resolve(env: &Environment) -> Self {
        Self {
            name: env.name(),
            revision: env.service_revision(),
            project_id: env.project_id().await,
            region: env.region().await,
            url: env.url().await,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub store: Arc<ConfigStore>,
    pub logger: Arc<StructuredLogger>,
    pub identity: Arc<ServiceIdentity>,
}

#[derive(Debug, Serialize)]
struct EnvironmentReport {
    local: bool,
    name: String,
    revision: String,
    port: String,
    job_execution: String,
    task_index: i64,
    task_attempt: i64,
    task_count: i64,
    region: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct Listing {
    count: usize,
    names: Vec<String>,
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(identity_handler))
        .route("/healthz", get(health_handler))
        .route("/_runtime/resources", get(resources_handler))
        .route("/_runtime/config", get(config_handler))
        .route("/_runtime/environment", get(environment_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(config.request_timeout())),
        )
}

fn trace_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(TRACE_CONTEXT_HEADER).and_then(|v| v.to_str().ok())
}

async fn identity_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.logger.info("identity requested", trace_header(&headers));
    Json(state.identity.as_ref().clone())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn resources_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.logger.debug("resource listing requested", trace_header(&headers));
    Json(Listing {
        count: state.registry.count(),
        names: state.registry.list_names(),
    })
}

async fn config_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.logger.debug("config listing requested", trace_header(&headers));
    Json(Listing {
        count: state.store.count(),
        names: state.store.list_keys(),
    })
}

async fn environment_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let env = match state.registry.get::<Environment>(ENVIRONMENT) {
        Ok(env) => env,
        Err(e) => {
            state.logger.error(format!("environment unavailable: {}", e), trace_header(&headers));
            let status = match e {
                RegistryError::NotFound(_) | RegistryError::Uninitializable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return (status, e.to_string()).into_response();
        }
    };

    Json(EnvironmentReport {
        local: env.is_local(),
        name: env.name(),
        revision: env.service_revision(),
        port: env.port(),
        job_execution: env.job_execution(),
        task_index: env.job_task_index(),
        task_attempt: env.job_task_attempt(),
        task_count: env.job_task_count(),
        region: env.region().await,
        url: env.url().await,
    })
    .into_response()
}
