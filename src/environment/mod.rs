//! Hosting environment lookups.
//!
//! # Responsibilities
//! - Read service/job identity from the platform's environment variables
//! - Resolve project, region and account details from the metadata server
//! - Always answer: every lookup has a documented fallback
//!
//! # Design Decisions
//! - The metadata server is never contacted when running locally
//! - Metadata-backed values are resolved once and cached
//! - Variable source is injectable so lookups are testable without touching
//!   the process environment

pub mod metadata;

pub use metadata::{MetadataClient, MetadataError, METADATA_URL};

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::OnceCell;

/// Source of environment variables.
pub trait Vars: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessVars;

impl Vars for ProcessVars {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Vars for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

pub const LOCAL: &str = "local";
const DEFAULT_PORT: &str = "8080";
const MIN_PROJECT_ID_LEN: usize = 6;
const LOCAL_ACCESS_TOKEN: &str = "local-access-token";
const LOCAL_IDENTITY_TOKEN: &str = "local-identity-token";
const TOKEN_PATH: &str = "instance/service-accounts/default/token";
const IDENTITY_PATH: &str = "instance/service-accounts/default/identity";

/// Body of the metadata token endpoint.
#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
}

/// Best-effort view of where this process runs.
pub struct Environment {
    vars: Box<dyn Vars>,
    metadata: MetadataClient,
    project_id: OnceCell<String>,
    project_number: OnceCell<String>,
    region: OnceCell<String>,
    instance_id: OnceCell<String>,
    service_account_email: OnceCell<String>,
}

impl Environment {
    /// Environment backed by the process variables and the real metadata server.
    pub fn from_process() -> Self {
        Self::new(ProcessVars, MetadataClient::new())
    }

    pub fn new(vars: impl Vars + 'static, metadata: MetadataClient) -> Self {
        Self {
            vars: Box::new(vars),
            metadata,
            project_id: OnceCell::new(),
            project_number: OnceCell::new(),
            region: OnceCell::new(),
            instance_id: OnceCell::new(),
            service_account_email: OnceCell::new(),
        }
    }

    fn env(&self, key: &str) -> Option<String> {
        self.vars.var(key).filter(|v| !v.is_empty())
    }

    fn env_int(&self, key: &str) -> i64 {
        self.env(key).and_then(|v| v.trim().parse().ok()).unwrap_or(-1)
    }

    /// True unless a service or job identity variable is present.
    pub fn is_local(&self) -> bool {
        self.env("K_SERVICE").is_none() && self.env("CLOUD_RUN_JOB").is_none()
    }

    pub fn service_name(&self) -> String {
        self.env("K_SERVICE").unwrap_or_else(|| LOCAL.to_string())
    }

    pub fn service_revision(&self) -> String {
        self.env("K_REVISION")
            .unwrap_or_else(|| format!("{}-00001-xxx", self.name()))
    }

    pub fn job_name(&self) -> String {
        self.env("CLOUD_RUN_JOB").unwrap_or_else(|| LOCAL.to_string())
    }

    pub fn job_execution(&self) -> String {
        self.env("CLOUD_RUN_EXECUTION").unwrap_or_else(|| LOCAL.to_string())
    }

    /// Service name, else job name, else `local`.
    pub fn name(&self) -> String {
        self.env("K_SERVICE")
            .or_else(|| self.env("CLOUD_RUN_JOB"))
            .unwrap_or_else(|| LOCAL.to_string())
    }

    pub fn port(&self) -> String {
        self.env("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string())
    }

    pub fn job_task_index(&self) -> i64 {
        self.env_int("CLOUD_RUN_TASK_INDEX")
    }

    pub fn job_task_attempt(&self) -> i64 {
        self.env_int("CLOUD_RUN_TASK_ATTEMPT")
    }

    pub fn job_task_count(&self) -> i64 {
        self.env_int("CLOUD_RUN_TASK_COUNT")
    }

    /// `GOOGLE_CLOUD_PROJECT`, then the metadata server, then `local`.
    /// Values shorter than a valid project id are skipped.
    pub async fn project_id(&self) -> String {
        self.project_id
            .get_or_init(|| async {
                if let Some(project) = self
                    .env("GOOGLE_CLOUD_PROJECT")
                    .filter(|p| p.len() >= MIN_PROJECT_ID_LEN)
                {
                    return project;
                }
                self.metadata_value("project/project-id", &[])
                    .await
                    .filter(|p| p.len() >= MIN_PROJECT_ID_LEN)
                    .unwrap_or_else(|| LOCAL.to_string())
            })
            .await
            .clone()
    }

    pub async fn project_number(&self) -> String {
        self.cached(&self.project_number, "project/numeric-project-id", "000000000000")
            .await
    }

    /// Serving region, e.g. `us-central1`.
    pub async fn region(&self) -> String {
        self.region
            .get_or_init(|| async {
                self.metadata_value("instance/region", &[])
                    .await
                    .and_then(|r| r.rsplit('/').next().map(str::to_string))
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| LOCAL.to_string())
            })
            .await
            .clone()
    }

    pub async fn instance_id(&self) -> String {
        self.cached(&self.instance_id, "instance/id", "000000").await
    }

    pub async fn service_account_email(&self) -> String {
        self.cached(
            &self.service_account_email,
            "instance/service-accounts/default/email",
            "local@localhost.com",
        )
        .await
    }

    /// Address this service is reachable at.
    pub async fn url(&self) -> String {
        let region = self.region().await;
        if region == LOCAL {
            return format!("http://localhost:{}", self.port());
        }
        format!(
            "https://{}-{}.{}.run.app",
            self.service_name(),
            self.project_number().await,
            region
        )
    }

    /// Fresh OAuth2 access token for the instance's service account, or
    /// `local-access-token` when none can be obtained. Never cached.
    pub async fn access_token(&self) -> String {
        self.metadata_value(TOKEN_PATH, &[])
            .await
            .and_then(|body| match serde_json::from_str::<AccessToken>(&body) {
                Ok(token) => Some(token.access_token),
                Err(e) => {
                    tracing::debug!(error = %e, "Unreadable access token response");
                    None
                }
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| LOCAL_ACCESS_TOKEN.to_string())
    }

    /// OIDC identity token minted for `audience`, or `local-identity-token`
    /// when none can be obtained. Never cached.
    pub async fn identity_token(&self, audience: &str) -> String {
        self.metadata_value(IDENTITY_PATH, &[("audience", audience)])
            .await
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| LOCAL_IDENTITY_TOKEN.to_string())
    }

    /// Attach `Authorization: Bearer <access token>` to `request`.
    pub async fn with_access_token(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(self.access_token().await)
    }

    /// Attach `Authorization: Bearer <identity token for audience>` to `request`.
    pub async fn with_identity_token(
        &self,
        request: reqwest::RequestBuilder,
        audience: &str,
    ) -> reqwest::RequestBuilder {
        request.bearer_auth(self.identity_token(audience).await)
    }

    async fn cached(&self, cell: &OnceCell<String>, path: &str, fallback: &str) -> String {
        cell.get_or_init(|| async {
            self.metadata_value(path, &[])
                .await
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        })
        .await
        .clone()
    }

    async fn metadata_value(&self, path: &str, query: &[(&str, &str)]) -> Option<String> {
        if self.is_local() {
            return None;
        }
        match self.metadata.get_with_query(path, query).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(path, error = %e, "Metadata lookup failed, using fallback");
                None
            }
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("local", &self.is_local())
            .field("metadata", &self.metadata.base_url())
            .finish_non_exhaustive()
    }
}
