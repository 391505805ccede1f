//! Looker API surface consumed by the pipeline
//!
//! `LookerApi` is the seam between the pipeline and the BI platform. Every
//! call returns an envelope (`ApiResponse`) that callers must check before
//! trusting the payload. `LookerClient` is the HTTP implementation.

pub mod client;
pub mod types;

pub use client::LookerClient;
pub use types::*;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Failure half of the API envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// HTTP status, `None` for transport failures
    pub status: Option<u16>,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

pub type ApiResponse<T> = std::result::Result<T, ApiFailure>;

/// Per-call transport overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSettings {
    pub timeout: Option<Duration>,
}

impl TransportSettings {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
pub trait LookerApi: Send + Sync {
    async fn lookml_model(&self, model_name: &str) -> ApiResponse<LookmlModel>;

    async fn lookml_model_explore(
        &self,
        model_name: &str,
        explore_name: &str,
        fields: &str,
    ) -> ApiResponse<LookmlModelExplore>;

    async fn create_sql_query(
        &self,
        body: &SqlQueryCreate,
        settings: &TransportSettings,
    ) -> ApiResponse<SqlQuery>;

    async fn run_sql_query(
        &self,
        slug: &str,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<serde_json::Value>;

    async fn run_query(
        &self,
        query_id: &str,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<serde_json::Value>;

    async fn create_query(
        &self,
        body: &WriteQuery,
        settings: &TransportSettings,
    ) -> ApiResponse<Query>;

    /// Runs an unsaved query; the body is returned as text in `result_format`
    async fn run_inline_query(
        &self,
        body: &WriteQuery,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<String>;
}
