//! HTTP implementation of `LookerApi` over the Looker 4.0 REST API

use super::{
    ApiFailure, ApiResponse, LookerApi, LookmlModel, LookmlModelExplore, Query, SqlQuery,
    SqlQueryCreate, TransportSettings, WriteQuery,
};
use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Timeout for calls that do not override it (the SDK's interactive default)
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct LookerClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl LookerClient {
    pub fn new(base_url: &str, access_token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_url: format!("{}/api/4.0", base_url.trim_end_matches('/')),
            access_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.looker_base_url, config.access_token.clone())
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        settings: &TransportSettings,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.api_url, path);
        debug!("Looker API {} {}", method, url);

        let mut builder = self
            .http
            .request(method, url)
            .header("Authorization", format!("token {}", self.access_token));
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> ApiResponse<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiFailure::new(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::new(Some(status.as_u16()), body));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ApiResponse<T> {
        let response = self.send(builder).await?;
        let status = response.status().as_u16();
        response
            .json::<T>()
            .await
            .map_err(|e| ApiFailure::new(Some(status), format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl LookerApi for LookerClient {
    async fn lookml_model(&self, model_name: &str) -> ApiResponse<LookmlModel> {
        let builder = self.request(
            reqwest::Method::GET,
            &format!("lookml_models/{}", model_name),
            &TransportSettings::default(),
        );
        self.send_json(builder).await
    }

    async fn lookml_model_explore(
        &self,
        model_name: &str,
        explore_name: &str,
        fields: &str,
    ) -> ApiResponse<LookmlModelExplore> {
        let builder = self
            .request(
                reqwest::Method::GET,
                &format!("lookml_models/{}/explores/{}", model_name, explore_name),
                &TransportSettings::default(),
            )
            .query(&[("fields", fields)]);
        self.send_json(builder).await
    }

    async fn create_sql_query(
        &self,
        body: &SqlQueryCreate,
        settings: &TransportSettings,
    ) -> ApiResponse<SqlQuery> {
        let builder = self
            .request(reqwest::Method::POST, "sql_queries", settings)
            .json(body);
        self.send_json(builder).await
    }

    async fn run_sql_query(
        &self,
        slug: &str,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<serde_json::Value> {
        let builder = self.request(
            reqwest::Method::POST,
            &format!("sql_queries/{}/run/{}", slug, result_format),
            settings,
        );
        self.send_json(builder).await
    }

    async fn run_query(
        &self,
        query_id: &str,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<serde_json::Value> {
        let builder = self.request(
            reqwest::Method::GET,
            &format!("queries/{}/run/{}", query_id, result_format),
            settings,
        );
        self.send_json(builder).await
    }

    async fn create_query(
        &self,
        body: &WriteQuery,
        settings: &TransportSettings,
    ) -> ApiResponse<Query> {
        let builder = self
            .request(reqwest::Method::POST, "queries", settings)
            .json(body);
        self.send_json(builder).await
    }

    async fn run_inline_query(
        &self,
        body: &WriteQuery,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<String> {
        let builder = self
            .request(
                reqwest::Method::POST,
                &format!("queries/run/{}", result_format),
                settings,
            )
            .json(body);
        let response = self.send(builder).await?;
        response
            .text()
            .await
            .map_err(|e| ApiFailure::new(None, e.to_string()))
    }
}
