//! In-memory `LookerApi` used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use explore_genai::looker::{
    ApiFailure, ApiResponse, ExploreField, ExploreFieldset, LookerApi, LookmlModel,
    LookmlModelExplore, LookmlModelNavExplore, Query, SqlQuery, SqlQueryCreate,
    TransportSettings, WriteQuery,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub struct FakeLooker {
    pub models: HashMap<String, ApiResponse<LookmlModel>>,
    pub explores: HashMap<(String, String), ApiResponse<LookmlModelExplore>>,
    pub create_sql: ApiResponse<SqlQuery>,
    pub run_sql: ApiResponse<serde_json::Value>,
    pub run_query: ApiResponse<serde_json::Value>,
    pub create_query: ApiResponse<Query>,
    pub inline: ApiResponse<String>,
    /// Added before answering `lookml_model`, to widen race windows
    pub model_delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
    pub created_sql: Mutex<Vec<SqlQueryCreate>>,
    pub inline_bodies: Mutex<Vec<(WriteQuery, String)>>,
    pub timeouts: Mutex<Vec<Option<Duration>>>,
}

impl Default for FakeLooker {
    fn default() -> Self {
        Self {
            models: HashMap::new(),
            explores: HashMap::new(),
            create_sql: Ok(SqlQuery {
                slug: Some("abc123".to_string()),
                sql: None,
            }),
            run_sql: Ok(serde_json::json!([])),
            run_query: Ok(serde_json::json!([])),
            create_query: Ok(Query {
                id: Some("42".to_string()),
                ..Query::default()
            }),
            inline: Ok(String::new()),
            model_delay: None,
            calls: Mutex::new(Vec::new()),
            created_sql: Mutex::new(Vec::new()),
            inline_bodies: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLooker {
    pub fn with_connections(mut self, model: &str, connections: &[&str]) -> Self {
        let entry = self
            .models
            .entry(model.to_string())
            .or_insert_with(|| Ok(LookmlModel::default()));
        if let Ok(m) = entry {
            m.allowed_db_connection_names =
                Some(connections.iter().map(|c| c.to_string()).collect());
        }
        self
    }

    /// Registers an explore on `model` and lists it in the model
    pub fn with_explore(mut self, model: &str, explore: &str, fields: ExploreFieldset) -> Self {
        let entry = self
            .models
            .entry(model.to_string())
            .or_insert_with(|| Ok(LookmlModel::default()));
        if let Ok(m) = entry {
            m.name = Some(model.to_string());
            m.explores.get_or_insert_with(Vec::new).push(LookmlModelNavExplore {
                name: Some(explore.to_string()),
                ..LookmlModelNavExplore::default()
            });
        }
        self.explores.insert(
            (model.to_string(), explore.to_string()),
            Ok(LookmlModelExplore {
                name: Some(explore.to_string()),
                fields: Some(fields),
                ..LookmlModelExplore::default()
            }),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn record_timeout(&self, settings: &TransportSettings) {
        self.timeouts.lock().unwrap().push(settings.timeout);
    }
}

pub fn field(name: &str, label: &str, description: &str) -> ExploreField {
    ExploreField {
        name: Some(name.to_string()),
        label: Some(label.to_string()),
        description: Some(description.to_string()),
    }
}

pub fn not_found() -> ApiFailure {
    ApiFailure::new(Some(404), "Not found")
}

#[async_trait]
impl LookerApi for FakeLooker {
    async fn lookml_model(&self, model_name: &str) -> ApiResponse<LookmlModel> {
        self.record(format!("lookml_model:{}", model_name));
        if let Some(delay) = self.model_delay {
            tokio::time::sleep(delay).await;
        }
        self.models
            .get(model_name)
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn lookml_model_explore(
        &self,
        model_name: &str,
        explore_name: &str,
        fields: &str,
    ) -> ApiResponse<LookmlModelExplore> {
        self.record(format!("lookml_model_explore:{}:{}:{}", model_name, explore_name, fields));
        self.explores
            .get(&(model_name.to_string(), explore_name.to_string()))
            .cloned()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn create_sql_query(
        &self,
        body: &SqlQueryCreate,
        settings: &TransportSettings,
    ) -> ApiResponse<SqlQuery> {
        self.record(format!("create_sql_query:{}", body.connection_name));
        self.record_timeout(settings);
        self.created_sql.lock().unwrap().push(body.clone());
        self.create_sql.clone()
    }

    async fn run_sql_query(
        &self,
        slug: &str,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<serde_json::Value> {
        self.record(format!("run_sql_query:{}:{}", slug, result_format));
        self.record_timeout(settings);
        self.run_sql.clone()
    }

    async fn run_query(
        &self,
        query_id: &str,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<serde_json::Value> {
        self.record(format!("run_query:{}:{}", query_id, result_format));
        self.record_timeout(settings);
        self.run_query.clone()
    }

    async fn create_query(
        &self,
        body: &WriteQuery,
        settings: &TransportSettings,
    ) -> ApiResponse<Query> {
        self.record(format!("create_query:{}:{}", body.model, body.view));
        self.record_timeout(settings);
        self.create_query.clone()
    }

    async fn run_inline_query(
        &self,
        body: &WriteQuery,
        result_format: &str,
        settings: &TransportSettings,
    ) -> ApiResponse<String> {
        self.record(format!("run_inline_query:{}", result_format));
        self.record_timeout(settings);
        self.inline_bodies
            .lock()
            .unwrap()
            .push((body.clone(), result_format.to_string()));
        self.inline.clone()
    }
}
