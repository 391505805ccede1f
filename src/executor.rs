//! Query execution through the Looker SQL runner
//!
//! `execute` walks `Idle -> ConnectionResolved -> QueryCreated ->
//! SlugObtained -> ResultsFetched`, failing at the first transition that
//! does not succeed. Every call uses the long executor timeout.

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::looker::{LookerApi, LookmlModel, Query, SqlQueryCreate, TransportSettings, WriteQuery};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// One result row: column name to value
pub type Row = serde_json::Map<String, serde_json::Value>;

pub const JSON_FORMAT: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Idle,
    ConnectionResolved,
    QueryCreated,
    SlugObtained,
    ResultsFetched,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStage::Idle => write!(f, "Idle"),
            ExecutionStage::ConnectionResolved => write!(f, "ConnectionResolved"),
            ExecutionStage::QueryCreated => write!(f, "QueryCreated"),
            ExecutionStage::SlugObtained => write!(f, "SlugObtained"),
            ExecutionStage::ResultsFetched => write!(f, "ResultsFetched"),
        }
    }
}

/// First allowed connection of `model`
pub fn resolve_connection(model: &LookmlModel, model_name: &str) -> Result<String> {
    model
        .allowed_db_connection_names
        .iter()
        .flatten()
        .find(|name| !name.is_empty())
        .cloned()
        .ok_or_else(|| PipelineError::NoConnectionAvailable {
            model: model_name.to_string(),
        })
}

/// Checks that a run payload is an array of objects sharing one column set
pub fn rows_from_value(value: serde_json::Value) -> Result<Vec<Row>> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(PipelineError::InvalidResultShape {
                found: json_kind(&other).to_string(),
            })
        }
    };

    let rows = items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::Object(row) => Ok(row),
            other => Err(PipelineError::InvalidResultShape {
                found: format!("array of {}", json_kind(&other)),
            }),
        })
        .collect::<Result<Vec<Row>>>()?;

    if let Some((first, rest)) = rows.split_first() {
        let same_columns =
            |row: &Row| row.len() == first.len() && row.keys().all(|k| first.contains_key(k));
        if !rest.iter().all(same_columns) {
            return Err(PipelineError::InvalidResultShape {
                found: "rows with differing columns".to_string(),
            });
        }
    }

    Ok(rows)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub struct QueryExecutor<A: LookerApi + ?Sized> {
    api: Arc<A>,
    /// Resolved once per executor; concurrent first calls share one lookup
    connection: OnceCell<String>,
    connection_model: String,
    settings: TransportSettings,
}

impl<A: LookerApi + ?Sized> QueryExecutor<A> {
    pub fn new(
        api: Arc<A>,
        connection_name: Option<String>,
        connection_model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            api,
            connection: OnceCell::new_with(connection_name),
            connection_model,
            settings: TransportSettings::with_timeout(timeout),
        }
    }

    pub fn from_config(api: Arc<A>, config: &Config) -> Self {
        Self::new(
            api,
            config.connection_name.clone(),
            config.connection_model.clone(),
            config.timeout(),
        )
    }

    pub fn api(&self) -> &A {
        self.api.as_ref()
    }

    /// Configured connection, or the first allowed connection of the lookup model
    pub async fn connection_name(&self) -> Result<&str> {
        let name = self
            .connection
            .get_or_try_init(|| async {
                info!("Resolving DB connection from model {}", self.connection_model);
                let model = self
                    .api
                    .lookml_model(&self.connection_model)
                    .await
                    .map_err(|failure| {
                        warn!("Unable to read model {}: {}", self.connection_model, failure);
                        PipelineError::NoConnectionAvailable {
                            model: self.connection_model.clone(),
                        }
                    })?;
                resolve_connection(&model, &self.connection_model)
            })
            .await?;
        Ok(name.as_str())
    }

    /// Runs raw SQL and returns its rows
    pub async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let mut stage = ExecutionStage::Idle;
        debug!("SQL runner stage {}", stage);

        let connection_name = self.connection_name().await?.to_string();
        stage = ExecutionStage::ConnectionResolved;
        debug!("SQL runner stage {} ({})", stage, connection_name);

        let body = SqlQueryCreate {
            connection_name,
            sql: sql.to_string(),
        };
        let created = self
            .api
            .create_sql_query(&body, &self.settings)
            .await
            .map_err(|failure| PipelineError::QueryCreationFailed {
                sql: sql.to_string(),
                reason: failure.to_string(),
            })?;
        stage = ExecutionStage::QueryCreated;
        debug!("SQL runner stage {}", stage);

        let slug = created
            .slug
            .filter(|slug| !slug.is_empty())
            .ok_or_else(|| PipelineError::QueryCreationFailed {
                sql: sql.to_string(),
                reason: "invalid SQL query results, missing slug".to_string(),
            })?;
        stage = ExecutionStage::SlugObtained;
        debug!("SQL runner stage {} ({})", stage, slug);

        let rows = self.run_query_slug(&slug).await?;
        stage = ExecutionStage::ResultsFetched;
        debug!("SQL runner stage {}, {} rows", stage, rows.len());

        Ok(rows)
    }

    async fn run_query_slug(&self, slug: &str) -> Result<Vec<Row>> {
        let value = self
            .api
            .run_sql_query(slug, JSON_FORMAT, &self.settings)
            .await
            .map_err(|failure| PipelineError::QueryExecutionFailed {
                status: failure.status,
                reason: format!("unable to run SQL query {}: {}", slug, failure.message),
            })?;
        rows_from_value(value)
    }

    /// Runs a saved query by id
    pub async fn execute_by_query_id(&self, query_id: &str) -> Result<Vec<Row>> {
        let value = self
            .api
            .run_query(query_id, JSON_FORMAT, &self.settings)
            .await
            .map_err(|failure| PipelineError::QueryExecutionFailed {
                status: failure.status,
                reason: format!("unable to execute query by id {}: {}", query_id, failure.message),
            })?;
        rows_from_value(value)
    }

    pub async fn create_query(&self, query: &WriteQuery) -> Result<Query> {
        self.api
            .create_query(query, &self.settings)
            .await
            .map_err(|failure| PipelineError::QueryCreationFailed {
                sql: serde_json::to_string(query).unwrap_or_default(),
                reason: format!("invalid create query result: {}", failure),
            })
    }

    /// Runs a structured query without saving it, returning the rendered body
    pub async fn run_inline_query(&self, query: &WriteQuery, result_format: &str) -> Result<String> {
        self.api
            .run_inline_query(query, result_format, &self.settings)
            .await
            .map_err(|failure| PipelineError::QueryExecutionFailed {
                status: failure.status,
                reason: format!("unable to run inline query: {}", failure.message),
            })
    }
}
