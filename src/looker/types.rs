//! Looker API 4.0 payloads, restricted to the fields the pipeline reads

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookmlModel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub explores: Option<Vec<LookmlModelNavExplore>>,
    #[serde(default)]
    pub allowed_db_connection_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookmlModelNavExplore {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookmlModelExplore {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub fields: Option<ExploreFieldset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExploreFieldset {
    #[serde(default)]
    pub dimensions: Option<Vec<ExploreField>>,
    #[serde(default)]
    pub measures: Option<Vec<ExploreField>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExploreField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `POST /sql_queries`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQueryCreate {
    pub connection_name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlQuery {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
}

/// Body of `POST /queries` and `POST /queries/run/{format}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteQuery {
    pub model: String,
    pub view: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivots: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
}
