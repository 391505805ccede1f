//! The structured query payload produced by the LLM

use crate::error::Result;
use crate::looker::WriteQuery;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `{model, view, fields, filters, sorts, pivots, limit}` as emitted by the
/// LLM. Filter values and the limit are kept loose since the model sometimes
/// emits numbers where Looker expects strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub model: String,
    pub view: String,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub sorts: Option<Vec<String>>,
    #[serde(default)]
    pub pivots: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<serde_json::Value>,
}

impl StructuredQuery {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text.trim())?)
    }

    pub fn to_write_query(&self) -> WriteQuery {
        WriteQuery {
            model: self.model.clone(),
            view: self.view.clone(),
            fields: self.fields.clone(),
            filters: self.filters.as_ref().map(|filters| {
                filters
                    .iter()
                    .map(|(field, value)| (field.clone(), value_to_looker_string(value)))
                    .collect()
            }),
            sorts: self.sorts.clone(),
            pivots: self.pivots.clone(),
            limit: self.limit.as_ref().and_then(|limit| match limit {
                serde_json::Value::Null => None,
                other => Some(value_to_looker_string(other)),
            }),
        }
    }
}

fn value_to_looker_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<&StructuredQuery> for WriteQuery {
    fn from(query: &StructuredQuery) -> Self {
        query.to_write_query()
    }
}
