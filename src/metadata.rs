//! Explore metadata fetching
//!
//! Pulls every explore of a LookML model and flattens its dimensions and
//! measures into the compact form embedded in prompts.

use crate::error::{PipelineError, Result};
use crate::looker::{ExploreField, LookerApi};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Fields requested when reading an explore
pub const EXPLORE_FIELDS: &str = "id, name, description, fields, label";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub label: String,
    pub name: String,
    pub description: String,
}

impl From<&ExploreField> for FieldMetadata {
    fn from(field: &ExploreField) -> Self {
        Self {
            label: field.label.clone().unwrap_or_default(),
            name: field.name.clone().unwrap_or_default(),
            description: field.description.clone().unwrap_or_default(),
        }
    }
}

/// One explore with its field metadata serialized as a JSON array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreMetadata {
    pub name: String,
    pub field_metadata: String,
}

impl ExploreMetadata {
    pub fn new(name: impl Into<String>, fields: &[FieldMetadata]) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            field_metadata: serde_json::to_string(fields)?,
        })
    }

    /// Deserialize `field_metadata` back into its fields
    pub fn fields(&self) -> Result<Vec<FieldMetadata>> {
        Ok(serde_json::from_str(&self.field_metadata)?)
    }
}

pub struct MetadataFetcher<'a, A: LookerApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: LookerApi + ?Sized> MetadataFetcher<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Dimensions followed by measures, in the order Looker returns them
    pub async fn fetch_explore_metadata(
        &self,
        model_name: &str,
        explore_name: &str,
    ) -> Result<Vec<FieldMetadata>> {
        debug!("3. Get the Explore Data: {}::{}", model_name, explore_name);

        let explore = self
            .api
            .lookml_model_explore(model_name, explore_name, EXPLORE_FIELDS)
            .await
            .map_err(|failure| PipelineError::ExploreFetchFailed {
                model: model_name.to_string(),
                explore: explore_name.to_string(),
                reason: failure.to_string(),
            })?;

        // A missing fieldset counts as empty
        let fieldset = explore.fields.unwrap_or_default();
        let fields = fieldset
            .dimensions
            .iter()
            .flatten()
            .chain(fieldset.measures.iter().flatten())
            .map(FieldMetadata::from)
            .collect();

        Ok(fields)
    }

    pub async fn fetch_all_explores_metadata(
        &self,
        model_name: &str,
    ) -> Result<Vec<ExploreMetadata>> {
        debug!("2. Get all Explores Data From Model {}", model_name);

        let model = self.api.lookml_model(model_name).await.map_err(|failure| {
            warn!("Unable to read model {}: {}", model_name, failure);
            PipelineError::NoExplores {
                model: model_name.to_string(),
            }
        })?;

        let mut seen = HashSet::new();
        let mut explores = Vec::new();
        for explore in model.explores.unwrap_or_default() {
            let name = match explore.name {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            if !seen.insert(name.clone()) {
                warn!("Skipping duplicate explore {} in model {}", name, model_name);
                continue;
            }

            let fields = self.fetch_explore_metadata(model_name, &name).await?;
            explores.push(ExploreMetadata::new(name, &fields)?);
        }

        if explores.is_empty() {
            return Err(PipelineError::NoExplores {
                model: model_name.to_string(),
            });
        }

        Ok(explores)
    }
}
