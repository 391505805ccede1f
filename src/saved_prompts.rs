//! Read path for curated prompts stored behind a saved Looker query

use crate::error::Result;
use crate::executor::{QueryExecutor, Row};
use crate::looker::LookerApi;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPrompt {
    pub description: String,
    pub prompt: String,
    /// `model.explore`
    pub model_explore: String,
}

impl SavedPrompt {
    /// Splits `model_explore` at the first `.`
    pub fn model_and_explore(&self) -> Option<(&str, &str)> {
        self.model_explore
            .split_once('.')
            .filter(|(model, explore)| !model.is_empty() && !explore.is_empty())
    }

    /// Reads a row whose keys may be view-qualified, e.g. `explore_prompts.prompt`.
    /// Rows without a prompt are skipped.
    pub fn from_row(row: &Row) -> Option<Self> {
        let column = |name: &str| -> Option<String> {
            row.iter()
                .find(|(key, _)| key.rsplit('.').next() == Some(name))
                .and_then(|(_, value)| value.as_str())
                .map(str::to_string)
        };

        let prompt = column("prompt").filter(|p| !p.trim().is_empty())?;
        Some(Self {
            description: column("description").unwrap_or_else(|| prompt.clone()),
            model_explore: column("model_explore").unwrap_or_default(),
            prompt,
        })
    }
}

pub async fn load_saved_prompts<A: LookerApi + ?Sized>(
    executor: &QueryExecutor<A>,
    query_id: &str,
) -> Result<Vec<SavedPrompt>> {
    let rows = executor.execute_by_query_id(query_id).await?;
    Ok(rows.iter().filter_map(SavedPrompt::from_row).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_row_with_qualified_keys() {
        let row = json!({
            "explore_prompts.description": "Alunos por região",
            "explore_prompts.prompt": "Total de alunos por região",
            "explore_prompts.model_explore": "poc-results.results_prediction_evasao_v4"
        });
        let prompt = SavedPrompt::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(prompt.prompt, "Total de alunos por região");
        assert_eq!(
            prompt.model_and_explore(),
            Some(("poc-results", "results_prediction_evasao_v4"))
        );
    }

    #[test]
    fn test_from_row_skips_empty_prompt() {
        let row = json!({"prompt": "  ", "description": "x"});
        assert!(SavedPrompt::from_row(row.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_description_defaults_to_prompt() {
        let row = json!({"prompt": "q"});
        let prompt = SavedPrompt::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(prompt.description, "q");
        assert_eq!(prompt.model_and_explore(), None);
    }
}
