//! BigQuery ML text generation, expressed as SQL
//!
//! The LLM is never called directly: the prompt is embedded in an
//! `ML.GENERATE_TEXT` statement and run through the Looker SQL runner.

use crate::config::CURRENT_VERSION;
use crate::error::{PipelineError, Result};
use crate::executor::Row;
use serde::{Deserialize, Serialize};

/// Column carrying the generated text
pub const RESULT_COLUMN: &str = "r";

/// Column carrying the generation status when the text is empty
pub const STATUS_COLUMN: &str = "ml_generate_text_status";

/// Decoding parameters. Fixed because response parsing relies on stable output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub flatten_json_output: bool,
    pub top_k: u32,
}

pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.05,
    max_output_tokens: 1024,
    top_p: 0.98,
    flatten_json_output: true,
    top_k: 40,
};

impl GenerationConfig {
    fn to_struct_sql(&self) -> String {
        format!(
            "STRUCT(\n    {} AS temperature,\n    {} AS max_output_tokens,\n    {} AS top_p,\n    {} AS flatten_json_output,\n    {} AS top_k)",
            self.temperature,
            self.max_output_tokens,
            self.top_p,
            if self.flatten_json_output { "TRUE" } else { "FALSE" },
            self.top_k
        )
    }
}

/// Wraps a prompt literal (see [`crate::prompt::to_sql_literal`]) in an
/// `ML.GENERATE_TEXT` call over `bqml_model`
pub fn build_generative_query(prompt_literal: &str, bqml_model: &str) -> String {
    format!(
        "#Looker GenAI Extension - version: {version}\n\
         SELECT ml_generate_text_llm_result AS {result}, {status}\n\
         FROM\n\
         ML.GENERATE_TEXT(\n\
         MODEL {model},\n\
         (\n\
         SELECT '{prompt}' AS prompt\n\
         ),\n\
         {config});\n",
        version = CURRENT_VERSION,
        result = RESULT_COLUMN,
        status = STATUS_COLUMN,
        model = bqml_model,
        prompt = prompt_literal,
        config = GENERATION_CONFIG.to_struct_sql(),
    )
}

/// Pulls the generated text out of the first result row
pub fn extract_generated_text(rows: &[Row]) -> Result<String> {
    let first = rows.first().ok_or(PipelineError::MalformedLlmResult)?;

    let text = first
        .get(RESULT_COLUMN)
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    if !text.is_empty() {
        return Ok(text.to_string());
    }

    match first.get(STATUS_COLUMN).and_then(|value| value.as_str()) {
        Some(status) if !status.is_empty() => {
            Err(PipelineError::GenerationFailed(status.to_string()))
        }
        _ => Err(PipelineError::MalformedLlmResult),
    }
}
