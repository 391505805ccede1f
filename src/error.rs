use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("model '{model}' does not contain any explores")]
    NoExplores { model: String },

    #[error("unable to fetch explore metadata for {model}::{explore}: {reason}")]
    ExploreFetchFailed {
        model: String,
        explore: String,
        reason: String,
    },

    #[error("no database connection available on model '{model}' to run queries")]
    NoConnectionAvailable { model: String },

    #[error("unable to create SQL query: {reason}")]
    QueryCreationFailed { sql: String, reason: String },

    #[error("unable to run query: {reason}")]
    QueryExecutionFailed {
        status: Option<u16>,
        reason: String,
    },

    #[error("invalid query result shape: expected an array of rows, got {found}")]
    InvalidResultShape { found: String },

    #[error("generated llm result contains errors: {0}")]
    GenerationFailed(String),

    #[error("generated llm result does not contain expected columns")]
    MalformedLlmResult,

    #[error("prompt too large: {subject} has {actual} characters, budget is {budget}")]
    PromptTooLarge {
        subject: String,
        actual: usize,
        budget: usize,
    },

    #[error("error executing generative query: {source}")]
    PocExecutionFailed {
        sql: Option<String>,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Innermost error, looking through `PocExecutionFailed` wrappers.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::PocExecutionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// SQL text that triggered the failure, when one was attached.
    pub fn sql(&self) -> Option<&str> {
        match self {
            PipelineError::PocExecutionFailed { sql, .. } => sql.as_deref(),
            PipelineError::QueryCreationFailed { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
