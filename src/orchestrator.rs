//! End-to-end question → structured query pipeline
//!
//! Explore metadata → prompt → `ML.GENERATE_TEXT` SQL → SQL runner → generated
//! text. Any failure is logged and wrapped in `PocExecutionFailed`; nothing
//! is retried.

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::executor::QueryExecutor;
use crate::llm::{build_generative_query, extract_generated_text};
use crate::looker::LookerApi;
use crate::metadata::{ExploreMetadata, MetadataFetcher};
use crate::prompt::PromptBuilder;
use crate::query::StructuredQuery;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Result format the host renders
pub const CSV_FORMAT: &str = "csv";

/// Outcome of [`Orchestrator::ask`]
#[derive(Debug, Clone)]
pub struct Answer {
    pub query: StructuredQuery,
    pub payload: String,
    pub result: String,
}

pub struct Orchestrator<A: LookerApi + ?Sized> {
    api: Arc<A>,
    executor: QueryExecutor<A>,
    prompt_builder: PromptBuilder,
    bqml_model: String,
}

impl<A: LookerApi + ?Sized> Orchestrator<A> {
    pub fn new(api: Arc<A>, config: &Config) -> Self {
        Self {
            executor: QueryExecutor::from_config(api.clone(), config),
            api,
            prompt_builder: PromptBuilder::new(config.prompt_budget),
            bqml_model: config.bqml_model.clone(),
        }
    }

    pub fn executor(&self) -> &QueryExecutor<A> {
        &self.executor
    }

    /// Returns the generated structured query text, unparsed
    pub async fn run(&self, model_name: &str, question: &str) -> Result<String> {
        info!("Generating structured query for model {}: {}", model_name, question);

        let explores = MetadataFetcher::new(self.api.as_ref())
            .fetch_all_explores_metadata(model_name)
            .await
            .map_err(|e| wrap(e, None))?;

        self.generate(model_name, &explores, question).await
    }

    /// Same as [`run`](Self::run) with metadata the caller already holds
    pub async fn generate(
        &self,
        model_name: &str,
        explores: &[ExploreMetadata],
        question: &str,
    ) -> Result<String> {
        let prompt = self
            .prompt_builder
            .build(model_name, explores, question)
            .map_err(|e| wrap(e, None))?;

        debug!("1. Sending Prompt to BigQuery LLM");
        let sql = build_generative_query(prompt.literal(), &self.bqml_model);
        debug!("Executing generative query {}", sql);

        let generated = match self.executor.execute(&sql).await {
            Ok(rows) => extract_generated_text(&rows),
            Err(e) => Err(e),
        };

        generated.map_err(|e| wrap(e, Some(sql)))
    }

    /// Generates the structured query, then runs it inline and returns the
    /// rendered result alongside it. Parse and inline-run failures are wrapped
    /// the same way as [`run`](Self::run) failures.
    pub async fn ask(&self, model_name: &str, question: &str) -> Result<Answer> {
        let payload = self.run(model_name, question).await?;
        let query = StructuredQuery::parse(&payload).map_err(|e| {
            error!("LLM returned a payload that is not a structured query: {}", payload);
            wrap(e, None)
        })?;

        let result = self
            .executor
            .run_inline_query(&query.to_write_query(), CSV_FORMAT)
            .await
            .map_err(|e| wrap(e, None))?;

        Ok(Answer {
            query,
            payload,
            result,
        })
    }
}

fn wrap(source: PipelineError, sql: Option<String>) -> PipelineError {
    match &sql {
        Some(sql) => error!("Error executing generative query {}: {}", sql, source),
        None => error!("Error preparing generative query: {}", source),
    }
    PipelineError::PocExecutionFailed {
        sql,
        source: Box::new(source),
    }
}
