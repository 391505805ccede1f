//! Runtime configuration for the Looker client and the prompt pipeline
//!
//! Values come from the environment (optionally a `.env` file). Only the
//! Looker base URL and access token are required; everything else has a default.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Version tag written into every generative query as a SQL comment
pub const CURRENT_VERSION: &str = "0.1.0";

/// Model whose allowed connections are used when no connection is configured
pub const DEFAULT_CONNECTION_MODEL: &str = "looker-genai";

pub const DEFAULT_BQML_MODEL: &str = "llm.llm_model";

/// LLM-backed SQL is slow, so remote calls wait up to ten minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub const MAX_CHAR_PER_PROMPT: usize = 8000 * 3;
pub const MAX_CHAR_PER_TILE: usize = 15000 * 3;
pub const MIN_SUMMARIZE_CHAR_PER_TILE: usize = 2000 * 3;

/// What to do when explore metadata does not fit the prompt budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPolicy {
    /// Fail with `PromptTooLarge`
    #[default]
    Reject,
    /// Drop trailing fields per explore until each fits its share
    Truncate,
}

impl std::str::FromStr for BudgetPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(BudgetPolicy::Reject),
            "truncate" => Ok(BudgetPolicy::Truncate),
            other => Err(PipelineError::Config(format!(
                "unknown prompt budget policy '{}', expected 'reject' or 'truncate'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudget {
    pub max_prompt_chars: usize,
    pub max_tile_chars: usize,
    pub min_tile_chars: usize,
    #[serde(default)]
    pub policy: BudgetPolicy,
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            max_prompt_chars: MAX_CHAR_PER_PROMPT,
            max_tile_chars: MAX_CHAR_PER_TILE,
            min_tile_chars: MIN_SUMMARIZE_CHAR_PER_TILE,
            policy: BudgetPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// e.g. `https://company.looker.com`; `/api/4.0` is appended by the client
    pub looker_base_url: String,
    pub access_token: String,
    /// Fixed connection for SQL runner queries; resolved lazily when absent
    #[serde(default)]
    pub connection_name: Option<String>,
    #[serde(default = "default_connection_model")]
    pub connection_model: String,
    #[serde(default = "default_bqml_model")]
    pub bqml_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub prompt_budget: PromptBudget,
}

fn default_connection_model() -> String {
    DEFAULT_CONNECTION_MODEL.to_string()
}

fn default_bqml_model() -> String {
    DEFAULT_BQML_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Config {
    pub fn new(looker_base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            looker_base_url: looker_base_url.into(),
            access_token: access_token.into(),
            connection_name: None,
            connection_model: default_connection_model(),
            bqml_model: default_bqml_model(),
            timeout_secs: default_timeout_secs(),
            prompt_budget: PromptBudget::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, which maps variable names to values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("LOOKER_BASE_URL")
            .ok_or_else(|| PipelineError::Config("LOOKER_BASE_URL is not set".to_string()))?;
        let token = lookup("LOOKER_ACCESS_TOKEN")
            .ok_or_else(|| PipelineError::Config("LOOKER_ACCESS_TOKEN is not set".to_string()))?;

        let mut config = Config::new(base_url, token);

        config.connection_name =
            lookup("LOOKER_CONNECTION_NAME").filter(|name| !name.trim().is_empty());

        if let Some(model) = lookup("LOOKER_CONNECTION_MODEL") {
            config.connection_model = model;
        }
        if let Some(model) = lookup("BQML_MODEL") {
            config.bqml_model = model;
        }
        if let Some(secs) = lookup("LOOKER_TIMEOUT_SECS") {
            config.timeout_secs = secs.trim().parse().map_err(|e| {
                PipelineError::Config(format!("invalid LOOKER_TIMEOUT_SECS '{}': {}", secs, e))
            })?;
        }
        if let Some(policy) = lookup("PROMPT_BUDGET_POLICY") {
            config.prompt_budget.policy = policy.parse()?;
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
