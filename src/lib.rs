pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod looker;
pub mod metadata;
pub mod orchestrator;
pub mod prompt;
pub mod query;
pub mod saved_prompts;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use orchestrator::Orchestrator;
