use anyhow::Result;
use clap::Parser;
use explore_genai::llm::build_generative_query;
use explore_genai::looker::LookerClient;
use explore_genai::metadata::MetadataFetcher;
use explore_genai::prompt::PromptBuilder;
use explore_genai::query::StructuredQuery;
use explore_genai::saved_prompts::load_saved_prompts;
use explore_genai::{Config, Orchestrator};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ask a question about a Looker model and print the query result
#[derive(Parser)]
#[command(name = "ask")]
#[command(about = "Translate a natural-language question into a Looker query and run it")]
struct Args {
    /// The question, in natural language
    question: Option<String>,

    /// LookML model to query
    #[arg(short, long, default_value = "poc-results")]
    model: String,

    /// Result format for the final query (csv, json, txt, ...)
    #[arg(short, long, default_value = "csv")]
    format: String,

    /// Print the generative SQL and exit without calling the LLM
    #[arg(long)]
    show_sql: bool,

    /// List prompts stored behind this saved query id and exit
    #[arg(long)]
    saved_prompts: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let client = Arc::new(LookerClient::from_config(&config)?);
    let orchestrator = Orchestrator::new(client, &config);

    if let Some(query_id) = args.saved_prompts {
        for saved in load_saved_prompts(orchestrator.executor(), &query_id).await? {
            println!("[{}] {}\n    {}", saved.model_explore, saved.description, saved.prompt);
        }
        return Ok(());
    }

    let question = args
        .question
        .ok_or_else(|| anyhow::anyhow!("a question is required"))?;

    info!("Model: {}", args.model);
    info!("Question: {}", question);

    if args.show_sql {
        let explores = MetadataFetcher::new(orchestrator.executor().api())
            .fetch_all_explores_metadata(&args.model)
            .await?;
        let prompt =
            PromptBuilder::new(config.prompt_budget).build(&args.model, &explores, &question)?;
        println!("{}", build_generative_query(prompt.literal(), &config.bqml_model));
        return Ok(());
    }

    let payload = orchestrator.run(&args.model, &question).await?;
    let query = StructuredQuery::parse(&payload)
        .map_err(|e| anyhow::anyhow!("LLM output is not a structured query ({}): {}", e, payload))?;

    println!("\n=== Generated Query ===");
    println!("{}", serde_json::to_string_pretty(&query)?);

    let result = orchestrator
        .executor()
        .run_inline_query(&query.to_write_query(), &args.format)
        .await?;

    println!("\n=== Result ===");
    println!("{}", result);

    Ok(())
}
