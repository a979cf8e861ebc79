use anyhow::Result;
use clap::Parser;
use holdings_qa::{build_pipeline, Config, Vocabulary, INVALID_QUESTION};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "holdings-qa")]
#[command(about = "Answer questions about holdings and trades with SQL")]
struct Args {
    /// The question in natural language
    question: Option<String>,

    /// Directory containing holdings.csv and trades.csv
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// LLM backend: ollama or openai (or set LLM_PROVIDER)
    #[arg(long)]
    provider: Option<String>,

    /// Model name for the selected backend
    #[arg(short, long)]
    model: Option<String>,

    /// Print the SQL-generation system prompt and exit
    #[arg(long)]
    print_prompt: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    holdings_qa::init_tracing();

    let args = Args::parse();

    if args.print_prompt {
        println!("{}", Vocabulary::standard().system_prompt());
        return Ok(());
    }

    let mut config = Config::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(provider) = args.provider {
        config.llm.provider = provider.parse()?;
    }
    if let Some(model) = args.model {
        config.llm.ollama_model = model.clone();
        config.llm.openai_model = model;
    }
    config.validate()?;

    let question = args.question.unwrap_or_default();
    let question = question.trim();
    if question.is_empty() {
        println!("{}", INVALID_QUESTION);
        return Ok(());
    }

    let pipeline = build_pipeline(&config)?;
    info!("Question: {}", question);

    println!("{}", pipeline.answer(question).await);
    Ok(())
}
