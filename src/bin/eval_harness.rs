//! Offline evaluation of Chad's replies against a live completion service.
//!
//! Runs the built-in message set through the same prompt and constrainer the
//! chat uses, then prints compliance, distributions and a grade.

use std::path::PathBuf;
use std::sync::Arc;

use chadgpt::ChadConfig;
use chadgpt::chat::ChatSession;
use chadgpt::completion::OllamaCompletion;
use chadgpt::constrain::ResponseConstrainer;
use chadgpt::eval::{self, DEFAULT_CASES};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Score how well the model stays in character.
#[derive(Parser)]
#[command(name = "chadgpt-eval", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Passes over the message set.
    #[arg(short, long, default_value_t = 3)]
    rounds: usize,

    /// Override the completion model.
    #[arg(long)]
    model: Option<String>,

    /// Exit non-zero when the score is below this.
    #[arg(long)]
    min_score: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let path = cli
        .config
        .unwrap_or_else(ChadConfig::default_config_path);
    let mut config = ChadConfig::load_or_default(&path)?;
    config.apply_env_overrides();
    if let Some(model) = cli.model {
        config.completion.model = model;
    }

    println!(
        "Evaluating {} against {} ({} cases x {} rounds)",
        config.completion.model,
        config.completion.api_url,
        DEFAULT_CASES.len(),
        cli.rounds
    );

    let completion = OllamaCompletion::new(config.completion.clone())?;
    let chat = ChatSession::new(
        Arc::new(completion),
        ResponseConstrainer::new(&config.constraint),
    );
    let report = eval::run(&chat, DEFAULT_CASES, cli.rounds.max(1)).await;

    println!("\n{report}");

    if report.answered() == 0 {
        anyhow::bail!("completion service answered no cases");
    }
    if let Some(min) = cli.min_score {
        if report.score() < min {
            anyhow::bail!("score {} is below the minimum {min}", report.score());
        }
    }
    Ok(())
}
