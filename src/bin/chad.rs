//! Terminal chat with Chad.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chadgpt::chat::{ChatSession, Reply};
use chadgpt::companion::{Companion, Presenter, Turn};
use chadgpt::completion::OllamaCompletion;
use chadgpt::constrain::ResponseConstrainer;
use chadgpt::mood::{Mood, derive_mood};
use chadgpt::voice::playback::CommandPlayer;
use chadgpt::voice::{RenderOutcome, SynthesisOrchestrator};
use chadgpt::{ChadConfig, Response};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// ChadGPT: he says "Okay".
#[derive(Parser)]
#[command(name = "chadgpt", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not speak replies.
    #[arg(long)]
    mute: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Chat on stdin. `/stop` silences Chad, `/quit` exits.
    Chat,

    /// Speak one response through the voice chain.
    Say {
        /// One of: Okay, All good, Sure, Word, Haha, Nah.
        response: Response,
    },

    /// Write the default configuration file.
    InitConfig,
}

struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn show_reply(&self, reply: &Reply) {
        println!("Chad: {} [{}]", reply.response, reply.mood);
    }

    fn set_mood(&self, mood: Mood) {
        tracing::debug!(mood = %mood, "mood");
    }

    fn audio_finished(&self, outcome: &RenderOutcome) {
        if let RenderOutcome::NoAudio { failures, .. } = outcome {
            for failure in failures {
                tracing::debug!(failure = %failure, "voice provider skipped");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chadgpt=info")),
        )
        .init();

    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(ChadConfig::default_config_path);
    let mut config = ChadConfig::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.apply_env_overrides();
    if cli.mute {
        config.voice.enabled = false;
    }

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config).await,
        Command::Say { response } => run_say(config, response).await,
        Command::InitConfig => {
            config.save_to_file(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

fn build_voice(config: &ChadConfig) -> Option<Arc<SynthesisOrchestrator>> {
    if !config.voice.enabled {
        return None;
    }
    let Some(player) = CommandPlayer::detect(&config.voice.player) else {
        warn!("no audio player found (ffplay, afplay, paplay, aplay); replies will be silent");
        return None;
    };
    info!(player = ?player.kind(), chain = ?config.voice.chain, "voice ready");
    Some(Arc::new(SynthesisOrchestrator::from_config(
        &config.voice,
        Arc::new(player),
    )))
}

async fn run_say(config: ChadConfig, response: Response) -> anyhow::Result<()> {
    let voice = build_voice(&config).context("voice is disabled or no audio player is available")?;
    let outcome = voice
        .speak(response, derive_mood(response.text()))
        .await
        .require_audio()?;
    match outcome.played_by() {
        Some(provider) => println!("spoken by {provider}"),
        None => println!("cancelled"),
    }
    Ok(())
}

async fn run_chat(config: ChadConfig) -> anyhow::Result<()> {
    println!("ChadGPT v{}", env!("CARGO_PKG_VERSION"));

    let completion = OllamaCompletion::new(config.completion.clone())?;
    info!(model = completion.model(), url = %config.completion.api_url, "completion service");
    let chat = ChatSession::new(
        Arc::new(completion),
        ResponseConstrainer::new(&config.constraint),
    );
    let companion = Arc::new(Companion::new(
        chat,
        build_voice(&config),
        Arc::new(ConsolePresenter),
    ));

    println!("\nSay something. /stop silences Chad, /quit exits.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/stop" => companion.stop(),
            message => {
                let companion = Arc::clone(&companion);
                let message = message.to_owned();
                tokio::spawn(async move {
                    match companion.turn(&message).await {
                        Ok(Turn::Failed { error, mood }) => {
                            println!("Chad: ... [{mood}]");
                            warn!(error = %error, "no reply");
                        }
                        Ok(Turn::Replied { .. }) => {}
                        Err(e) => warn!(error = %e, "turn rejected"),
                    }
                });
            }
        }
    }

    companion.stop();
    Ok(())
}
