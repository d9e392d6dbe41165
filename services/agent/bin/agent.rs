//! Main entrypoint for the console agent.
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and applying CLI overrides.
//! 2. Initializing logging.
//! 3. Starting a conversation with the configured agent.
//! 4. Forwarding typed commands until the user quits, the agent ends the
//!    call, stdin closes or Ctrl+C is pressed.

use anyhow::Context;
use clap::Parser;
use convai_agent::{
    audio::AudioRecorder,
    config::Config,
    console::{Command, ConsoleCallbacks},
    tools::default_registry,
};
use convai_realtime::Conversation;
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Talk to a conversational agent from the terminal")]
struct Cli {
    /// Agent to talk to. Overrides ELEVENLABS_AGENT_ID.
    #[arg(long)]
    agent_id: Option<String>,
    /// Pre-signed conversation URL. Overrides ELEVENLABS_SIGNED_URL.
    #[arg(long)]
    signed_url: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    first_message: Option<String>,
    /// File to append the agent's raw PCM16 audio to.
    #[arg(long)]
    audio_out: Option<PathBuf>,
}

/// Resolves once `Ctrl+C` is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Ending the conversation...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if cli.agent_id.is_some() {
        config.agent_id = cli.agent_id;
    }
    if cli.signed_url.is_some() {
        config.signed_url = cli.signed_url;
    }
    if cli.language.is_some() {
        config.language = cli.language;
    }
    if cli.first_message.is_some() {
        config.first_message = cli.first_message;
    }
    if cli.audio_out.is_some() {
        config.audio_out_path = cli.audio_out;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded.");

    // --- 3. Start the Conversation ---
    let end_call = Arc::new(Notify::new());
    let mut callbacks = ConsoleCallbacks::new(end_call.clone());
    if let Some(path) = &config.audio_out_path {
        let recorder = AudioRecorder::create(path)?;
        info!(path = %recorder.path().display(), "Recording agent audio.");
        callbacks = callbacks.with_recorder(recorder);
    }
    let callbacks = Arc::new(callbacks);

    let connection = config
        .into_connection_config()
        .context("No agent to talk to")?;
    let conversation = Conversation::start(
        connection,
        Arc::new(default_registry()),
        callbacks.clone(),
    )
    .await?;
    println!("Connected. Type to talk; /context, /like, /dislike, /active, /quit.");

    // --- 4. Forward Commands ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = end_call.notified() => {
                info!("Agent ended the call.");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("Stdin closed.");
                    break;
                };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                let sent = match command {
                    Command::Quit => break,
                    Command::Say(text) => conversation.send_user_message(text).await,
                    Command::Context(text) => conversation.send_contextual_update(text).await,
                    Command::Feedback(score) => conversation.send_feedback(score).await,
                    Command::Active => conversation.send_user_activity().await,
                };
                if let Err(e) = sent {
                    warn!(error = %format!("{e:#}"), "Command was not delivered.");
                }
                if !conversation.is_listening() {
                    warn!("Agent connection closed.");
                    break;
                }
            }
        }
    }

    if let Err(e) = conversation.end().await {
        warn!(error = %format!("{e:#}"), "Websocket did not close cleanly.");
    }
    if let Some(secs) = callbacks.recorded_secs() {
        info!(seconds = secs, "Recorded agent audio.");
    }
    info!("Conversation has ended.");
    Ok(())
}
