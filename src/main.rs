use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use voice_session::core::capture::list_input_devices;
use voice_session::core::realtime::{
    ErrorCallback, MessageCallback, RealtimeVoice, ServerEvent, SessionController,
};
use voice_session::VoiceConfig;

/// Realtime voice session client
#[derive(Parser, Debug)]
#[command(name = "voice-session")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `chat`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio input devices
    Devices,

    /// List available voices
    Voices,

    /// Start a voice session; typed lines are sent as text turns
    Chat {
        /// Voice for the assistant
        #[arg(long)]
        voice: Option<String>,

        /// Persona instructions
        #[arg(long)]
        instructions: Option<String>,
    },
}

fn print_event(event: &ServerEvent) {
    match event {
        ServerEvent::TranscriptionCompleted { transcript, .. } if !transcript.is_empty() => {
            println!("you> {}", transcript.trim());
        }
        ServerEvent::AudioTranscriptDone { transcript, .. } if !transcript.is_empty() => {
            println!("assistant> {}", transcript.trim());
        }
        ServerEvent::Error { error } => {
            eprintln!("error> {}", error.message);
        }
        _ => {}
    }
}

async fn run_chat(
    config: &VoiceConfig,
    voice: Option<String>,
    instructions: Option<String>,
) -> anyhow::Result<()> {
    let on_message: MessageCallback = Arc::new(|envelope| {
        Box::pin(async move {
            print_event(&envelope.event);
        })
    });
    let on_error: ErrorCallback = Arc::new(|error| {
        Box::pin(async move {
            eprintln!("session failed: {error}");
        })
    });

    let controller = SessionController::from_config(config, on_message, on_error);
    controller.init(instructions, voice).await?;
    info!(session_id = ?controller.session_id(), "Session started, type /quit to end");

    let mut state = controller.subscribe_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || state.borrow().is_terminal() {
                    info!(state = %*state.borrow(), "Session ended");
                    break;
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim() == "/quit" => break,
                    Some(line) if !line.trim().is_empty() => controller.send_text(line.trim()),
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    controller.disconnect().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let (voice, instructions) = match cli.command {
        Some(Commands::Devices) => {
            for name in list_input_devices()? {
                println!("{name}");
            }
            return Ok(());
        }
        Some(Commands::Voices) => {
            for voice in RealtimeVoice::all() {
                println!("{voice}");
            }
            return Ok(());
        }
        Some(Commands::Chat {
            voice,
            instructions,
        }) => (voice, instructions),
        None => (None, None),
    };

    let config = if let Some(config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        VoiceConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        VoiceConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    run_chat(&config, voice, instructions).await
}
