//! CLI entrypoint for murmur
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use murmur_application::{
    AudioCaptureController, AudioOutputFactory, AudioPlaybackController, ConversationLogger,
    MediaDevices, MessageStore, NoConversationLogger, PlaybackContext, SessionController,
    StaticToken, StreamTransport, TokenProvider, TurnHandle, TurnOutcome,
};
use murmur_domain::{ChatMessage, ChatSession, ContentRenderer};
use murmur_infrastructure::{
    ConfigLoader, EnvTokenProvider, FileConfig, FileMediaDevices, HttpStreamTransport,
    JsonlConversationLogger, MarkdownRenderer, NullOutputFactory, WavOutputFactory,
};
use murmur_presentation::{
    ChatRepl, Cli, ConsoleFormatter, OutputFormat, StreamPrinter, follow_turn,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// File name prefix for received audio written to `audio.output_dir`.
const AUDIO_FILE_PREFIX: &str = "reply";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // === Configuration ===
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    apply_overrides(&cli, &mut config);

    if cli.show_config {
        print_config(&cli, &config)?;
        return Ok(());
    }

    let log_dir = config.logging.log_dir.as_ref().map(PathBuf::from);
    let _log_guard = init_logging(cli.verbose, log_dir.as_deref());

    info!("Starting murmur");

    let problems = config.validate();
    if !problems.is_empty() {
        let details = problems
            .iter()
            .map(|p| format!("  - {}", p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Invalid configuration:\n{}", details);
    }

    // === Dependency Injection ===
    let (controller, greeting) = build_controller(&cli, &config)?;
    let controller = Arc::new(controller);

    // Chat mode
    if cli.chat {
        let repl = ChatRepl::new(controller.clone())
            .with_devices(Box::new(|path: &Path| {
                Arc::new(FileMediaDevices::new(path)) as Arc<dyn MediaDevices>
            }))
            .with_quiet(cli.quiet);

        repl.run().await?;
        save_session(&cli, &controller)?;
        return Ok(());
    }

    // Single turn mode - a message or a recording is required
    let handle = if let Some(path) = &cli.audio {
        let capture = AudioCaptureController::new(Arc::new(FileMediaDevices::new(path)));
        let recording = capture
            .start()
            .await
            .with_context(|| format!("Failed to open recording {}", path.display()))?;
        info!("Sending recording {} ({})", path.display(), recording.mime_type);
        controller.send_recording(&capture).await?
    } else {
        match &cli.message {
            Some(message) => controller.send_text(message)?,
            None => bail!("Message is required. Use --chat for interactive mode."),
        }
    };

    let outcome = run_turn(&cli, &controller, greeting.as_deref(), handle).await?;
    save_session(&cli, &controller)?;

    match outcome {
        TurnOutcome::Failed { error, .. } => bail!("Turn failed: {}", error),
        TurnOutcome::Completed { .. } | TurnOutcome::Cancelled { .. } => Ok(()),
    }
}

/// Command-line flags take precedence over every configuration source.
fn apply_overrides(cli: &Cli, config: &mut FileConfig) {
    if let Some(url) = &cli.url {
        config.endpoint.base_url = url.clone();
    }
    if let Some(transport) = cli.transport {
        config.session.transport = murmur_application::TransportKind::from(transport).to_string();
    }
    if let Some(system) = &cli.system {
        config.session.system_instruction = Some(system.clone());
    }
    if let Some(voice) = &cli.voice {
        config.session.voice_name = Some(voice.clone());
    }
    if let Some(dir) = &cli.audio_out {
        config.audio.output_dir = Some(dir.display().to_string());
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.log_dir = Some(dir.display().to_string());
    }
}

fn print_config(cli: &Cli, config: &FileConfig) -> Result<()> {
    println!("Configuration sources (lowest to highest priority):");
    if cli.no_config {
        println!("  (config files disabled by --no-config)");
    } else {
        for source in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("  {}", source);
        }
    }
    println!();
    println!("Effective configuration:");
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Initialize logging based on verbosity level.
///
/// Diagnostics go to stderr so streamed replies on stdout stay clean. With
/// a log directory, a daily-rolling file receives the same events.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "murmur.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

/// Wire the controller. Also returns the greeting shown on a fresh session.
fn build_controller(
    cli: &Cli,
    config: &FileConfig,
) -> Result<(SessionController, Option<Arc<ChatMessage>>)> {
    let token: Arc<dyn TokenProvider> = match &cli.token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(EnvTokenProvider::default()),
    };
    let transport: Arc<dyn StreamTransport> =
        Arc::new(HttpStreamTransport::new(&config.endpoint, token)?);

    let sample_rate = config.audio.sample_rate;
    let factory: Arc<dyn AudioOutputFactory> = match &config.audio.output_dir {
        Some(dir) => Arc::new(WavOutputFactory::new(dir, AUDIO_FILE_PREFIX, sample_rate)),
        None => Arc::new(NullOutputFactory::new(sample_rate)),
    };

    let logger: Arc<dyn ConversationLogger> = match &config.logging.conversation_log {
        Some(path) => match JsonlConversationLogger::new(path) {
            Some(logger) => {
                info!("Conversation log: {}", logger.path().display());
                Arc::new(logger)
            }
            None => Arc::new(NoConversationLogger),
        },
        None => Arc::new(NoConversationLogger),
    };

    let playback = Arc::new(
        AudioPlaybackController::new(
            Arc::new(PlaybackContext::new(factory)),
            config.audio.parse_playback_policy(),
        )
        .with_conversation_logger(logger.clone()),
    );

    let renderer: Arc<dyn ContentRenderer> = Arc::new(MarkdownRenderer::new());
    let session_config = config.session.to_session_config();

    let controller = match &cli.resume {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session {}", path.display()))?;
            let snapshot: ChatSession = serde_json::from_str(&json)
                .with_context(|| format!("Invalid session file {}", path.display()))?;
            SessionController::resume(snapshot, renderer, transport, playback, session_config)
        }
        None => SessionController::new(
            Arc::new(MessageStore::new(renderer)),
            transport,
            playback,
            session_config,
        ),
    };
    let controller = controller.with_conversation_logger(logger);
    let greeting = controller.greet();

    Ok((controller, greeting))
}

async fn run_turn(
    cli: &Cli,
    controller: &SessionController,
    greeting: Option<&ChatMessage>,
    handle: TurnHandle,
) -> Result<TurnOutcome> {
    match cli.output {
        OutputFormat::Text => {
            if !cli.quiet
                && let Some(greeting) = greeting
            {
                println!("{}\n", ConsoleFormatter::format_message(greeting));
            }
            let mut printer =
                StreamPrinter::new(controller.store().clone(), std::io::stdout()).quiet(cli.quiet);
            Ok(follow_turn(controller, &mut printer, handle).await?)
        }
        OutputFormat::Json => {
            let outcome = handle.wait().await;
            println!("{}", ConsoleFormatter::format_json(&controller.snapshot()));
            Ok(outcome)
        }
    }
}

fn save_session(cli: &Cli, controller: &SessionController) -> Result<()> {
    let Some(path) = &cli.save else {
        return Ok(());
    };
    if controller.is_busy() {
        warn!("Saving while a turn is in flight; it will load as interrupted");
    }
    let json = ConsoleFormatter::format_json(&controller.snapshot());
    std::fs::write(path, json)
        .with_context(|| format!("Failed to save session {}", path.display()))?;
    info!("Saved session to {}", path.display());
    Ok(())
}
