//! CLI command definitions

use clap::{Parser, ValueEnum};
use murmur_application::TransportKind;
use std::path::PathBuf;

/// Transport for text turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Server-sent events
    Sse,
    /// Newline-delimited frames in a chunked body
    Chunked,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Sse => TransportKind::Sse,
            TransportArg::Chunked => TransportKind::Chunked,
        }
    }
}

/// Output format for one-shot turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Stream the reply as it arrives
    Text,
    /// Print the session as JSON when the turn ends
    Json,
}

/// CLI arguments for murmur
#[derive(Parser, Debug)]
#[command(name = "murmur")]
#[command(author, version, about = "Streaming conversational client - text and voice turns")]
#[command(long_about = r#"
Murmur sends a message (typed or recorded) to a conversation server and
streams the reply into the terminal as it arrives.

Text turns use server-sent events by default; voice turns are posted to
the chunked endpoint. Received audio is decoded and, when an output
directory is configured, written out as WAV files.

Configuration files are loaded from (in priority order):
1. MURMUR_* environment variables (e.g. MURMUR_ENDPOINT__BASE_URL)
2. --config <path>     Explicit config file
3. ./murmur.toml       Project-level config
4. ~/.config/murmur/config.toml   Global config

Example:
  murmur "What's the weather like on Mars?"
  murmur --audio question.webm --audio-out ./replies
  murmur --chat --transport chunked
"#)]
pub struct Cli {
    /// Message to send (not required in chat or audio mode)
    pub message: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Send an encoded recording instead of text
    #[arg(long, value_name = "FILE", conflicts_with = "message")]
    pub audio: Option<PathBuf>,

    /// Transport for text turns
    #[arg(short, long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Server base URL (overrides endpoint.base_url)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Bearer token for the server (default: read MURMUR_TOKEN per request)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// System instruction sent with every turn
    #[arg(long, value_name = "TEXT")]
    pub system: Option<String>,

    /// Voice for spoken replies
    #[arg(long, value_name = "NAME")]
    pub voice: Option<String>,

    /// Directory to write received audio to
    #[arg(long, value_name = "DIR")]
    pub audio_out: Option<PathBuf>,

    /// Resume a session saved with --save or /save
    #[arg(long, value_name = "FILE")]
    pub resume: Option<PathBuf>,

    /// Save the session as JSON on exit
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress headers and status lines
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory for daily-rolling diagnostic logs
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
