//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::output::console::ConsoleFormatter;
use crate::output::stream::{StreamPrinter, follow_turn};
use colored::Colorize;
use murmur_application::{
    AudioCaptureController, MediaDevices, SessionController, SessionError, TurnHandle,
};
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const HISTORY_CAPACITY: usize = 1000;

/// Opens capture devices backed by a recording on disk.
pub type DeviceFactory = Box<dyn Fn(&Path) -> Arc<dyn MediaDevices> + Send + Sync>;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Quit,
    Title,
    History,
    Save(PathBuf),
    Audio(PathBuf),
    /// A known command missing its argument, or an unknown command.
    Invalid(String),
}

impl ReplCommand {
    /// Parse a line starting with `/`. Returns `None` for ordinary input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "help" | "h" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "title" => ReplCommand::Title,
            "history" => ReplCommand::History,
            "save" if !arg.is_empty() => ReplCommand::Save(PathBuf::from(arg)),
            "audio" if !arg.is_empty() => ReplCommand::Audio(PathBuf::from(arg)),
            "save" | "audio" => ReplCommand::Invalid(format!("Usage: /{} <path>", name)),
            other => ReplCommand::Invalid(format!("Unknown command: /{}", other)),
        };
        Some(command)
    }
}

/// Interactive chat REPL
pub struct ChatRepl {
    controller: Arc<SessionController>,
    devices: Option<DeviceFactory>,
    quiet: bool,
    history_path: Option<PathBuf>,
}

impl ChatRepl {
    /// Create a new ChatRepl
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            devices: None,
            quiet: false,
            history_path: dirs::data_dir().map(|p| p.join("murmur").join("history.txt")),
        }
    }

    /// Enable `/audio` with the given device factory
    pub fn with_devices(mut self, devices: DeviceFactory) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Suppress the banner and status lines
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn editor(&self) -> Reedline {
        let editor = Reedline::create();
        let Some(path) = &self.history_path else {
            return editor;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match FileBackedHistory::with_file(HISTORY_CAPACITY, path.clone()) {
            Ok(history) => editor.with_history(Box::new(history)),
            Err(e) => {
                warn!("History unavailable at {}: {}", path.display(), e);
                editor
            }
        }
    }

    /// Run the interactive REPL
    ///
    /// Requires a multi-threaded runtime; line editing blocks the calling
    /// worker while the prompt is open.
    pub async fn run(&self) -> io::Result<()> {
        let mut editor = self.editor();
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(">>> ".to_string()),
            DefaultPromptSegment::Empty,
        );
        let mut printer = StreamPrinter::new(self.controller.store().clone(), io::stdout())
            .quiet(self.quiet);

        self.print_welcome();

        loop {
            let signal = tokio::task::block_in_place(|| editor.read_line(&prompt));

            match signal {
                Ok(Signal::Success(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if let Some(command) = ReplCommand::parse(line) {
                        if self.handle_command(command, &mut printer).await? {
                            break;
                        }
                        continue;
                    }

                    let turn = self.controller.send_text(line);
                    self.follow(turn, &mut printer).await?;
                }
                Ok(Signal::CtrlC) => {
                    println!("^C");
                    continue;
                }
                Ok(Signal::CtrlD) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    fn print_welcome(&self) {
        if self.quiet {
            return;
        }
        let store = self.controller.store();
        println!();
        println!(
            "{}",
            ConsoleFormatter::banner(
                store.title().as_deref(),
                &self.controller.config().transport.to_string()
            )
        );
        for message in store.messages() {
            println!("{}", ConsoleFormatter::format_message(&message));
        }
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("Commands:");
        println!("  /help, /h, /?     - Show this help");
        println!("  /title            - Show the session title");
        println!("  /history          - Show the conversation so far");
        println!("  /save <path>      - Save the session as JSON");
        if self.devices.is_some() {
            println!("  /audio <path>     - Send a recording as a voice message");
        }
        println!("  /quit, /exit, /q  - Exit chat");
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(
        &self,
        command: ReplCommand,
        printer: &mut StreamPrinter<Stdout>,
    ) -> io::Result<bool> {
        match command {
            ReplCommand::Quit => {
                println!("Bye!");
                return Ok(true);
            }
            ReplCommand::Help => self.print_help(),
            ReplCommand::Title => {
                let title = self.controller.store().title();
                println!("{}", title.as_deref().unwrap_or("(untitled)"));
            }
            ReplCommand::History => {
                let snapshot = self.controller.snapshot();
                println!("{}", ConsoleFormatter::format_transcript(&snapshot));
            }
            ReplCommand::Save(path) => {
                let json = ConsoleFormatter::format_json(&self.controller.snapshot());
                match std::fs::write(&path, json) {
                    Ok(()) => println!("Saved session to {}", path.display()),
                    Err(e) => eprintln!("{} {}", "Could not save session:".red(), e),
                }
            }
            ReplCommand::Audio(path) => self.send_audio_file(&path, printer).await?,
            ReplCommand::Invalid(message) => eprintln!("{}", message.yellow()),
        }
        Ok(false)
    }

    async fn send_audio_file(
        &self,
        path: &Path,
        printer: &mut StreamPrinter<Stdout>,
    ) -> io::Result<()> {
        let Some(devices) = &self.devices else {
            eprintln!("{}", "Voice messages are not available.".yellow());
            return Ok(());
        };

        let capture = AudioCaptureController::new(devices(path));
        match capture.start().await {
            Ok(info) => debug!("Recording {} ({})", info.stream_id, info.mime_type),
            Err(e) => {
                eprintln!("{} {}", "Could not open recording:".red(), e);
                return Ok(());
            }
        }

        let turn = self.controller.send_recording(&capture).await;
        self.follow(turn, printer).await
    }

    async fn follow(
        &self,
        turn: Result<TurnHandle, SessionError>,
        printer: &mut StreamPrinter<Stdout>,
    ) -> io::Result<()> {
        let handle = match turn {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                return Ok(());
            }
        };

        let outcome = follow_turn(&self.controller, printer, handle).await?;
        debug!("Turn finished (completed: {})", outcome.is_completed());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_input_is_not_a_command() {
        assert_eq!(ReplCommand::parse("hello there"), None);
    }

    #[test]
    fn test_parse_commands_and_aliases() {
        assert_eq!(ReplCommand::parse("/q"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/exit"), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/?"), Some(ReplCommand::Help));
        assert_eq!(ReplCommand::parse("  /history "), Some(ReplCommand::History));
    }

    #[test]
    fn test_parse_path_arguments() {
        assert_eq!(
            ReplCommand::parse("/save  session.json"),
            Some(ReplCommand::Save(PathBuf::from("session.json")))
        );
        assert_eq!(
            ReplCommand::parse("/audio clip.webm"),
            Some(ReplCommand::Audio(PathBuf::from("clip.webm")))
        );
    }

    #[test]
    fn test_missing_argument_and_unknown_command() {
        assert_eq!(
            ReplCommand::parse("/save"),
            Some(ReplCommand::Invalid("Usage: /save <path>".to_string()))
        );
        assert_eq!(
            ReplCommand::parse("/models"),
            Some(ReplCommand::Invalid("Unknown command: /models".to_string()))
        );
    }
}
