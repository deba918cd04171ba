//! Console output formatter for chat sessions

use colored::Colorize;
use murmur_domain::{ChatMessage, ChatSession, Role, StreamingState};

/// Formats messages and transcripts for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Label printed before a message's content.
    pub fn role_label(role: Role) -> String {
        match role {
            Role::User => "you".green().bold().to_string(),
            Role::Assistant => "assistant".cyan().bold().to_string(),
            Role::System => "system".yellow().bold().to_string(),
        }
    }

    /// Format one message with its role label.
    pub fn format_message(message: &ChatMessage) -> String {
        let mut output = format!("{} {}", Self::role_label(message.role), message.content);

        if !message.suggestions.is_empty() {
            output.push('\n');
            for suggestion in &message.suggestions {
                output.push_str(&format!("  {} {}\n", "›".dimmed(), suggestion));
            }
            output.truncate(output.trim_end().len());
        }

        match message.state {
            StreamingState::Errored => {
                let reason = message.error.as_deref().unwrap_or("Unknown error");
                output.push_str(&format!("\n{} {}", "error:".red().bold(), reason.red()));
            }
            StreamingState::Streaming => {
                output.push_str(&format!(" {}", "…".dimmed()));
            }
            StreamingState::Complete => {}
        }

        output
    }

    /// Format the whole session timeline.
    pub fn format_transcript(session: &ChatSession) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(session.title.as_deref().unwrap_or("Untitled")));
        output.push('\n');

        for message in &session.messages {
            output.push('\n');
            output.push_str(&Self::format_message(message));
            output.push('\n');
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(session: &ChatSession) -> String {
        serde_json::to_string_pretty(session).unwrap_or_else(|_| "{}".to_string())
    }

    /// Header printed when an interactive session opens.
    pub fn banner(title: Option<&str>, transport: &str) -> String {
        let mut output = Self::header("murmur");
        output.push_str(&format!(
            "\n{} {}\n",
            "Transport:".cyan().bold(),
            transport
        ));
        if let Some(title) = title {
            output.push_str(&format!("{} {}\n", "Session:".cyan().bold(), title));
        }
        output.push_str(&format!(
            "{}\n",
            "Type /help for commands, Ctrl+C cancels a reply.".dimmed()
        ));
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_format_errored_message_shows_reason() {
        plain();
        let mut message = ChatMessage::assistant("partial");
        message.state = StreamingState::Errored;
        message.error = Some("Sorry, something went wrong.".to_string());

        let output = ConsoleFormatter::format_message(&message);
        assert!(output.starts_with("assistant partial"));
        assert!(output.contains("error: Sorry, something went wrong."));
    }

    #[test]
    fn test_format_suggestions() {
        plain();
        let message = ChatMessage::system("Hi!")
            .with_suggestions(vec!["Tell me a joke".to_string(), "Weather?".to_string()]);

        let output = ConsoleFormatter::format_message(&message);
        assert_eq!(output, "system Hi!\n  › Tell me a joke\n  › Weather?");
    }

    #[test]
    fn test_transcript_lists_messages_in_order() {
        plain();
        let mut session = ChatSession::new().with_title("Greetings");
        session.messages.push(ChatMessage::user("Hello"));
        session.messages.push(ChatMessage::assistant("Hi there!"));

        let output = ConsoleFormatter::format_transcript(&session);
        let user = output.find("you Hello").unwrap();
        let reply = output.find("assistant Hi there!").unwrap();
        assert!(output.contains("Greetings"));
        assert!(user < reply);
    }

    #[test]
    fn test_format_json_round_trips() {
        let mut session = ChatSession::new();
        session.messages.push(ChatMessage::user("Hello"));

        let json = ConsoleFormatter::format_json(&session);
        let parsed: ChatSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "  "), "  a\n  b");
    }
}
