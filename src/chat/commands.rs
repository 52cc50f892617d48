//! Slash command parsing for the tutor chat.
//!
//! Input starting with `/` controls sessions and is never sent to the
//! completion endpoint.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new session and make it active.
    New,

    /// List all sessions.
    Sessions,

    /// Switch to a session by its list position (1-based) or id.
    Switch(String),

    /// Retitle the active session.
    Rename(String),

    /// Reprint the active session's conversation.
    History,

    /// Write the active session as a standalone HTML page.
    Export(String),

    /// Display help information.
    Help,

    /// Exit the chat.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be submitted as a message.
///
/// # Examples
///
/// ```
/// # use tutorchat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/new"), Some(ChatCommand::New));
/// assert!(parse_command("/rename Fractions").is_some());
/// assert!(parse_command("What is 3/4 of 12?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "sessions" | "list" | "ls" => ChatCommand::Sessions,
        "switch" | "open" => required(argument, ChatCommand::Switch, "/switch requires a session number or id"),
        "rename" | "title" => required(argument, ChatCommand::Rename, "/rename requires a title"),
        "history" => ChatCommand::History,
        "export" => required(argument, ChatCommand::Export, "/export requires a file path"),
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn required<F>(argument: Option<&str>, constructor: F, missing: &str) -> ChatCommand
where
    F: Fn(String) -> ChatCommand,
{
    match argument {
        Some(arg) => constructor(arg.to_string()),
        None => ChatCommand::Invalid(missing.to_string()),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new chat and switch to it
  /sessions              List chats (the active one is marked with *)
  /switch <n|id>         Switch to chat number n or the chat with this id
  /rename <title>        Rename the active chat
  /history               Show the active chat again
  /export <file>         Save the active chat as an HTML page
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while a reply is appearing to show it all at once."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/NEW"), Some(ChatCommand::New));
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/ls"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
    }

    #[test]
    fn parse_switch() {
        assert_eq!(
            parse_command("/switch 2"),
            Some(ChatCommand::Switch("2".to_string()))
        );
        assert_eq!(
            parse_command("/switch   1714564800000  "),
            Some(ChatCommand::Switch("1714564800000".to_string()))
        );
        assert!(matches!(
            parse_command("/switch"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_rename_keeps_inner_spaces() {
        assert_eq!(
            parse_command("/rename  Fractions and  decimals "),
            Some(ChatCommand::Rename("Fractions and  decimals".to_string()))
        );
        assert!(matches!(
            parse_command("/rename   "),
            Some(ChatCommand::Invalid(msg)) if msg.contains("title")
        ));
    }

    #[test]
    fn parse_export() {
        assert_eq!(
            parse_command("/export chat.html"),
            Some(ChatCommand::Export("chat.html".to_string()))
        );
        assert!(matches!(
            parse_command("/export"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model gpt"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello!"), None);
        assert_eq!(parse_command("3/4 + 1/4"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        for command in ["/new", "/sessions", "/switch", "/rename", "/history", "/export", "/quit"] {
            assert!(help.contains(command), "missing {command}");
        }
    }
}
