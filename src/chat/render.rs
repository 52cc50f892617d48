//! Terminal output for the tutor chat.
//!
//! This module provides a trait-based rendering abstraction so the REPL
//! can be driven against stdout or a buffer. The default implementation
//! uses ANSI escape codes to set the student and the tutor apart.

use std::io::{self, Stdout, Write};

use crate::client::is_error_message;
use crate::types::{ChatSession, Message, MessageRole};

/// ANSI escape code for dim text (used for the loading indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for blue text (used for the student).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for green text (used for the tutor).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Text of the loading indicator.
const LOADING: &str = "Tutor is thinking...";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a whole message with its speaker label.
    fn print_message(&mut self, message: &Message);

    /// Open a reply that will arrive in pieces.
    fn start_reply(&mut self, is_error: bool);

    /// Print the next piece of the reply.
    fn print_text(&mut self, text: &str);

    /// Close the reply opened by [`Renderer::start_reply`].
    fn finish_reply(&mut self);

    /// Show the loading indicator while a request is in flight.
    fn show_loading(&mut self);

    /// Remove the loading indicator.
    fn clear_loading(&mut self);

    /// Print a session list, marking `active`.
    fn print_sessions(&mut self, sessions: &[ChatSession], active: Option<&str>);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    loading: bool,
    in_reply: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Render into `out` instead of stdout.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            loading: false,
            in_reply: false,
        }
    }

    /// The underlying writer.
    pub fn writer(&self) -> &W {
        &self.out
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn label(&mut self, role: MessageRole, is_error: bool) {
        let (name, color) = match role {
            MessageRole::User => ("You", ANSI_BLUE),
            MessageRole::Assistant => ("Tutor", ANSI_GREEN),
        };
        if self.use_color {
            let _ = write!(self.out, "{ANSI_BOLD}{color}{name}:{ANSI_RESET} ");
            if is_error {
                let _ = write!(self.out, "{ANSI_RED}");
            }
        } else {
            let _ = write!(self.out, "{name}: ");
        }
    }

    fn reset(&mut self) {
        if self.use_color {
            let _ = write!(self.out, "{ANSI_RESET}");
        }
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_message(&mut self, message: &Message) {
        self.clear_loading();
        self.label(message.role, is_error_message(message));
        let _ = write!(self.out, "{}", message.content);
        self.reset();
        let _ = writeln!(self.out);
        self.flush();
    }

    fn start_reply(&mut self, is_error: bool) {
        self.clear_loading();
        self.label(MessageRole::Assistant, is_error);
        self.in_reply = true;
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        self.flush();
    }

    fn finish_reply(&mut self) {
        if self.in_reply {
            self.reset();
            let _ = writeln!(self.out);
            self.in_reply = false;
        }
        self.flush();
    }

    fn show_loading(&mut self) {
        if self.loading {
            return;
        }
        if self.use_color {
            let _ = write!(self.out, "{ANSI_DIM}{LOADING}{ANSI_RESET}");
        } else {
            let _ = write!(self.out, "{LOADING}");
        }
        self.loading = true;
        self.flush();
    }

    fn clear_loading(&mut self) {
        if !self.loading {
            return;
        }
        if self.use_color {
            // Return to column zero and erase the line.
            let _ = write!(self.out, "\r\x1b[2K");
        } else {
            let _ = writeln!(self.out);
        }
        self.loading = false;
        self.flush();
    }

    fn print_sessions(&mut self, sessions: &[ChatSession], active: Option<&str>) {
        self.clear_loading();
        if sessions.is_empty() {
            let _ = writeln!(self.out, "    (no chats yet; /new starts one)");
        }
        for (index, session) in sessions.iter().enumerate() {
            let marker = if Some(session.id.as_str()) == active { '*' } else { ' ' };
            let _ = writeln!(
                self.out,
                "  {marker} {:>2}. {} ({} messages) [{}]",
                index + 1,
                session.title,
                session.len(),
                session.id
            );
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.clear_loading();
        if self.use_color {
            let _ = writeln!(self.out, "{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            let _ = writeln!(self.out, "Error: {error}");
        }
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.clear_loading();
        let _ = writeln!(self.out, "{info}");
        self.flush();
    }
}
