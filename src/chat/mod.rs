//! Terminal front end for the tutor chat.
//!
//! This module provides the REPL building blocks used by `tutor-chat`:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing
//! - [`render`]: Terminal output
//!
//! The conversation logic itself lives in [`crate::controller`].

mod commands;
mod config;
mod render;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use render::{PlainTextRenderer, Renderer};

use crate::render::{MessageView, RenderPipeline, render_page};
use crate::types::{ChatSession, SessionId};

/// Find the session named by `/switch`: a 1-based list position or an id.
pub fn resolve_session(sessions: &[ChatSession], target: &str) -> Option<SessionId> {
    let target = target.trim();
    if let Some(session) = sessions.iter().find(|s| s.id.as_str() == target) {
        return Some(session.id.clone());
    }
    let position: usize = target.parse().ok()?;
    sessions
        .get(position.checked_sub(1)?)
        .map(|s| s.id.clone())
}

/// Render `session` as a standalone HTML page.
pub fn export_html(session: &ChatSession) -> String {
    let views: Vec<_> = session.messages.iter().map(MessageView::settled).collect();
    let rendered = RenderPipeline::new().render(&views);
    render_page(&session.title, &rendered)
}
