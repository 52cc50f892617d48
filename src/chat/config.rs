//! Configuration types for the tutor chat.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the front end runs with.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::render::DEFAULT_REVEAL_DELAY;

/// Directory name used for local storage under the home directory.
const DATA_DIR_NAME: &str = ".tutorchat";

/// Command-line arguments for the tutor-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Completion endpoint URL.
    #[arrrg(optional, "Completion endpoint (default: http://127.0.0.1:3000/api/chat)", "URL")]
    pub endpoint: Option<String>,

    /// Directory holding the saved sessions.
    #[arrrg(optional, "Where chats are saved (default: ~/.tutorchat)", "DIR")]
    pub data_dir: Option<String>,

    /// Milliseconds between revealed characters.
    #[arrrg(optional, "Delay between revealed characters; 0 disables (default: 20)", "MS")]
    pub reveal_delay_ms: Option<u32>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Seconds to wait for a reply (default: 30)", "SECS")]
    pub timeout_secs: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for the tutor chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// The completion endpoint.
    pub endpoint: String,

    /// Directory for the durable store.
    pub data_dir: PathBuf,

    /// Interval between revealed characters.
    pub reveal_delay: Duration,

    /// Upper bound on a completion round-trip.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// The data directory is `$HOME/.tutorchat`, or `./.tutorchat` when no
    /// home directory is known.
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            data_dir: default_data_dir(),
            reveal_delay: DEFAULT_REVEAL_DELAY,
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
        }
    }

    /// Sets the completion endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the reveal delay.
    pub fn with_reveal_delay(mut self, delay: Duration) -> Self {
        self.reveal_delay = delay;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            endpoint: args.endpoint.unwrap_or(defaults.endpoint),
            data_dir: args.data_dir.map(PathBuf::from).unwrap_or(defaults.data_dir),
            reveal_delay: args
                .reveal_delay_ms
                .map(|ms| Duration::from_millis(ms.into()))
                .unwrap_or(defaults.reveal_delay),
            timeout: args
                .timeout_secs
                .map(|secs| Duration::from_secs(secs.into()))
                .unwrap_or(defaults.timeout),
            use_color: !args.no_color,
        }
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        Some(home) => PathBuf::from(home).join(DATA_DIR_NAME),
        None => PathBuf::from(DATA_DIR_NAME),
    }
}
