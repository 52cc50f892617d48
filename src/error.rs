//! Error types for tutorchat.
//!
//! One error type covers every layer: the session store, the persistent
//! store adapters, the completion client, and the completion server.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

use crate::types::SessionId;

/// The main error type for tutorchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// A required setting (such as the upstream API credential) is missing.
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// The completion endpoint could not be reached or answered with a
    /// non-success status.
    Transport {
        /// Human-readable error message.
        message: String,
        /// HTTP status code, when a response was received.
        status_code: Option<u16>,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The remote completion API failed or produced an unusable payload.
    Upstream {
        /// Human-readable error message.
        message: String,
        /// HTTP status code returned by the upstream, if any.
        status_code: Option<u16>,
    },

    /// The request did not finish within its time bound.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// An operation referenced a session absent from the collection.
    SessionNotFound {
        /// The stale id.
        id: SessionId,
    },

    /// Input was rejected.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new transport error.
    pub fn transport(
        message: impl Into<String>,
        status_code: Option<u16>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            status_code,
            source: source.map(Arc::from),
        }
    }

    /// Creates a new upstream error.
    pub fn upstream(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Error::Upstream {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new session-not-found error.
    pub fn session_not_found(id: SessionId) -> Self {
        Error::SessionNotFound { id }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Maps a reqwest failure onto the taxonomy.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Option<f64>) -> Self {
        if err.is_timeout() {
            Error::timeout(format!("request timed out: {err}"), timeout)
        } else if err.is_decode() {
            Error::upstream(format!("malformed response: {err}"), None)
        } else {
            let status = err.status().map(|s| s.as_u16());
            Error::transport(format!("request failed: {err}"), status, Some(Box::new(err)))
        }
    }

    /// Returns true if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true if this error is a transport error.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Returns true if this error came from the upstream API.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream { .. })
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a "session not found" error.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Error::SessionNotFound { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Transport { status_code, .. } => *status_code,
            Error::Upstream { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::Transport {
                message,
                status_code,
                ..
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Transport error: {message} (status {status_code})")
                } else {
                    write!(f, "Transport error: {message}")
                }
            }
            Error::Upstream {
                message,
                status_code,
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Upstream error: {message} (status {status_code})")
                } else {
                    write!(f, "Upstream error: {message}")
                }
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::SessionNotFound { id } => {
                write!(f, "Session not found: {id}")
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for tutorchat operations.
pub type Result<T> = std::result::Result<T, Error>;
