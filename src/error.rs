//! Error types for tempsync
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for tempsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Connection errors (3xx)
    ConnectionFailed = 300,
    ConnectionTimeout = 301,
    ChannelClosed = 302,
    ChannelSend = 303,
    ChannelRecv = 304,

    // Protocol errors (4xx)
    UnexpectedTag = 400,
    DuplicateExternal = 401,
    ChannelCount = 402,
    InvalidTemperature = 403,

    // Convergence errors (5xx)
    RoundLimitExceeded = 500,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Connection errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Convergence errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// Could not establish the channel at all
    #[error("Failed to connect to {addr}: {message}")]
    ConnectionFailed { addr: String, message: String },

    /// Gave up retrying the connection
    #[error("Connection to {addr} timed out after {timeout_ms}ms")]
    ConnectionTimeout { addr: String, timeout_ms: u64 },

    /// The other end closed the channel in the middle of a round
    #[error("Channel to {peer} closed")]
    ChannelClosed { peer: String },

    /// Sending a message failed
    #[error("Failed to send to {peer}")]
    ChannelSend {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    /// Receiving a message failed
    #[error("Failed to receive from {peer}")]
    ChannelRecv {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// A message carried a tag that is not valid for its direction
    #[error("Unexpected tag {tag} from {peer}")]
    UnexpectedTag { peer: String, tag: i32 },

    /// Two reports in one round claimed the same identity
    #[error("External {index} reported twice in round {round}")]
    DuplicateExternal { index: u8, round: u64 },

    /// Wrong number of peer channels handed to the coordinator
    #[error("Expected {expected} external channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    #[error("Temperature {value} from {peer} is not a finite value within range")]
    InvalidTemperature { peer: String, value: f32 },

    // ─────────────────────────────────────────────────────────────
    // Convergence Errors
    // ─────────────────────────────────────────────────────────────

    /// Optional round cap reached before the system stabilized
    #[error("No convergence after {rounds} rounds (central={central})")]
    RoundLimitExceeded { rounds: u64, central: f32 },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::IoWrite,

            Error::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Error::ConnectionTimeout { .. } => ErrorCode::ConnectionTimeout,
            Error::ChannelClosed { .. } => ErrorCode::ChannelClosed,
            Error::ChannelSend { .. } => ErrorCode::ChannelSend,
            Error::ChannelRecv { .. } => ErrorCode::ChannelRecv,

            Error::UnexpectedTag { .. } => ErrorCode::UnexpectedTag,
            Error::DuplicateExternal { .. } => ErrorCode::DuplicateExternal,
            Error::ChannelCount { .. } => ErrorCode::ChannelCount,
            Error::InvalidTemperature { .. } => ErrorCode::InvalidTemperature,

            Error::RoundLimitExceeded { .. } => ErrorCode::RoundLimitExceeded,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the error ended a session mid-round (as opposed to before it started)
    pub fn is_mid_round(&self) -> bool {
        matches!(
            self,
            Error::ChannelClosed { .. }
                | Error::ChannelSend { .. }
                | Error::ChannelRecv { .. }
                | Error::UnexpectedTag { .. }
                | Error::DuplicateExternal { .. }
                | Error::InvalidTemperature { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'tempsync config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'tempsync config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::ConnectionFailed { .. } | Error::ConnectionTimeout { .. } => Some(
                "Make sure 'tempsync central' is running and listening on the configured host and port."
            ),
            Error::ChannelClosed { .. } | Error::ChannelSend { .. } | Error::ChannelRecv { .. } => Some(
                "A participant dropped out mid-round. The protocol cannot recover; restart all processes."
            ),

            Error::UnexpectedTag { .. } | Error::DuplicateExternal { .. } => Some(
                "Each external must be started with a distinct index between 1 and 4."
            ),

            Error::InvalidTemperature { .. } => Some(
                "Temperatures must be finite numbers no larger in magnitude than f32::MAX / 6."
            ),

            Error::RoundLimitExceeded { .. } => Some(
                "Raise 'protocol.max_rounds' or set it to 0 to run until convergence."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConnectionFailed {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Create a channel closed error
    pub fn channel_closed(peer: impl Into<String>) -> Self {
        Error::ChannelClosed { peer: peer.into() }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
