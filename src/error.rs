//! Error types for benchgrid
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - Exit codes for the CLI
//! - A clear split between recoverable and fatal failure classes

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for benchgrid operations
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

    // Cache errors (3xx)
    CacheCorrupt = 300,
    CacheEncode = 301,

    // Identifier/registry errors (4xx)
    UnknownIdentifier = 400,
    InvalidIdentifier = 401,
    InvalidHostSlot = 402,

    // Evaluation errors (5xx)
    EvaluationFailed = 500,
    RemoteExit = 501,
    RemoteTimeout = 502,

    // Transport errors (6xx)
    HostUnreachable = 600,
    SshSpawn = 601,

    // Protocol errors (7xx)
    ProtocolViolation = 700,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Cache errors
            400..=499 => 40, // Identifier errors
            500..=599 => 50, // Evaluation errors
            600..=699 => 60, // Transport errors
            700..=799 => 70, // Protocol errors
            _ => 90,         // Internal errors
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for benchgrid
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

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

    // ─────────────────────────────────────────────────────────────
    // Cache Errors
    // ─────────────────────────────────────────────────────────────

    /// Cache file exists but cannot be decoded. The engine treats this
    /// as a miss and recomputes; it is surfaced so callers can log it.
    #[error("Corrupt cache file: {path}")]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to encode a result for caching
    #[error("Failed to encode cached result: {0}")]
    CacheEncode(#[source] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Identifier / Registry Errors
    // ─────────────────────────────────────────────────────────────

    /// An identifier is not present in the registry
    #[error("Unknown {kind} identifier: '{name}'")]
    UnknownIdentifier { kind: &'static str, name: String },

    /// An identifier contains the cache-key separator or shell-unsafe bytes
    #[error("Invalid {kind} identifier '{name}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// A host slot entry could not be parsed
    #[error("Invalid host slot '{entry}': expected 'hostname:remote_binary'")]
    InvalidHostSlot { entry: String },

    // ─────────────────────────────────────────────────────────────
    // Evaluation Errors
    // ─────────────────────────────────────────────────────────────

    /// Local evaluation failed
    #[error("Evaluation failed for {task}: {message}")]
    EvaluationFailed { task: String, message: String },

    /// A remote invocation exited with a non-zero status
    #[error("Remote command on {host} exited with status {code}")]
    RemoteExit { host: String, code: i32 },

    /// A remote invocation exceeded the execution timeout
    #[error("Remote command on {host} timed out after {timeout_secs}s")]
    RemoteTimeout { host: String, timeout_secs: u64 },

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────

    /// A host could not be reached during pre-flight cleanup; fatal for
    /// the whole batch
    #[error("Failed to connect to {host} after {timeout_secs} seconds")]
    HostUnreachable { host: String, timeout_secs: u64 },

    /// Failed to spawn the ssh/scp process itself
    #[error("Failed to spawn {program}: {source}")]
    SshSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// The remote call reported success but no result artifact could be
    /// retrieved; indicates infrastructure corruption, never retried
    #[error("Remote call on {host} finished but no local result file was found at {path}")]
    ProtocolViolation { host: String, path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } | Error::Config(_) => ErrorCode::ConfigValidation,
            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } | Error::Toml(_) => ErrorCode::IoWrite,
            Error::Io(_) => ErrorCode::IoRead,
            Error::CacheCorrupt { .. } => ErrorCode::CacheCorrupt,
            Error::CacheEncode(_) => ErrorCode::CacheEncode,
            Error::UnknownIdentifier { .. } => ErrorCode::UnknownIdentifier,
            Error::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            Error::InvalidHostSlot { .. } => ErrorCode::InvalidHostSlot,
            Error::EvaluationFailed { .. } => ErrorCode::EvaluationFailed,
            Error::RemoteExit { .. } => ErrorCode::RemoteExit,
            Error::RemoteTimeout { .. } => ErrorCode::RemoteTimeout,
            Error::HostUnreachable { .. } => ErrorCode::HostUnreachable,
            Error::SshSpawn { .. } => ErrorCode::SshSpawn,
            Error::ProtocolViolation { .. } => ErrorCode::ProtocolViolation,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the CLI exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Whether this error is isolated to one task (the batch continues)
    /// rather than fatal for the whole run.
    pub fn is_task_local(&self) -> bool {
        matches!(
            self,
            Error::EvaluationFailed { .. }
                | Error::RemoteExit { .. }
                | Error::RemoteTimeout { .. }
        )
    }

    /// Format the error for terminal display, including the code and a
    /// suggestion where one exists.
    pub fn format_for_terminal(&self) -> String {
        let mut out = format!("error[{}]: {}\n", self.code(), self);

        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(&format!("  caused by: {}\n", cause));
            source = cause.source();
        }

        if let Some(hint) = self.suggestion() {
            out.push_str(&format!("  hint: {}\n", hint));
        }
        out
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => {
                Some("run 'benchgrid config init' to create a default configuration")
            }
            Error::HostUnreachable { .. } => {
                Some("check that the host is up and ssh keys are configured")
            }
            Error::InvalidHostSlot { .. } => {
                Some("host slots look like 'machine1:/usr/local/bin/benchgrid'")
            }
            Error::UnknownIdentifier { .. } => {
                Some("run 'benchgrid matrix' to list known identifiers")
            }
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::CacheCorrupt.as_str(), "E300");
        assert_eq!(ErrorCode::ProtocolViolation.as_str(), "E700");
    }

    #[test]
    fn test_exit_code_ranges() {
        assert_eq!(ErrorCode::ConfigNotFound.exit_code(), 10);
        assert_eq!(ErrorCode::HostUnreachable.exit_code(), 60);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_task_local_classification() {
        let e = Error::RemoteExit {
            host: "m1".to_string(),
            code: 1,
        };
        assert!(e.is_task_local());

        let e = Error::HostUnreachable {
            host: "m1".to_string(),
            timeout_secs: 15,
        };
        assert!(!e.is_task_local());

        let e = Error::ProtocolViolation {
            host: "m1".to_string(),
            path: PathBuf::from("/tmp/x.json"),
        };
        assert!(!e.is_task_local());
    }

    #[test]
    fn test_format_for_terminal_includes_hint() {
        let e = Error::InvalidHostSlot {
            entry: "nocolon".to_string(),
        };
        let text = e.format_for_terminal();
        assert!(text.contains("E402"));
        assert!(text.contains("hint:"));
    }
}
