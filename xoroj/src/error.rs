//! Error types for `XorOJ`
//!
//! One `thiserror` enum per concern, aggregated by [`XorOjError`] which
//! also maps every failure onto a process exit code for the CLI.

use std::path::PathBuf;

use thiserror::Error;
use xoroj_core::WindowError;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `xoroj` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Backend API error (unreachable, rejected, unauthorized)
    pub const API_ERROR: i32 = 4;

    /// Contest window from the backend is malformed
    pub const WINDOW_ERROR: i32 = 5;

    /// Registration was refused or failed
    pub const REGISTRATION_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `xoroj` operations.
#[derive(Debug, Error)]
pub enum XorOjError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend API error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Malformed contest window
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Registration error
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl XorOjError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Api(_) => ExitCode::API_ERROR,
            Self::Window(_) => ExitCode::WINDOW_ERROR,
            Self::Registration(_) => ExitCode::REGISTRATION_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", format_issues(errors))]
    ValidationError {
        /// Path to the configuration file, or `<defaults>`
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced with `${VAR:?message}` is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message attached to the reference
        location: String,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g. `"api.base_url"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported but does not prevent loading
    Warning,
}

// ============================================================================
// API Errors
// ============================================================================

/// Errors talking to the `XorOJ` REST backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("request to {0} timed out")]
    Timeout(String),

    /// Backend answered 401
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Backend answered with another non-2xx status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response text, or `HTTP <status>` when empty
        body: String,
    },

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Backend answered 2xx but refused the operation
    #[error("{0}")]
    Rejected(String),
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Failure reported by a registration collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NetworkFailure {
    /// Human-readable failure description
    pub message: String,
}

impl NetworkFailure {
    /// Creates a failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ApiError> for NetworkFailure {
    fn from(err: ApiError) -> Self {
        Self::new(err.to_string())
    }
}

/// Recoverable errors returned by `register()`.
///
/// The controller stays usable after any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The user is already registered; no request was sent
    #[error("already registered for this contest")]
    AlreadyRegistered,

    /// The contest is over; no request was sent
    #[error("contest has ended")]
    ContestEnded,

    /// The registration request failed
    #[error("registration failed: {0}")]
    NetworkFailure(#[from] NetworkFailure),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `xoroj` operations.
pub type Result<T> = std::result::Result<T, XorOjError>;

// ============================================================================
// Tests
// ============================================================================
