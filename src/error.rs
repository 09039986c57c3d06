//! Error types for command parsing, validation and value resolution.

use thiserror::Error;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Process exit statuses, following `sysexits.h` where one applies.
pub mod status {
    /// Everything is fine.
    pub const OK: i32 = 0;
    /// Help was rendered instead of running a command.
    pub const RENDER_HELP: i32 = 42;
    /// The user supplied bad arguments or options.
    pub const USAGE: i32 = 64;
    /// The program's schema or code is wrong.
    pub const PROGRAMMER_ERROR: i32 = 70;
    /// A configuration file could not be loaded.
    pub const CONFIG_ERROR: i32 = 78;
    /// A sub-command was not found.
    pub const NOT_FOUND: i32 = 127;
    /// Anything else.
    pub const UNKNOWN: i32 = 2;
}

/// Errors that can occur while binding, validating or resolving command input
#[derive(Debug, Error)]
pub enum CommandError {
    /// A value is missing or not allowed, or flags were malformed
    #[error("{0}")]
    BadArguments(String),

    /// A referenced command does not exist
    #[error("{0}")]
    NotFound(String),

    /// A script, sub-command or function did not finish in time
    #[error("timed out resolving {what} after {seconds}s")]
    Timeout {
        /// What was being resolved.
        what: String,
        /// The allotted time.
        seconds: u64,
    },

    /// The declared schema is inconsistent
    #[error("bug: {0}")]
    Configuration(String),

    /// A template could not be parsed or rendered
    #[error("template error: {0}")]
    Template(String),

    /// A command action failed
    #[error("{0}")]
    Execution(String),

    /// A schema file could not be read or parsed
    #[error("could not load schema: {0}")]
    Schema(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Create a bad arguments error
    pub fn bad_arguments<S: Into<String>>(msg: S) -> Self {
        Self::BadArguments(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(what: S, seconds: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            seconds,
        }
    }

    /// Create a configuration (schema bug) error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create an execution error
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a schema loading error
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        Self::Schema(msg.into())
    }

    /// Whether this error is the user's fault rather than the program's.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::BadArguments(_) | Self::Timeout { .. })
    }

    /// Exit status the process should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BadArguments(_) | Self::Timeout { .. } => status::USAGE,
            Self::NotFound(_) => status::NOT_FOUND,
            Self::Configuration(_) | Self::Template(_) => status::PROGRAMMER_ERROR,
            Self::Schema(_) => status::CONFIG_ERROR,
            Self::Execution(_) | Self::Io(_) => status::UNKNOWN,
        }
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        CommandError::Execution(err.to_string())
    }
}
