use thiserror::Error;

use crate::models::{ExitOutcome, StreamKind, Termination};

/// Exit code used when `with-config` itself fails, as opposed to the child
/// exiting with its own status.
pub const LAUNCHER_FAILURE_EXIT_CODE: i32 = 125;

#[derive(Error, Debug)]
pub enum WithConfigError {
    #[error("Failed to resolve configuration '{name}': {reason}")]
    ConfigResolution { name: String, reason: String },

    #[error("Command not found: {command} ({reason})")]
    CommandNotFound { command: String, reason: String },

    #[error("Unable to start command '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Unable to get {0} pipe of child process")]
    StreamSetup(StreamKind),

    #[error("Error reading child {stream}: {source}")]
    RelayRead {
        stream: StreamKind,
        source: std::io::Error,
    },

    #[error("Failed to wait for child process: {0}")]
    Wait(std::io::Error),

    #[error("Command '{command}' {termination}")]
    ChildExecution {
        command: String,
        termination: Termination,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WithConfigError {
    /// True for failures that belong to the launcher rather than the child.
    pub fn is_launcher_failure(&self) -> bool {
        !matches!(self, WithConfigError::ChildExecution { .. })
    }

    /// Process exit code this error should produce.
    pub fn exit_code(&self) -> i32 {
        match self {
            WithConfigError::ChildExecution { termination, .. } => termination.exit_code(),
            _ => LAUNCHER_FAILURE_EXIT_CODE,
        }
    }
}

/// Map the result of a run onto the exit code `with-config` should exit with.
pub fn exit_code_for(result: &Result<ExitOutcome>) -> i32 {
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => e.exit_code(),
    }
}

pub type Result<T> = std::result::Result<T, WithConfigError>;
