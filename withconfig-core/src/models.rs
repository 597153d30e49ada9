use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::error::{Result, WithConfigError};

/// Configuration entries injected into the child's environment
pub type EnvMap = BTreeMap<String, String>;

/// Identifies the configuration to resolve
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSelection {
    pub name: String,
    pub namespace: Option<String>,
}

impl ConfigSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }
}

/// A command line plus the overrides to apply on top of the base environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchRequest {
    pub command: String,
    pub args: Vec<String>,
    pub env: EnvMap,
}

impl LaunchRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: EnvMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: EnvMap) -> Self {
        self.env = env;
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// One of the two output channels of a child process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// What a single stream relay did before it stopped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayOutcome {
    pub stream: StreamKind,
    pub bytes_forwarded: u64,
    /// Set when a read from the child failed and the relay stopped early.
    pub read_error: Option<String>,
    /// Set when writing to our own stream failed; the relay kept draining.
    pub write_error: Option<String>,
}

impl RelayOutcome {
    pub fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            bytes_forwarded: 0,
            read_error: None,
            write_error: None,
        }
    }

    /// True when the source was read all the way to end-of-stream.
    pub fn reached_eof(&self) -> bool {
        self.read_error.is_none()
    }
}

/// How the child process ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
}

impl Termination {
    pub fn success(&self) -> bool {
        matches!(self, Termination::Exited(0))
    }

    /// Exit code a shell would report: the code itself, or 128 + signal.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Termination::Exited(code) => code,
            Termination::Signaled(signal) => 128 + signal,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exited with status {}", code),
            Termination::Signaled(signal) => write!(f, "was terminated by signal {}", signal),
        }
    }
}

/// Result of a completed launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub launch_id: Uuid,
    pub command: String,
    pub termination: Termination,
    pub stdout: RelayOutcome,
    pub stderr: RelayOutcome,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.termination.success()
    }

    pub fn exit_code(&self) -> i32 {
        self.termination.exit_code()
    }

    /// Turn a failed child into a `ChildExecution` error.
    pub fn check(&self) -> Result<()> {
        if self.success() {
            Ok(())
        } else {
            Err(WithConfigError::ChildExecution {
                command: self.command.clone(),
                termination: self.termination,
            })
        }
    }
}
