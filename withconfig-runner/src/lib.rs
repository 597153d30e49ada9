//! Process execution and stream relay for `with-config`.
//!
//! [`ProcessLauncher`] spawns the child with the resolved configuration
//! overlaid on the environment, relays its stdout and stderr on two spawned
//! tasks, joins both relays and only then reads the exit status.
//! [`WithConfigExecutor`] puts a [`ConfigResolver`](withconfig_resolver::ConfigResolver)
//! in front of it.

pub mod environment;
pub mod executor;
pub mod launcher;
pub mod process;
pub mod relay;

pub use environment::{overlay, EnvPolicy};
pub use executor::WithConfigExecutor;
pub use launcher::{Launch, ProcessLauncher};
pub use process::ProcessConfig;
pub use relay::relay;
