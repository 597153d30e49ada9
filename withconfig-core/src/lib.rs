//! Shared types for `with-config`: the error taxonomy, exit-code policy and the
//! data passed between resolvers, the launcher and the CLI.

pub mod error;
pub mod models;

pub use error::{exit_code_for, Result, WithConfigError, LAUNCHER_FAILURE_EXIT_CODE};
pub use models::*;
