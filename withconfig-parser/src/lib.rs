//! Parser for dotenv-style env files used as a configuration source.

mod grammar;
mod parser;

pub use parser::parse_env_file;
