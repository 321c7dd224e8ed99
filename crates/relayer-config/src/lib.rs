//! Configuration for the feed relayer.
//!
//! Configuration is loaded from a TOML file with `${VAR}` environment
//! substitution and a small set of environment overrides. Validation runs at
//! load time: a process with a broken configuration never enters the running
//! state.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}
