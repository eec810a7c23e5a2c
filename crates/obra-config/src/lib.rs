//! Configuration for the Obra Dinn post-process demo.
//!
//! Settings persist to disk as RON and can be overridden from the command
//! line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CONFIG_FILE_NAME, Config, DebugConfig, OutputConfig, PassConfig};
pub use error::ConfigError;
