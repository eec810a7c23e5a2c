//! Error types for the post-process pass and its backends.

use std::path::PathBuf;

/// Errors surfaced by pass lifecycle calls and backend operations.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// A required filter program was not supplied; the pass is never scheduled.
    #[error("missing filter program(s): {missing}")]
    MissingConfiguration { missing: &'static str },

    /// The backend refused to hand out an intermediate buffer.
    #[error("failed to allocate {width}x{height} intermediate buffer: {reason}")]
    ResourceAllocation {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A stage touched a buffer outside its producer/consumer window.
    /// Indicates a host-ordering bug, never a recoverable condition.
    #[error("ordering violation: {0}")]
    OrderingViolation(String),

    /// A filter program could not be loaded.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Errors that can occur while loading filter program sources.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("program file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read program file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("program '{name}' has no `fs_main` entry point")]
    MissingEntryPoint { name: String },
}
