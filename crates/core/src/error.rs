// Typed errors for the dispatch core

use std::path::PathBuf;

/// Tool arguments rejected before any process is spawned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("argument `{0}` must be a string")]
    NotAString(&'static str),

    #[error("argument `{0}` must not be empty")]
    Empty(&'static str),
}

/// Reasons the process runner could not produce an outcome
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("interpreter executable `{}` not found", .executable.display())]
    NotFound { executable: PathBuf },

    #[error("failed to start interpreter `{}`: {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read interpreter output: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid interpreter configuration, caught at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("interpreter executable must not be empty")]
    EmptyExecutable,

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}
