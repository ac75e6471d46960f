use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Various error types
#[derive(Debug, Error)]
pub enum BuildError {
    /// The `solc` process failed or could not be spawned
    #[error("Solc Error: {0}")]
    Solc(String),
    /// The compiler returned diagnostics the configured policy treats as fatal
    #[error("The following errors/warnings were returned by solc:\n\n{0}")]
    Diagnostics(String),
    /// The compiler output does not match the standard json schema
    #[error("Invalid compiler output at `{path}`: {source}")]
    InvalidCompilerOutput { path: String, source: serde_json::Error },
    #[error(transparent)]
    Semver(#[from] semver::Error),
    /// Deserialization error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Filesystem IO error
    #[error(transparent)]
    Io(#[from] BuildIoError),
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
    /// Invalid build configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BuildError {
    pub(crate) fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        BuildIoError::new(err, path).into()
    }
    pub(crate) fn solc(msg: impl Into<String>) -> Self {
        BuildError::Solc(msg.into())
    }
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        BuildError::Config(msg.into())
    }

    /// Returns `true` if this error was caused by compiler diagnostics
    pub fn is_diagnostics(&self) -> bool {
        matches!(self, BuildError::Diagnostics(_))
    }
}

#[derive(Debug, Error)]
#[error("\"{}\": {io}", self.path.display())]
pub struct BuildIoError {
    io: io::Error,
    path: PathBuf,
}

impl BuildIoError {
    pub fn new(io: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { io, path: path.into() }
    }

    /// The path at which the error occurred
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
