use std::io;

use thiserror::Error;

/// Errors produced by the path model, the filesystem backends, the parser and the bundler.
#[derive(Debug, Error)]
pub enum Error {
    /// An allocation could not be satisfied
    #[error("out of memory")]
    OutOfMemory,
    /// A path was malformed or could not be resolved against a filesystem
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Reading, writing or inspecting an existing handle failed
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The syntax engine produced no tree, or the tree did not have the expected shape
    #[error("parse error in {path}: {reason}")]
    Parse { path: String, reason: String },
    /// Imports were requested from a parser that has not parsed its file yet
    #[error("file is not parsed: {0}")]
    FileIsNotParsed(String),
    /// A non-relative import had no resolution strategy
    #[error("unsupported import '{request}' in {from}")]
    UnsupportedImport { request: String, from: String },
}

impl Error {
    pub(crate) fn invalid_path(msg: impl Into<String>) -> Self {
        Error::InvalidPath(msg.into())
    }

    pub(crate) fn parse(path: impl ToString, reason: impl Into<String>) -> Self {
        Error::Parse { path: path.to_string(), reason: reason.into() }
    }

    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Error::InvalidPath(_))
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
