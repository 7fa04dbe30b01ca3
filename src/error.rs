//! Error types emitted while resolving assembly references.

use std::{
    io,
    path::{Path, PathBuf},
};

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

/// Various error types describing a failed resolver invocation.
///
/// Most per-reference failures (unresolvable identities, malformed assembly
/// files, architecture mismatches) are *not* errors at this level: they are
/// recorded on the owning [`Reference`](crate::reference::Reference) and in
/// the decision log, and the closure continues. Only invocation-level
/// failures abort with a `ResolveError`.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The binding-redirect configuration file could not be read or parsed.
    #[error("invalid configuration file {path}:{line}: {reason}", path = .path.display())]
    InvalidConfigFile { path: PathBuf, line: usize, reason: String },
    /// An input parameter failed validation.
    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: String },
    /// The invocation was cancelled before completing.
    #[error("resolution cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] ResolveIoError),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Failed to parse a textual fusion name.
    #[error("invalid fusion name `{0}`: {1}")]
    FusionName(String, String),
    #[error("{0}")]
    Message(String),
}

impl ResolveError {
    pub fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        ResolveIoError::new(err, path).into()
    }

    pub(crate) fn msg(msg: impl std::fmt::Display) -> Self {
        ResolveError::Message(msg.to_string())
    }

    pub(crate) fn invalid_parameter(name: &'static str, value: impl Into<String>) -> Self {
        ResolveError::InvalidParameter { name, value: value.into() }
    }
}

/// An io error paired with the path that produced it.
#[derive(Debug, thiserror::Error)]
#[error("\"{path}\": {io}", path = .path.display())]
pub struct ResolveIoError {
    io: io::Error,
    path: PathBuf,
}

impl ResolveIoError {
    pub fn new(io: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { io, path: path.into() }
    }

    /// The path at which the error occurred.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn io_error(&self) -> &io::Error {
        &self.io
    }
}

impl From<ResolveIoError> for io::Error {
    fn from(err: ResolveIoError) -> Self {
        err.io
    }
}
