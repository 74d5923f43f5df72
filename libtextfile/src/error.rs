use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub type Result<T, E = TextFileError> = std::result::Result<T, E>;

/// Errors raised by the registry and by cached text file handles.
///
/// The type is `Clone` because one failed read is shared by every caller
/// that joined the same coalesced read; io errors are kept behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum TextFileError {
    #[error("{} not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to create {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

impl TextFileError {
    pub(crate) fn create(path: &Path, e: io::Error) -> Self {
        Self::Create {
            path: path.to_path_buf(),
            source: Arc::new(e),
        }
    }

    pub(crate) fn stat(path: &Path, e: io::Error) -> Self {
        Self::Stat {
            path: path.to_path_buf(),
            source: Arc::new(e),
        }
    }

    pub(crate) fn read(path: &Path, e: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source: Arc::new(e),
        }
    }

    pub(crate) fn write(path: &Path, e: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source: Arc::new(e),
        }
    }

    /// Path of the file the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::Create { path, .. }
            | Self::Stat { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. } => path,
        }
    }

    /// Kind of the underlying io error, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::NotFound { .. } => Some(io::ErrorKind::NotFound),
            Self::Create { source, .. }
            | Self::Stat { source, .. }
            | Self::Read { source, .. }
            | Self::Write { source, .. } => Some(source.kind()),
        }
    }
}
