//! Filesystem backends used by cached text file handles.
//!
//! Submodules:
//! - `localfs`: the real filesystem, through `tokio::fs`
//! - `memfs`: an in-memory filesystem for tests and demos, with latency and
//!   failure injection
//!
//! The handle only ever talks to a backend through [`TextFs`], so stat/read/
//! write primitives and byte-to-text decoding stay out of the caching logic.
pub mod localfs;
pub mod memfs;

pub use localfs::LocalFs;
pub use memfs::MemFs;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

/// Text decoding scheme applied to file contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// Strict UTF-8; invalid sequences fail the read with `InvalidData`.
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    #[serde(rename = "utf-8-lossy")]
    Utf8Lossy,
}

impl Encoding {
    pub fn decode(self, bytes: Vec<u8>) -> io::Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Encoding::Utf8Lossy => Ok(match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }),
        }
    }

    pub fn encode(self, text: &str) -> &[u8] {
        // both variants write plain UTF-8
        text.as_bytes()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Lossy => "utf-8-lossy",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-8-lossy" | "utf8-lossy" | "lossy" => Ok(Encoding::Utf8Lossy),
            other => Err(format!("unsupported encoding `{other}`")),
        }
    }
}

/// The subset of file metadata the cache relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileMeta {
    pub modified: SystemTime,
    pub len: u64,
}

/// Filesystem primitives consumed by [`crate::file::TextFile`].
///
/// `exists` and `create_empty` are synchronous: the registry calls them while
/// holding its lock so that a path can never get two handles.
#[async_trait]
pub trait TextFs: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn create_empty(&self, path: &Path, encoding: Encoding) -> io::Result<()>;

    async fn stat(&self, path: &Path) -> io::Result<FileMeta>;

    async fn read_text(&self, path: &Path, encoding: Encoding) -> io::Result<String>;

    async fn write_text(&self, path: &Path, text: &str, encoding: Encoding) -> io::Result<()>;
}
