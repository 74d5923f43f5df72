//! Shared, cached handles to text files.
//!
//! A [`Registry`] hands out one [`TextFile`] per path. Reads are coalesced
//! inside a short cache window and only hit the disk when the file's mtime
//! moved; writes land in memory immediately and are flushed in the background,
//! collapsing writes that arrive while a flush is running.

pub mod backend;
pub mod config;
pub mod demo;
pub mod error;
pub mod file;
pub mod registry;

pub use backend::{Encoding, FileMeta, LocalFs, MemFs, TextFs};
pub use config::TextFileOptions;
pub use error::{Result, TextFileError};
pub use file::{TextFile, TextFileEvent};
pub use registry::Registry;
