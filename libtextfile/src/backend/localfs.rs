//! Local filesystem backend.

use super::{Encoding, FileMeta, TextFs};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs;

#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextFs for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_empty(&self, path: &Path, _encoding: Encoding) -> io::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(_) => Ok(()),
            // lost a race with another creator; the file is there either way
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path).await?;
        Ok(FileMeta {
            modified: meta.modified()?,
            len: meta.len(),
        })
    }

    async fn read_text(&self, path: &Path, encoding: Encoding) -> io::Result<String> {
        let buf = fs::read(path).await?;
        encoding.decode(buf)
    }

    async fn write_text(&self, path: &Path, text: &str, encoding: Encoding) -> io::Result<()> {
        fs::write(path, encoding.encode(text)).await
    }
}
