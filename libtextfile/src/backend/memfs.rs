//! In-memory backend: for local development and tests.
//!
//! Besides storing files it counts every stat/read/write call and can delay
//! or fail operations, which is what coalescing behaviour is tested against.

use super::{Encoding, FileMeta, TextFs};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

struct MemFile {
    data: Vec<u8>,
    modified: SystemTime,
}

#[derive(Default)]
struct Inner {
    files: HashMap<PathBuf, MemFile>,
    // mtimes handed out so far never go backwards
    last_mtime: Option<SystemTime>,
    stat_delay: Duration,
    read_delay: Duration,
    write_delay: Duration,
    failing_writes: usize,
}

#[derive(Default)]
pub struct MemFs {
    inner: Mutex<Inner>,
    stats: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_mtime(inner: &mut Inner) -> SystemTime {
        let now = SystemTime::now();
        let mtime = match inner.last_mtime {
            Some(last) if now <= last => last + Duration::from_micros(1),
            _ => now,
        };
        inner.last_mtime = Some(mtime);
        mtime
    }

    /// Stores `text` at `path` as if another process had written it.
    pub fn put(&self, path: impl AsRef<Path>, text: &str) {
        let mut inner = self.lock();
        let modified = Self::next_mtime(&mut inner);
        inner.files.insert(
            path.as_ref().to_path_buf(),
            MemFile {
                data: text.as_bytes().to_vec(),
                modified,
            },
        );
    }

    /// Stores raw bytes, e.g. to exercise decoding failures.
    pub fn put_bytes(&self, path: impl AsRef<Path>, data: Vec<u8>) {
        let mut inner = self.lock();
        let modified = Self::next_mtime(&mut inner);
        inner
            .files
            .insert(path.as_ref().to_path_buf(), MemFile { data, modified });
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock()
            .files
            .get(path.as_ref())
            .map(|f| String::from_utf8_lossy(&f.data).into_owned())
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.lock().files.remove(path.as_ref()).is_some()
    }

    pub fn set_stat_delay(&self, delay: Duration) {
        self.lock().stat_delay = delay;
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.lock().read_delay = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    /// Makes the next `n` writes fail with `PermissionDenied`.
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().failing_writes = n;
    }

    pub fn stat_count(&self) -> usize {
        self.stats.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

#[async_trait]
impl TextFs for MemFs {
    fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn create_empty(&self, path: &Path, _encoding: Encoding) -> io::Result<()> {
        let mut inner = self.lock();
        if !inner.files.contains_key(path) {
            let modified = Self::next_mtime(&mut inner);
            inner.files.insert(
                path.to_path_buf(),
                MemFile {
                    data: Vec::new(),
                    modified,
                },
            );
        }
        Ok(())
    }

    async fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().stat_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let inner = self.lock();
        let file = inner.files.get(path).ok_or_else(|| not_found(path))?;
        Ok(FileMeta {
            modified: file.modified,
            len: file.data.len() as u64,
        })
    }

    async fn read_text(&self, path: &Path, encoding: Encoding) -> io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let data = {
            let inner = self.lock();
            let file = inner.files.get(path).ok_or_else(|| not_found(path))?;
            file.data.clone()
        };
        encoding.decode(data)
    }

    async fn write_text(&self, path: &Path, text: &str, encoding: Encoding) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let delay = self.lock().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut inner = self.lock();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("write to {} rejected", path.display()),
            ));
        }
        let modified = Self::next_mtime(&mut inner);
        inner.files.insert(
            path.to_path_buf(),
            MemFile {
                data: encoding.encode(text).to_vec(),
                modified,
            },
        );
        Ok(())
    }
}
