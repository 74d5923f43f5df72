//! Cached handle to one text file.
//!
//! Reads go through a coalescing window: the first `read()` stats the file
//! (and reads it when the mtime moved), every other `read()` inside the window
//! joins that same future. Writes update memory synchronously and are flushed
//! by a single background task that keeps rewriting until the flushed value
//! matches the in-memory one.

use crate::backend::{Encoding, TextFs};
use crate::config::TextFileOptions;
use crate::error::{Result, TextFileError};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, warn};

const EVENT_CAPACITY: usize = 64;

/// Notifications emitted by a handle.
#[derive(Clone, Debug)]
pub enum TextFileEvent {
    /// The flushed content is on disk and still matches memory.
    Complete { path: PathBuf },
    /// A read failed, or a flush could not be written.
    Error { path: PathBuf, error: TextFileError },
}

impl TextFileEvent {
    pub fn path(&self) -> &Path {
        match self {
            TextFileEvent::Complete { path } | TextFileEvent::Error { path, .. } => path,
        }
    }
}

type ReadFuture = Shared<BoxFuture<'static, Result<String>>>;

struct PendingRead {
    started: Instant,
    future: ReadFuture,
}

impl PendingRead {
    fn reusable(&self, window: Duration) -> bool {
        match self.future.peek() {
            // never start a second physical read while one is running
            None => true,
            Some(Err(_)) => false,
            Some(Ok(_)) => self.started.elapsed() < window,
        }
    }
}

struct State {
    content: String,
    updated_at: Option<SystemTime>,
    revision: u64,
    pending_read: Option<PendingRead>,
    writing: bool,
}

/// Shared, cached view of a single text file.
///
/// Handles are only built by [`crate::registry::Registry`], which guarantees
/// one handle per path.
pub struct TextFile {
    path: PathBuf,
    encoding: Encoding,
    cache_window: Duration,
    fs: Arc<dyn TextFs>,
    state: Mutex<State>,
    events: broadcast::Sender<TextFileEvent>,
}

impl fmt::Debug for TextFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextFile")
            .field("path", &self.path)
            .field("encoding", &self.encoding)
            .field("cache_window", &self.cache_window)
            .field("writing", &self.is_writing())
            .finish()
    }
}

impl TextFile {
    pub(crate) fn new(path: PathBuf, fs: Arc<dyn TextFs>, options: TextFileOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path,
            encoding: options.encoding,
            cache_window: options.cache_window,
            fs,
            state: Mutex::new(State {
                content: String::new(),
                updated_at: None,
                revision: 0,
                pending_read: None,
                writing: false,
            }),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TextFileEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn cache_window(&self) -> Duration {
        self.cache_window
    }

    /// Whether the file is currently present on disk.
    pub fn exists(&self) -> bool {
        self.fs.exists(&self.path)
    }

    /// Whether a flush is outstanding.
    pub fn is_writing(&self) -> bool {
        self.state().writing
    }

    /// The latest modification this handle has accounted for.
    pub fn updated_at(&self) -> Option<SystemTime> {
        self.state().updated_at
    }

    /// In-memory content, without touching the filesystem. `None` until the
    /// first successful `read()` or a `write()`; handles are built without
    /// loading the file.
    pub fn cached(&self) -> Option<String> {
        let state = self.state();
        state.updated_at.map(|_| state.content.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TextFileEvent> {
        self.events.subscribe()
    }

    /// Returns the file content, checking the disk at most once per cache
    /// window. Concurrent callers share one stat/read round trip.
    pub async fn read(self: &Arc<Self>) -> Result<String> {
        let future = {
            let mut state = self.state();
            let reusable = state
                .pending_read
                .as_ref()
                .filter(|p| p.reusable(self.cache_window))
                .map(|p| p.future.clone());
            match reusable {
                Some(future) => future,
                None => {
                    let future = Arc::clone(self).load().boxed().shared();
                    state.pending_read = Some(PendingRead {
                        started: Instant::now(),
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    async fn load(self: Arc<Self>) -> Result<String> {
        let result = self.check_and_load().await;
        if let Err(e) = &result {
            warn!("read of {} failed: {}", self.path.display(), e);
            self.emit(TextFileEvent::Error {
                path: self.path.clone(),
                error: e.clone(),
            });
        }
        result
    }

    async fn check_and_load(&self) -> Result<String> {
        let (observed, revision) = {
            let state = self.state();
            (state.updated_at, state.revision)
        };

        let meta = self
            .fs
            .stat(&self.path)
            .await
            .map_err(|e| TextFileError::stat(&self.path, e))?;
        if observed.is_some_and(|t| meta.modified <= t) {
            debug!("{} unchanged on disk, serving cache", self.path.display());
            return Ok(self.state().content.clone());
        }

        let text = self
            .fs
            .read_text(&self.path, self.encoding)
            .await
            .map_err(|e| TextFileError::read(&self.path, e))?;

        let mut state = self.state();
        if state.revision != revision {
            // a write() landed while reading; memory is newer than what we read
            return Ok(state.content.clone());
        }
        debug!("reloaded {} ({} bytes)", self.path.display(), meta.len);
        state.content.clone_from(&text);
        state.updated_at = Some(meta.modified);
        Ok(text)
    }

    /// Replaces the content. Memory is updated before this returns; the disk
    /// is updated in the background and the outcome is reported through
    /// [`TextFile::subscribe`]. Outside a tokio runtime nothing can be flushed
    /// and a `Write` error event is emitted instead.
    pub fn write(self: &Arc<Self>, content: impl Into<String>) {
        let target = {
            let mut state = self.state();
            state.content = content.into();
            state.updated_at = Some(SystemTime::now());
            state.revision += 1;
            if state
                .pending_read
                .as_ref()
                .is_some_and(|p| p.future.peek().is_some())
            {
                state.pending_read = None;
            }
            if state.writing {
                debug!("flush of {} in flight, coalescing write", self.path.display());
                return;
            }
            state.writing = true;
            state.content.clone()
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(Arc::clone(self).flush(target));
            }
            Err(e) => {
                let err = TextFileError::write(&self.path, io::Error::other(e));
                error!("{}", err);
                self.state().writing = false;
                self.emit(TextFileEvent::Error {
                    path: self.path.clone(),
                    error: err,
                });
            }
        }
    }

    async fn flush(self: Arc<Self>, mut target: String) {
        loop {
            if let Err(e) = self
                .fs
                .write_text(&self.path, &target, self.encoding)
                .await
            {
                let err = TextFileError::write(&self.path, e);
                error!("{}", err);
                self.state().writing = false;
                self.emit(TextFileEvent::Error {
                    path: self.path.clone(),
                    error: err,
                });
                return;
            }

            let modified = match self.fs.stat(&self.path).await {
                Ok(meta) => Some(meta.modified),
                Err(e) => {
                    warn!("stat after writing {} failed: {}", self.path.display(), e);
                    None
                }
            };

            {
                let mut state = self.state();
                if state.content != target {
                    debug!("{} changed during flush, rewriting", self.path.display());
                    target.clone_from(&state.content);
                    continue;
                }
                if let Some(modified) = modified {
                    state.updated_at = Some(modified);
                }
                state.writing = false;
            }

            debug!("flushed {}", self.path.display());
            self.emit(TextFileEvent::Complete {
                path: self.path.clone(),
            });
            return;
        }
    }
}
