use crate::backend::{LocalFs, TextFs};
use crate::config::TextFileOptions;
use crate::error::{Result, TextFileError};
use crate::file::TextFile;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Hands out exactly one [`TextFile`] per path.
///
/// Paths are used as given, without canonicalization: `a.txt`, `./a.txt`
/// and `.//a.txt` get three different handles. Keys are the raw `OsString`
/// because `PathBuf` equality compares normalized components.
pub struct Registry {
    fs: Arc<dyn TextFs>,
    options: TextFileOptions,
    handles: Mutex<HashMap<OsString, Arc<TextFile>>>,
}

fn key(path: &Path) -> OsString {
    path.as_os_str().to_owned()
}

impl Registry {
    pub fn new(fs: Arc<dyn TextFs>) -> Self {
        Self::with_options(fs, TextFileOptions::default())
    }

    pub fn with_options(fs: Arc<dyn TextFs>, options: TextFileOptions) -> Self {
        Self {
            fs,
            options,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Registry over the local filesystem.
    pub fn local(options: TextFileOptions) -> Self {
        Self::with_options(Arc::new(LocalFs::new()), options)
    }

    pub fn options(&self) -> TextFileOptions {
        self.options
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<OsString, Arc<TextFile>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the handle for `path`, building it on first use.
    ///
    /// Fails with [`TextFileError::NotFound`] when the file is missing and
    /// `create_if_missing` is false; otherwise a missing file is created empty.
    pub fn get(&self, path: impl AsRef<Path>, create_if_missing: bool) -> Result<Arc<TextFile>> {
        self.get_with_options(path, create_if_missing, self.options)
    }

    /// Like [`Registry::get`], with `options` applied if the handle is new.
    pub fn get_with_options(
        &self,
        path: impl AsRef<Path>,
        create_if_missing: bool,
        options: TextFileOptions,
    ) -> Result<Arc<TextFile>> {
        let path = path.as_ref();
        let mut handles = self.handles();
        if let Some(file) = handles.get(path.as_os_str()) {
            return Ok(Arc::clone(file));
        }

        if !self.fs.exists(path) {
            if !create_if_missing {
                return Err(TextFileError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            self.fs
                .create_empty(path, options.encoding)
                .map_err(|e| TextFileError::create(path, e))?;
            info!("created empty file {}", path.display());
        }

        let file = Arc::new(TextFile::new(
            path.to_path_buf(),
            Arc::clone(&self.fs),
            options,
        ));
        handles.insert(key(path), Arc::clone(&file));
        debug!("registered handle for {}", path.display());
        Ok(file)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.handles().contains_key(path.as_ref().as_os_str())
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.handles().keys().map(PathBuf::from).collect();
        paths.sort();
        paths
    }

    /// Drops the registry's handle for `path`. Refuses while a flush is in
    /// flight or while anyone else still holds the handle, so a path never has
    /// two live handles; returns whether a handle was removed.
    pub fn release(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut handles = self.handles();
        match handles.get(path.as_os_str()) {
            Some(file) if file.is_writing() => {
                debug!("not releasing {}: flush in flight", path.display());
                false
            }
            Some(file) if Arc::strong_count(file) > 1 => {
                debug!("not releasing {}: handle still in use", path.display());
                false
            }
            Some(_) => {
                handles.remove(path.as_os_str());
                debug!("released handle for {}", path.display());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Encoding, MemFs};
    use crate::file::TextFileEvent;
    use std::time::Duration;

    #[test]
    fn test_same_path_same_handle() {
        let fs = Arc::new(MemFs::new());
        fs.put("/a.txt", "x");
        let registry = Registry::new(fs.clone());

        let a = registry.get("/a.txt", false).unwrap();
        let b = registry.get("/a.txt", false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        // paths are not canonicalized
        let c = registry.get("/./a.txt", false).unwrap();
        let d = registry.get("//a.txt", false).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(!Arc::ptr_eq(&a, &d));
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("//a.txt"));
        assert!(!registry.contains("/././a.txt"));
        assert!(!registry.release("/./a.txt"));
        drop(c);
        assert!(registry.release("/./a.txt"));
        assert!(registry.contains("/a.txt"));
        assert!(registry.contains("//a.txt"));
    }

    #[test]
    fn test_missing_file() {
        let fs = Arc::new(MemFs::new());
        let registry = Registry::new(fs.clone());

        let err = registry.get("/missing.txt", false).unwrap_err();
        assert!(matches!(err, TextFileError::NotFound { .. }));
        assert!(registry.is_empty());
        assert!(!fs.exists(Path::new("/missing.txt")));

        let file = registry.get("/missing.txt", true).unwrap();
        assert!(file.exists());
        assert_eq!(fs.get("/missing.txt").as_deref(), Some(""));
        assert!(registry.contains("/missing.txt"));
    }

    #[tokio::test]
    async fn test_created_file_reads_empty() {
        let fs = Arc::new(MemFs::new());
        let registry = Registry::new(fs.clone());
        let file = registry.get("/new.txt", true).unwrap();
        assert_eq!(file.read().await.unwrap(), "");
    }

    #[test]
    fn test_options_apply_to_new_handles_only() {
        let fs = Arc::new(MemFs::new());
        fs.put("/a.txt", "");
        let options = TextFileOptions::default().with_cache_window(Duration::from_millis(10));
        let registry = Registry::with_options(fs, options);

        let a = registry.get("/a.txt", false).unwrap();
        assert_eq!(a.cache_window(), Duration::from_millis(10));

        let lossy = TextFileOptions::default().with_encoding(Encoding::Utf8Lossy);
        let again = registry.get_with_options("/a.txt", false, lossy).unwrap();
        assert_eq!(again.encoding(), Encoding::Utf8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_waits_for_flush() {
        let fs = Arc::new(MemFs::new());
        fs.put("/a.txt", "");
        fs.set_write_delay(Duration::from_millis(50));
        let registry = Registry::new(fs.clone());

        let file = registry.get("/a.txt", false).unwrap();
        let mut rx = file.subscribe();
        file.write("pending");
        assert!(!registry.release("/a.txt"));

        assert!(matches!(
            rx.recv().await.unwrap(),
            TextFileEvent::Complete { .. }
        ));
        // still held by `file`
        assert!(!registry.release("/a.txt"));
        assert!(Arc::ptr_eq(&file, &registry.get("/a.txt", false).unwrap()));

        drop(file);
        assert!(registry.release("/a.txt"));
        assert!(!registry.release("/a.txt"));

        let fresh = registry.get("/a.txt", false).unwrap();
        assert_eq!(fresh.read().await.unwrap(), "pending");
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_keeps_shared_handle_consistent() {
        let fs = Arc::new(MemFs::new());
        fs.put("/shared.txt", "old");
        let registry = Registry::new(fs.clone());

        let held = registry.get("/shared.txt", false).unwrap();
        assert_eq!(held.read().await.unwrap(), "old");
        assert!(!registry.release("/shared.txt"));

        let other = registry.get("/shared.txt", false).unwrap();
        assert!(Arc::ptr_eq(&held, &other));
        held.write("new");
        assert_eq!(other.read().await.unwrap(), "new");
    }
}
