use libtextfile::{MemFs, Registry, TextFileError, TextFileEvent, TextFileOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::timeout;

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<TextFileEvent>) -> TextFileEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within timeout")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_e2e_local_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    std::fs::write(&path, "").unwrap();

    let registry = Registry::local(TextFileOptions::default());
    let file = registry.get(&path, false).unwrap();
    assert_eq!(file.read().await.unwrap(), "");

    let mut rx = file.subscribe();
    file.write("hello");
    match next_event(&mut rx).await {
        TextFileEvent::Complete { path: p } => assert_eq!(p, path),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(file.read().await.unwrap(), "hello");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
}

#[tokio::test]
async fn test_local_missing_file_and_auto_create() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sub/new.txt");
    let registry = Registry::local(TextFileOptions::default());

    let err = registry.get(&path, false).unwrap_err();
    assert!(matches!(err, TextFileError::NotFound { .. }));
    assert!(!path.exists());

    let file = registry.get(&path, true).unwrap();
    assert!(path.exists());
    assert_eq!(file.read().await.unwrap(), "");
    assert!(Arc::ptr_eq(&file, &registry.get(&path, false).unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_two_writes_one_completion() {
    let fs = Arc::new(MemFs::new());
    fs.put("/doc.txt", "");
    fs.set_write_delay(Duration::from_millis(20));
    let registry = Registry::new(fs.clone());
    let file = registry.get("/doc.txt", false).unwrap();
    let mut rx = file.subscribe();

    file.write("a");
    file.write("b");
    assert!(matches!(next_event(&mut rx).await, TextFileEvent::Complete { .. }));
    assert_eq!(fs.get("/doc.txt").as_deref(), Some("b"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert!(!file.is_writing());
}

#[tokio::test(start_paused = true)]
async fn test_handles_share_state_across_callers() {
    let fs = Arc::new(MemFs::new());
    fs.put("/shared.txt", "v1");
    let registry = Arc::new(Registry::new(fs.clone()));

    let writer = registry.get("/shared.txt", false).unwrap();
    writer.write("v2");

    let reader = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let file = registry.get("/shared.txt", false).unwrap();
            file.read().await.unwrap()
        })
    };
    assert_eq!(reader.await.unwrap(), "v2");
}

#[tokio::test(start_paused = true)]
async fn test_external_change_visible_after_window() {
    let fs = Arc::new(MemFs::new());
    fs.put("/ext.txt", "mine");
    let options = TextFileOptions::default().with_cache_window(Duration::from_millis(100));
    let registry = Registry::with_options(fs.clone(), options);
    let file = registry.get("/ext.txt", false).unwrap();

    assert_eq!(file.read().await.unwrap(), "mine");
    fs.put("/ext.txt", "theirs");
    assert_eq!(file.read().await.unwrap(), "mine");

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(file.read().await.unwrap(), "theirs");
    assert_eq!(file.cached().as_deref(), Some("theirs"));
}

#[tokio::test(start_paused = true)]
async fn test_write_error_event_then_recovery() {
    let fs = Arc::new(MemFs::new());
    fs.put("/ro.txt", "orig");
    fs.fail_next_writes(1);
    let registry = Registry::new(fs.clone());
    let file = registry.get("/ro.txt", false).unwrap();
    let mut rx = file.subscribe();

    file.write("lost");
    match next_event(&mut rx).await {
        TextFileEvent::Error { error, .. } => {
            assert!(matches!(error, TextFileError::Write { .. }));
            assert_eq!(error.io_kind(), Some(std::io::ErrorKind::PermissionDenied));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(file.read().await.unwrap(), "lost");

    file.write("kept");
    assert!(matches!(next_event(&mut rx).await, TextFileEvent::Complete { .. }));
    assert_eq!(fs.get("/ro.txt").as_deref(), Some("kept"));
}
