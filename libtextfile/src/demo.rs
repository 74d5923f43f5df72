//! End-to-end walkthrough over the local filesystem: write, coalesced writes,
//! a stale read inside the cache window and a refresh once it expires.

use crate::config::TextFileOptions;
use crate::file::TextFileEvent;
use crate::registry::Registry;
use anyhow::{Context, anyhow, ensure};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tracing::info;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Waits for the next completion of `rx`, turning an error event into `Err`.
pub async fn wait_flushed(rx: &mut broadcast::Receiver<TextFileEvent>) -> anyhow::Result<()> {
    let event = timeout(FLUSH_TIMEOUT, rx.recv())
        .await
        .context("timed out waiting for flush")?
        .context("event channel closed")?;
    match event {
        TextFileEvent::Complete { .. } => Ok(()),
        TextFileEvent::Error { error, .. } => Err(anyhow!(error)),
    }
}

pub async fn e2e_localfs_demo<P: AsRef<Path>>(dir: P) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("demo.txt");
    let window = Duration::from_millis(200);
    let registry = Registry::local(TextFileOptions::default().with_cache_window(window));

    // 1) write through a handle and read it back
    let file = registry.get(&path, true)?;
    let mut rx = file.subscribe();
    file.write("hello");
    wait_flushed(&mut rx).await?;
    ensure!(file.read().await? == "hello", "read after flush mismatch");
    ensure!(tokio::fs::read_to_string(&path).await? == "hello", "disk mismatch");
    info!("step 1: write + read ok");

    // 2) back-to-back writes collapse into the last value
    file.write("a");
    file.write("b");
    file.write("c");
    ensure!(file.read().await? == "c", "read-your-write mismatch");
    wait_flushed(&mut rx).await?;
    ensure!(tokio::fs::read_to_string(&path).await? == "c", "coalesced flush mismatch");
    info!("step 2: coalesced writes ok");

    // 3) an external change is hidden until the window expires
    sleep(window).await;
    ensure!(file.read().await? == "c", "cached read mismatch");
    sleep(Duration::from_millis(50)).await;
    tokio::fs::write(&path, "external").await?;
    ensure!(file.read().await? == "c", "read inside the window should be cached");
    sleep(window + Duration::from_millis(50)).await;
    ensure!(
        file.read().await? == "external",
        "read after the window should see the external change"
    );
    info!("step 3: cache window ok");

    // 4) the registry keeps handing out the same handle
    let again = registry.get(&path, false)?;
    ensure!(std::sync::Arc::ptr_eq(&file, &again), "registry returned a new handle");
    Ok(())
}
