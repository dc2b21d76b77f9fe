//! Page subcommand handlers: drive the engine against a JSON page snapshot.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use unlatch_config::Config;
use unlatch_dom::{DomTree, Page, PageSnapshot};
use unlatch_engine::{Attachment, Engine, FileStore, KeyValueStore, MemoryStore};

/// Run the engine on a snapshot until it stops or the timeout elapses.
///
/// The storage directory is one session shared by every run that points at
/// it; `new_session` empties it first.
pub(crate) async fn handle_run_command(
    config: Config,
    page: &Path,
    host: Option<&str>,
    timeout_secs: u64,
    new_session: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let tree = load_page(page, host)?;

    let store: Arc<dyn KeyValueStore> = Arc::new(open_store(Path::new(&config.storage.path), new_session)?);
    let engine = Engine::from_config(config, store).await;

    let page = Arc::new(parking_lot::Mutex::new(tree));
    let handle = match engine.attach(Arc::clone(&page)) {
        Attachment::Inert { host, pattern } => {
            println!("{} is excluded by '{}', engine not started", host, pattern);
            return Ok(());
        }
        Attachment::Running(handle) => handle,
    };

    let timeout = Duration::from_secs(timeout_secs);
    let status = match tokio::time::timeout(timeout, handle.wait_for_stop()).await {
        Ok(status) => status?,
        Err(_) => {
            info!(host = %handle.host(), timeout_secs = timeout_secs, "Engine still running at timeout");
            handle.status()
        }
    };
    let metrics = handle.metrics().snapshot();
    handle.shutdown().await;

    println!("Status:");
    println!("{}", serde_json::to_string_pretty(&status)?);
    println!();
    println!("Metrics:");
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    println!();
    println!("Page activity:");
    let tree = page.lock();
    if tree.activity().is_empty() {
        println!("  (none)");
    }
    for activity in tree.activity() {
        println!("  {}", serde_json::to_string(activity)?);
    }

    Ok(())
}

/// One detection pass with a fresh state; nothing is acted on or stored.
pub(crate) async fn handle_detect_command(
    config: Config,
    page: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let tree = load_page(page, None)?;
    let engine = Engine::from_config(config, Arc::new(MemoryStore::new())).await;

    match engine.detect_once(&tree) {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("{} is excluded, nothing to detect", tree.hostname()),
    }
    Ok(())
}

fn open_store(dir: &Path, new_session: bool) -> Result<FileStore, Box<dyn std::error::Error>> {
    let store = FileStore::open(dir)?;
    if new_session {
        let removed = store.clear()?;
        info!(dir = %dir.display(), removed = removed, "Started new session");
    }
    Ok(store)
}

fn load_page(path: &Path, host: Option<&str>) -> Result<DomTree, Box<dyn std::error::Error>> {
    let mut snapshot = PageSnapshot::load(path)?;
    if let Some(host) = host {
        snapshot.url = with_host(&snapshot.url, host);
    }
    info!(path = %path.display(), url = %snapshot.url, "Snapshot loaded");
    Ok(DomTree::from_snapshot(&snapshot))
}

/// Replace the host of `url`, keeping path and query.
fn with_host(url: &str, host: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(url) {
        if parsed.set_host(Some(host)).is_ok() {
            return parsed.to_string();
        }
    }
    format!("https://{}/", host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_with_host_keeps_path() {
        assert_eq!(
            with_host("https://short.test/abc?x=1", "other.test"),
            "https://other.test/abc?x=1"
        );
    }

    #[test]
    fn test_with_host_unparsable_url() {
        assert_eq!(with_host("not a url", "other.test"), "https://other.test/");
    }

    #[test]
    fn test_load_page_with_host_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"url": "https://short.test/abc", "root": {{"tag": "body"}}}}"#
        )
        .unwrap();

        let tree = load_page(file.path(), Some("www.youtube.com")).unwrap();
        assert_eq!(tree.hostname(), "www.youtube.com");
    }

    #[test]
    fn test_open_store_new_session_forgets_ledger() {
        let dir = tempfile::tempdir().unwrap();
        open_store(dir.path(), false).unwrap().set("loop_ledger:a.test", "[1]").unwrap();

        let kept = open_store(dir.path(), false).unwrap();
        assert!(kept.get("loop_ledger:a.test").unwrap().is_some());

        let fresh = open_store(dir.path(), true).unwrap();
        assert!(fresh.get("loop_ledger:a.test").unwrap().is_none());
    }

    #[test]
    fn test_load_page_missing_file() {
        assert!(load_page(Path::new("/nonexistent/page.json"), None).is_err());
    }
}
