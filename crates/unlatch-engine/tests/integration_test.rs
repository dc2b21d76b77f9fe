//! End-to-end tests: snapshot pages driven through the engine facade.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use unlatch_config::Config;
use unlatch_dom::{DomTree, Page, PageActivity, PageSnapshot};
use unlatch_engine::{
    Attachment, Engine, EngineHandle, EngineStatus, ExclusionFilter, KeyValueStore, MemoryStore,
    SharedPage, StopReason,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn page(snapshot: serde_json::Value) -> SharedPage<DomTree> {
    let snapshot = PageSnapshot::from_json(&snapshot.to_string()).unwrap();
    Arc::new(parking_lot::Mutex::new(DomTree::from_snapshot(&snapshot)))
}

fn engine(store: Arc<MemoryStore>) -> Engine {
    let config = Config::default();
    let exclusions = ExclusionFilter::from_patterns(&config.exclusion.patterns);
    Engine::new(config, store, exclusions)
}

async fn run_to_stop(handle: &EngineHandle) -> EngineStatus {
    tokio::time::timeout(Duration::from_secs(120), handle.wait_for_stop())
        .await
        .expect("engine did not stop")
        .unwrap()
}

fn submissions(tree: &DomTree) -> usize {
    tree.activity()
        .iter()
        .filter(|a| matches!(a, PageActivity::Submitted(_)))
        .count()
}

/// A three-step shortener: verify, then continue, then the token form.
fn three_step_gate(url: &str) -> serde_json::Value {
    json!({
        "url": url,
        "root": {
            "tag": "html",
            "children": [{
                "tag": "body",
                "style": {"overflow": "hidden"},
                "children": [
                    {"tag": "nav", "children": [
                        {"tag": "a", "attributes": {"href": "/next-post"}, "text": "Next"}
                    ]},
                    {"tag": "div", "attributes": {"id": "wpsafe-generate"}, "children": [
                        {"tag": "span", "text": "Please wait 10 seconds"},
                        {"tag": "button", "attributes": {"id": "verify"}, "text": "Click to Verify",
                         "on_activate": [
                            {"type": "reveal", "selector": "#step2"}
                         ]},
                        {"tag": "button", "attributes": {"id": "step2", "hidden": ""}, "text": "Continue",
                         "on_activate": [
                            {"type": "insert", "parent": "body", "node": {
                                "tag": "form",
                                "attributes": {"id": "wpsafelink-landing", "method": "post", "action": "/go"},
                                "children": [
                                    {"tag": "input", "attributes": {"type": "hidden", "name": "token", "value": "t0k"}},
                                    {"tag": "button", "attributes": {"type": "submit"}, "text": "Get Link"}
                                ]
                            }}
                         ]}
                    ]},
                    {"tag": "div", "attributes": {"class": "modal-backdrop"}, "style": {"z-index": "9999"}}
                ]
            }]
        }
    })
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_three_step_gate_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let page = page(three_step_gate("https://short.test/abc"));
    let attachment = engine(store.clone()).attach(Arc::clone(&page));
    let handle = attachment.into_handle().unwrap();

    let status = run_to_stop(&handle).await;
    assert_eq!(status.state.stop_reason(), Some(StopReason::TerminalSubmit));
    assert_eq!(status.state.action_count(), 3);

    let tree = page.lock();
    let verify = tree.find_by_id("verify").unwrap();
    let step2 = tree.find_by_id("step2").unwrap();
    let form = tree.find_by_id("wpsafelink-landing").unwrap();
    assert_eq!(tree.activation_count(verify), 1);
    assert_eq!(tree.activation_count(step2), 1);
    assert_eq!(submissions(&tree), 1);
    assert!(tree.was_submitted(form));
    assert!(tree.activity().contains(&PageActivity::Navigated("/go".to_string())));
    assert!(tree.activity().contains(&PageActivity::ScrollUnlocked));

    // The landmark link was never touched.
    let nav_link = tree
        .elements()
        .into_iter()
        .find(|id| tree.element(*id).is_some_and(|e| e.attr("href") == Some("/next-post")))
        .unwrap();
    assert!(!tree.was_activated(nav_link));

    let ledger = store.get("loop_ledger:short.test").unwrap().unwrap();
    let ledger: Vec<i64> = serde_json::from_str(&ledger).unwrap();
    assert_eq!(ledger.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_excluded_host_is_inert() {
    let store = Arc::new(MemoryStore::new());
    let page = page(three_step_gate("https://www.youtube.com/watch?v=1"));

    let attachment = engine(store.clone()).attach(Arc::clone(&page));
    match &attachment {
        Attachment::Inert { host, pattern } => {
            assert_eq!(host, "www.youtube.com");
            assert_eq!(pattern, "youtube.com");
        }
        Attachment::Running(_) => panic!("excluded host must not run"),
    }

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(page.lock().activity().is_empty());
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_comment_form_is_never_submitted() {
    let store = Arc::new(MemoryStore::new());
    let page = page(json!({
        "url": "https://blog.test/post",
        "root": {"tag": "html", "children": [{"tag": "body", "children": [
            {"tag": "div", "attributes": {"class": "countdown-widget"}, "text": "Sale ends in 5 seconds"},
            {"tag": "button", "attributes": {"disabled": ""}, "text": "Sold out"},
            {"tag": "form",
             "attributes": {"id": "commentform", "method": "post", "action": "https://blog.test/wp-comments-post.php"},
             "children": [
                {"tag": "input", "attributes": {"type": "hidden", "name": "comment_post_ID", "value": "7"}},
                {"tag": "textarea", "attributes": {"name": "comment"}},
                {"tag": "input", "attributes": {"type": "submit", "value": "Post Comment"}}
             ]}
        ]}]}
    }));

    let handle = engine(store).attach(Arc::clone(&page)).into_handle().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let status = handle.status();
    assert!(status.last_detection.as_ref().is_some_and(|d| d.gated));
    assert_eq!(submissions(&page.lock()), 0);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_helper_together_submits_first() {
    let store = Arc::new(MemoryStore::new());
    let page = page(json!({
        "url": "https://short.test/x",
        "root": {"tag": "body", "children": [
            {"tag": "p", "text": "Wait 3 seconds"},
            {"tag": "a", "attributes": {"id": "helper", "href": "#"}, "text": "Continue"},
            {"tag": "form", "attributes": {"id": "go-link", "method": "post"}, "children": [
                {"tag": "input", "attributes": {"type": "hidden", "name": "alias", "value": "x"}}
            ]}
        ]}
    }));

    let handle = engine(store).attach(Arc::clone(&page)).into_handle().unwrap();
    let status = run_to_stop(&handle).await;

    assert_eq!(status.state.stop_reason(), Some(StopReason::TerminalSubmit));
    assert_eq!(status.state.action_count(), 1);
    let tree = page.lock();
    let helper = tree.find_by_id("helper").unwrap();
    assert!(!tree.was_activated(helper));

    drop(tree);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!page.lock().was_activated(helper));
}

#[tokio::test(start_paused = true)]
async fn test_ordinary_page_is_left_alone() {
    let store = Arc::new(MemoryStore::new());
    let page = page(json!({
        "url": "https://news.test/story",
        "root": {"tag": "html", "children": [{"tag": "body", "children": [
            {"tag": "header", "children": [{"tag": "a", "attributes": {"href": "/"}, "text": "Home"}]},
            {"tag": "article", "text": "Markets rallied on Tuesday after a 5 day slide."},
            {"tag": "a", "attributes": {"href": "/page/2"}, "text": "Next page"},
            {"tag": "form", "attributes": {"method": "get", "action": "/search"}, "children": [
                {"tag": "input", "attributes": {"type": "text", "name": "q"}}
            ]}
        ]}]}
    }));

    let handle = engine(store.clone()).attach(Arc::clone(&page)).into_handle().unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = handle.status();
    assert!(!status.state.is_stopped());
    assert_eq!(status.state.action_count(), 0);
    assert!(status.last_detection.is_some_and(|d| !d.gated && d.score == 0));
    let tree = page.lock();
    assert!(!tree
        .activity()
        .iter()
        .any(|a| matches!(a, PageActivity::Activated(_) | PageActivity::Submitted(_))));
    assert!(store.is_empty());
}
