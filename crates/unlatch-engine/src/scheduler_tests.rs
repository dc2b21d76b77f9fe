use super::*;
use std::sync::atomic::Ordering;

use chrono::Utc;
use unlatch_dom::{Behavior, DomTree, ElementNode, PageActivity, ScrollTarget, SnapshotNode};

use crate::loop_guard::LoopGuard;
use crate::state::StopReason;
use crate::store::{write_flag, MemoryStore, ENABLED_KEY};

const WAIT: Duration = Duration::from_secs(60);

fn shared(tree: DomTree) -> SharedPage<DomTree> {
    Arc::new(parking_lot::Mutex::new(tree))
}

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

fn start(page: &SharedPage<DomTree>, config: Config, store: Arc<MemoryStore>) -> EngineHandle {
    Scheduler::spawn(Arc::clone(page), "short.test", config, store)
}

async fn stopped(handle: &EngineHandle) -> EngineStatus {
    tokio::time::timeout(WAIT, handle.wait_for_stop())
        .await
        .expect("engine did not stop")
        .unwrap()
}

/// Countdown text so the page scores as gated.
fn countdown(tree: &mut DomTree) {
    let body = tree.body();
    tree.append(body, ElementNode::new("div").with_text("Please wait 5 seconds"))
        .unwrap();
}

fn gate_form_node() -> SnapshotNode {
    let mut form = SnapshotNode::new("form");
    form.attributes.insert("id".into(), "wpsafelink-landing".into());
    form.attributes.insert("method".into(), "post".into());
    let mut token = SnapshotNode::new("input");
    token.attributes.insert("type".into(), "hidden".into());
    token.attributes.insert("name".into(), "token".into());
    form.children.push(token);
    form
}

#[tokio::test(start_paused = true)]
async fn test_terminal_submit_stops_in_first_tick() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let form = tree.append_snapshot(body, &gate_form_node()).unwrap();
    let helper = tree
        .append(body, ElementNode::new("button").with_text("Continue"))
        .unwrap();
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    let status = stopped(&handle).await;

    assert_eq!(status.state.stop_reason(), Some(StopReason::TerminalSubmit));
    assert_eq!(status.state.action_count(), 1);
    assert!(page.lock().was_submitted(form));
    assert!(!page.lock().was_activated(helper));
    assert_eq!(handle.metrics().ticks.load(Ordering::Relaxed), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_helper_click_reveals_final_form() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let helper = tree
        .append(body, ElementNode::new("button").with_text("Click to Verify"))
        .unwrap();
    tree.on_activate(
        helper,
        Behavior::Insert {
            parent: "body".to_string(),
            node: gate_form_node(),
        },
    );
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    let status = stopped(&handle).await;

    assert_eq!(status.state.stop_reason(), Some(StopReason::TerminalSubmit));
    assert_eq!(status.state.action_count(), 2);
    let tree = page.lock();
    assert_eq!(tree.activation_count(helper), 1);
    let form = tree.find_by_id("wpsafelink-landing").unwrap();
    assert!(tree.was_submitted(form));
}

#[tokio::test(start_paused = true)]
async fn test_oscillating_page_hits_action_budget() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let steps = tree
        .append(body, ElementNode::new("div").with_id("steps"))
        .unwrap();
    // Each click inserts a fresh "Next" button, several levels deep.
    let mut button = SnapshotNode::new("button");
    button.text = "Next".to_string();
    for _ in 0..6 {
        let mut outer = SnapshotNode::new("button");
        outer.text = "Next".to_string();
        outer.on_activate.push(Behavior::Insert {
            parent: "#steps".to_string(),
            node: button,
        });
        button = outer;
    }
    tree.append_snapshot(steps, &button).unwrap();
    let page = shared(tree);

    let mut config = Config::default();
    config.engine.max_actions = 3;
    config.loop_guard.enabled = false;
    let handle = start(&page, config, store());
    let status = stopped(&handle).await;

    assert_eq!(status.state.stop_reason(), Some(StopReason::MaxActions));
    assert_eq!(status.state.action_count(), 3);

    // Nothing runs after the stop.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(handle.status().state.action_count(), 3);
    assert_eq!(handle.metrics().actions.load(Ordering::Relaxed), 3);
}

#[tokio::test(start_paused = true)]
async fn test_loop_guard_stops_engine() {
    let mut tree = DomTree::new("https://x.test/");
    countdown(&mut tree);
    let body = tree.body();
    let button = tree
        .append(body, ElementNode::new("button").with_text("Continue"))
        .unwrap();
    let page = shared(tree);

    let store = store();
    let guard = LoopGuard::from_config(store.clone(), &Config::default().loop_guard);
    let now = Utc::now();
    for _ in 0..5 {
        guard.record_action("x.test", now);
    }

    let handle = Scheduler::spawn(Arc::clone(&page), "x.test", Config::default(), store);
    let status = stopped(&handle).await;

    assert_eq!(status.state.stop_reason(), Some(StopReason::LoopPrevention));
    assert_eq!(status.state.action_count(), 0);
    assert!(!page.lock().was_activated(button));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_engine_does_nothing_until_enabled() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let form = tree.append_snapshot(body, &gate_form_node()).unwrap();
    let page = shared(tree);

    let store = store();
    write_flag(store.as_ref(), ENABLED_KEY, false).unwrap();
    let handle = start(&page, Config::default(), store.clone());

    tokio::time::sleep(Duration::from_secs(3)).await;
    let status = handle.status();
    assert!(!status.state.is_enabled());
    assert!(!status.state.is_stopped());
    assert!(!page.lock().was_submitted(form));

    handle.set_enabled(true).await.unwrap();
    let status = stopped(&handle).await;
    assert_eq!(status.state.stop_reason(), Some(StopReason::TerminalSubmit));
    assert_eq!(store.get(ENABLED_KEY).unwrap().as_deref(), Some("true"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_deferred_click() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let helper = tree
        .append(body, ElementNode::new("button").with_text("Continue"))
        .unwrap();
    let page = shared(tree);

    let mut config = Config::default();
    config.engine.click_delay_ms = 2000;
    let handle = start(&page, config, store());

    // Let the first tick schedule the click, then reveal the final form.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!page.lock().was_activated(helper));
    {
        let mut tree = page.lock();
        let body = tree.body();
        tree.append_snapshot(body, &gate_form_node()).unwrap();
    }

    let status = stopped(&handle).await;
    assert_eq!(status.state.stop_reason(), Some(StopReason::TerminalSubmit));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!page.lock().was_activated(helper));
    assert_eq!(handle.metrics().deferred_cancelled.load(Ordering::Relaxed), 1);
    assert_eq!(handle.status().state.action_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deferred_click_fires_after_delay() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let helper = tree
        .append(body, ElementNode::new("button").with_text("Continue"))
        .unwrap();
    let page = shared(tree);

    let mut config = Config::default();
    config.engine.click_delay_ms = 2000;
    let handle = start(&page, config, store());

    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert!(!page.lock().was_activated(helper));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(page.lock().was_activated(helper));
    assert_eq!(handle.status().state.action_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_force_bypass_resumes_and_keeps_count() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    tree.append_snapshot(body, &gate_form_node()).unwrap();
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    stopped(&handle).await;

    let response = handle.force_bypass().await.unwrap();
    assert!(response.success);
    let status = handle.status();
    assert!(!status.state.is_stopped());
    assert_eq!(status.state.action_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_force_bypass_with_spent_budget_stops_again() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    tree.append(body, ElementNode::new("button").with_text("Continue"))
        .unwrap();
    let page = shared(tree);

    let mut config = Config::default();
    config.engine.max_actions = 1;
    let handle = start(&page, config, store());
    let status = stopped(&handle).await;
    assert_eq!(status.state.stop_reason(), Some(StopReason::MaxActions));

    handle.force_bypass().await.unwrap();
    let status = handle.status();
    assert_eq!(status.state.stop_reason(), Some(StopReason::MaxActions));
    assert_eq!(status.state.action_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_requests() {
    let page = shared(DomTree::new("https://blog.test/post"));
    let handle = start(&page, Config::default(), store());

    assert!(handle.request(Request::ScrollToTop).await.unwrap().success);
    assert!(handle.request(Request::ScrollToBottom).await.unwrap().success);

    let tree = page.lock();
    let scrolls: Vec<_> = tree
        .activity()
        .iter()
        .filter_map(|a| match a {
            PageActivity::Scrolled(target) => Some(*target),
            _ => None,
        })
        .collect();
    assert_eq!(scrolls, vec![ScrollTarget::Top, ScrollTarget::Bottom]);
}

#[tokio::test(start_paused = true)]
async fn test_mutation_burst_is_coalesced() {
    let page = shared(DomTree::new("https://blog.test/post"));
    let handle = start(&page, Config::default(), store());

    {
        let mut tree = page.lock();
        let body = tree.body();
        for i in 0..10 {
            tree.append(body, ElementNode::new("p").with_text(format!("para {}", i)))
                .unwrap();
        }
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    let metrics = handle.metrics().snapshot();
    assert_eq!(metrics.ticks, 2);
    assert_eq!(metrics.coalesced_triggers, 9);
    assert_eq!(metrics.gated_evaluations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_interval_keeps_ticking_on_quiet_page() {
    let page = shared(DomTree::new("https://blog.test/post"));
    let handle = start(&page, Config::default(), store());

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let metrics = handle.metrics().snapshot();
    assert_eq!(metrics.ticks, 4);
    assert_eq!(metrics.actions, 0);
    assert!(!handle.status().state.is_stopped());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_forced_styles_are_restored() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let helper = tree
        .append(
            body,
            ElementNode::new("button")
                .with_text("Continue")
                .with_style("pointer-events", "none"),
        )
        .unwrap();
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(page.lock().was_activated(helper));
    assert_eq!(
        page.lock().element(helper).unwrap().style_value("pointer-events"),
        Some("auto")
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        page.lock().element(helper).unwrap().style_value("pointer-events"),
        Some("none")
    );
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_submit_control_is_not_reclicked_after_force_bypass() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let form = tree.append_snapshot(body, &gate_form_node()).unwrap();
    let button = tree
        .append(
            form,
            ElementNode::new("button")
                .with_attr("type", "submit")
                .with_text("Get Link"),
        )
        .unwrap();
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    stopped(&handle).await;
    assert_eq!(page.lock().activation_count(button), 1);

    handle.force_bypass().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let tree = page.lock();
    assert_eq!(tree.activation_count(button), 1);
    let submissions = tree
        .activity()
        .iter()
        .filter(|a| matches!(a, PageActivity::Submitted(_)))
        .count();
    assert_eq!(submissions, 1);
    assert_eq!(handle.status().state.action_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_submit_counts_but_does_not_stop() {
    let mut tree = DomTree::new("https://short.test/abc");
    countdown(&mut tree);
    let body = tree.body();
    let form = tree.append_snapshot(body, &gate_form_node()).unwrap();
    tree.on_activate(
        form,
        Behavior::Fail {
            reason: "submit threw".to_string(),
        },
    );
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = handle.status();
    assert!(!status.state.is_stopped());
    assert_eq!(status.state.action_count(), 1);
    assert!(!page.lock().was_submitted(form));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_countdown_survives_cleanup_until_link_appears() {
    let mut tree = DomTree::new("https://short.test/abc");
    let body = tree.body();
    tree.append(
        body,
        ElementNode::new("div")
            .with_attr("class", "countdown")
            .with_text("Please wait 5 seconds"),
    )
    .unwrap();
    let page = shared(tree);

    let handle = start(&page, Config::default(), store());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.status().last_detection.is_some_and(|d| d.gated));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let link = {
        let mut tree = page.lock();
        let body = tree.body();
        tree.append(
            body,
            ElementNode::new("a")
                .with_attr("href", "https://dest.test/")
                .with_text("Get Link"),
        )
        .unwrap()
    };
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(handle.status().last_detection.is_some_and(|d| d.gated));
    assert!(page.lock().was_activated(link));
    assert_eq!(handle.status().state.action_count(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_subscription_sees_toggle() {
    let page = shared(DomTree::new("https://blog.test/post"));
    let handle = start(&page, Config::default(), store());
    let mut status = handle.subscribe_status();
    assert!(status.borrow().state.is_enabled());

    handle.set_enabled(false).await.unwrap();
    let disabled = tokio::time::timeout(WAIT, status.wait_for(|s| !s.state.is_enabled()))
        .await
        .expect("no status update")
        .unwrap()
        .clone();
    assert_eq!(disabled.host, "short.test");
    handle.shutdown().await;
}
