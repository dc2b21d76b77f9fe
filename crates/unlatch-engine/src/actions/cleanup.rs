//! Non-destructive cleanup: re-enable controls, drop overlays, unlock scroll.

use serde::Serialize;
use tracing::{debug, info};
use unlatch_dom::{NodeId, Page};

use super::SelectorSets;
use crate::denylist::RequestDenylist;
use crate::inspect::{contains_interactive, has_gate_marker};
use crate::vocabulary::{ADBLOCK_TEXT, COUNTDOWN, OVERLAY_Z_INDEX};

/// What one cleanup pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub reenabled: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub scroll_unlocked: bool,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.reenabled.is_empty() && self.removed.is_empty() && !self.scroll_unlocked
    }
}

pub(super) fn run(
    page: &mut dyn Page,
    selectors: &SelectorSets,
    denylist: &RequestDenylist,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    let disabled: Vec<NodeId> = page
        .elements()
        .into_iter()
        .filter(|id| {
            page.element(*id)
                .is_some_and(|e| e.is_disabled() && !e.is_hidden_input())
        })
        .collect();
    for id in disabled {
        if let Ok(Some(_)) = page.remove_attribute(id, "disabled") {
            report.reenabled.push(id);
        }
    }

    for id in removal_targets(page, selectors, denylist) {
        // An earlier removal may have taken this one with it.
        if !page.is_attached(id) {
            continue;
        }
        match page.remove_node(id) {
            Ok(()) => report.removed.push(id),
            Err(e) => debug!(node = %id, "Cleanup removal skipped: {}", e),
        }
    }

    report.scroll_unlocked = page.unlock_scroll();

    if !report.is_empty() {
        info!(
            reenabled = report.reenabled.len(),
            removed = report.removed.len(),
            scroll_unlocked = report.scroll_unlocked,
            "Cleanup"
        );
    }
    report
}

fn removal_targets(
    page: &dyn Page,
    selectors: &SelectorSets,
    denylist: &RequestDenylist,
) -> Vec<NodeId> {
    let page_url = page.url().to_string();
    let root = page.root();

    page.elements()
        .into_iter()
        .filter(|id| {
            let Some(e) = page.element(*id) else {
                return false;
            };
            if *id == root || e.is_tag("html") || e.is_tag("body") {
                return false;
            }

            let nuisance = selectors.nuisance.iter().any(|s| s.matches(page, *id));
            let overlay = e.z_index().is_some_and(|z| z > OVERLAY_Z_INDEX) && page.is_visible(*id);
            let nag = e.is_out_of_flow() && ADBLOCK_TEXT.is_match(&page.text_content(*id));
            let ad_frame = e.is_tag("iframe")
                && e.attr("src").is_some_and(|src| denylist.is_blocked(src, &page_url));
            let clutter = (nuisance || overlay || nag) && !holds_gate_evidence(page, *id);

            (clutter || ad_frame) && !contains_interactive(page, *id)
        })
        .collect()
}

/// Whether the subtree carries countdown text or a gate marker, the
/// evidence the detector scores on.
fn holds_gate_evidence(page: &dyn Page, id: NodeId) -> bool {
    std::iter::once(id)
        .chain(page.descendants(id))
        .filter_map(|n| page.element(n))
        .any(has_gate_marker)
        || COUNTDOWN.is_match(&page.text_content(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use unlatch_config::DenylistConfig;
    use unlatch_dom::{DomTree, ElementNode};

    fn clean(tree: &mut DomTree) -> CleanupReport {
        let denylist = RequestDenylist::new(&DenylistConfig::default().hosts);
        run(tree, &SelectorSets::builtin(), &denylist)
    }

    #[test]
    fn test_reenables_disabled_controls() {
        let mut tree = DomTree::new("https://short.test/");
        let body = tree.body();
        let button = tree
            .append(body, ElementNode::new("button").with_attr("disabled", ""))
            .unwrap();
        let hidden = tree
            .append(
                body,
                ElementNode::new("input")
                    .with_attr("type", "hidden")
                    .with_attr("disabled", ""),
            )
            .unwrap();

        let report = clean(&mut tree);
        assert_eq!(report.reenabled, vec![button]);
        assert!(tree.element(hidden).unwrap().has_attr("disabled"));
    }

    #[test]
    fn test_removes_overlays_and_nags() {
        let mut tree = DomTree::new("https://short.test/");
        let body = tree.body();
        let overlay = tree
            .append(body, ElementNode::new("div").with_style("z-index", "10000"))
            .unwrap();
        let modal = tree
            .append(body, ElementNode::new("div").with_id("adblock-modal"))
            .unwrap();
        let nag = tree
            .append(
                body,
                ElementNode::new("div")
                    .with_style("position", "fixed")
                    .with_text("AdBlock detected! Please disable your adblocker."),
            )
            .unwrap();
        let inline_nag = tree
            .append(
                body,
                ElementNode::new("p").with_text("Please disable your adblock to support us."),
            )
            .unwrap();

        let report = clean(&mut tree);
        assert_eq!(report.removed, vec![overlay, modal, nag]);
        assert!(tree.is_attached(inline_nag));
    }

    #[test]
    fn test_never_removes_interactive_content() {
        let mut tree = DomTree::new("https://short.test/");
        let body = tree.body();
        let popup = tree
            .append(body, ElementNode::new("div").with_class("popup"))
            .unwrap();
        let form = tree.append(popup, ElementNode::new("form")).unwrap();

        let report = clean(&mut tree);
        assert!(report.removed.is_empty());
        assert!(tree.is_attached(form));
    }

    #[test]
    fn test_keeps_gate_evidence() {
        let mut tree = DomTree::new("https://short.test/");
        let body = tree.body();
        let timer = tree
            .append(
                body,
                ElementNode::new("div")
                    .with_class("popup")
                    .with_text("Please wait 5 seconds"),
            )
            .unwrap();
        let locker = tree
            .append(
                body,
                ElementNode::new("div")
                    .with_class("overlay content-locker")
                    .with_style("z-index", "10000"),
            )
            .unwrap();
        let backdrop = tree
            .append(body, ElementNode::new("div").with_class("modal-backdrop"))
            .unwrap();

        let report = clean(&mut tree);
        assert_eq!(report.removed, vec![backdrop]);
        assert!(tree.is_attached(timer));
        assert!(tree.is_attached(locker));
    }

    #[test]
    fn test_removes_protocol_relative_ad_iframe() {
        let mut tree = DomTree::new("https://short.test/abc");
        let body = tree.body();
        let ad = tree
            .append(
                body,
                ElementNode::new("iframe")
                    .with_attr("src", "//googleads.g.doubleclick.net/pagead/ads?client=1"),
            )
            .unwrap();
        let own = tree
            .append(body, ElementNode::new("iframe").with_attr("src", "/embed/player"))
            .unwrap();

        let report = clean(&mut tree);
        assert_eq!(report.removed, vec![ad]);
        assert!(tree.is_attached(own));
    }

    #[test]
    fn test_removes_denylisted_iframes_only() {
        let mut tree = DomTree::new("https://short.test/");
        let body = tree.body();
        let ad = tree
            .append(
                body,
                ElementNode::new("iframe").with_attr("src", "https://ads.adsterra.com/frame"),
            )
            .unwrap();
        let video = tree
            .append(
                body,
                ElementNode::new("iframe").with_attr("src", "https://player.video.test/embed/1"),
            )
            .unwrap();

        let report = clean(&mut tree);
        assert_eq!(report.removed, vec![ad]);
        assert!(tree.is_attached(video));
    }

    #[test]
    fn test_unlocks_scroll_and_is_quiet_when_clean() {
        let mut tree = DomTree::new("https://short.test/");
        let body = tree.body();
        tree.set_style(body, "overflow", Some("hidden")).unwrap();

        assert!(clean(&mut tree).scroll_unlocked);
        assert!(clean(&mut tree).is_empty());
    }
}
