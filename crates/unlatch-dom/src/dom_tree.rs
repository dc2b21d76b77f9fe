//! DomTree: in-memory arena implementation of [`Page`].

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dom_types::{
    ElementNode, InteractionEvent, MutationKind, MutationRecord, NodeId, PageActivity,
    ScrollTarget,
};
use crate::error::{DomError, DomResult};
use crate::page::Page;
use crate::selector::Selector;
use crate::snapshot::{Behavior, PageSnapshot, SnapshotNode};

/// In-memory document tree.
///
/// Nodes live in an arena and are never deallocated, so a [`NodeId`] keeps
/// its identity after removal. Every side effect is appended to an activity
/// log and every mutation is broadcast to subscribers.
pub struct DomTree {
    url: String,
    nodes: Vec<ElementNode>,
    root: NodeId,
    behaviors: HashMap<NodeId, Vec<Behavior>>,
    activity: Vec<PageActivity>,
    subscribers: Vec<mpsc::UnboundedSender<MutationRecord>>,
}

impl DomTree {
    /// Create a page with an empty `html > body` skeleton.
    pub fn new(url: impl Into<String>) -> Self {
        let mut tree = Self::with_root(url, ElementNode::new("html"));
        let root = tree.root;
        tree.push_node(root, ElementNode::new("body"));
        tree
    }

    fn with_root(url: impl Into<String>, mut root: ElementNode) -> Self {
        root.attached = true;
        root.parent = None;
        Self {
            url: url.into(),
            nodes: vec![root],
            root: NodeId(0),
            behaviors: HashMap::new(),
            activity: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Build a tree from a snapshot.
    pub fn from_snapshot(snapshot: &PageSnapshot) -> Self {
        let mut tree = Self::with_root(snapshot.url.clone(), snapshot.root.to_element());
        let root = tree.root;
        if !snapshot.root.on_activate.is_empty() {
            tree.behaviors
                .insert(root, snapshot.root.on_activate.clone());
        }
        for child in &snapshot.root.children {
            tree.push_subtree(root, child);
        }
        tree
    }

    /// The `body` element, falling back to the root.
    pub fn body(&self) -> NodeId {
        self.nodes
            .iter()
            .position(|n| n.attached && n.is_tag("body"))
            .map(|i| NodeId(i as u32))
            .unwrap_or(self.root)
    }

    /// Append an element under `parent`.
    pub fn append(&mut self, parent: NodeId, element: ElementNode) -> DomResult<NodeId> {
        self.node(parent)?;
        let id = self.push_node(parent, element);
        self.notify(parent, MutationKind::ChildList);
        Ok(id)
    }

    /// Append a snapshot subtree under `parent`.
    pub fn append_snapshot(&mut self, parent: NodeId, node: &SnapshotNode) -> DomResult<NodeId> {
        self.node(parent)?;
        let id = self.push_subtree(parent, node);
        self.notify(parent, MutationKind::ChildList);
        Ok(id)
    }

    /// Register a behaviour to run when `id` is activated or submitted.
    pub fn on_activate(&mut self, id: NodeId, behavior: Behavior) {
        self.behaviors.entry(id).or_default().push(behavior);
    }

    /// Side effects recorded so far.
    pub fn activity(&self) -> &[PageActivity] {
        &self.activity
    }

    /// Whether `id` was activated at least once.
    pub fn was_activated(&self, id: NodeId) -> bool {
        self.activity.contains(&PageActivity::Activated(id))
    }

    /// Whether the form `id` was submitted at least once.
    pub fn was_submitted(&self, id: NodeId) -> bool {
        self.activity.contains(&PageActivity::Submitted(id))
    }

    /// Number of activations of `id`.
    pub fn activation_count(&self, id: NodeId) -> usize {
        self.activity
            .iter()
            .filter(|a| **a == PageActivity::Activated(id))
            .count()
    }

    /// First attached element with the given `id` attribute.
    pub fn find_by_id(&self, html_id: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|n| self.nodes[n.0 as usize].id() == Some(html_id))
    }

    fn node(&self, id: NodeId) -> DomResult<&ElementNode> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(DomError::NodeNotFound(id))
    }

    fn attached_node_mut(&mut self, id: NodeId) -> DomResult<&mut ElementNode> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or(DomError::NodeNotFound(id))?;
        if !node.attached {
            return Err(DomError::Detached(id));
        }
        Ok(node)
    }

    fn push_node(&mut self, parent: NodeId, mut element: ElementNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        element.parent = Some(parent);
        element.children.clear();
        element.attached = self.nodes[parent.0 as usize].attached;
        self.nodes.push(element);
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    fn push_subtree(&mut self, parent: NodeId, node: &SnapshotNode) -> NodeId {
        let id = self.push_node(parent, node.to_element());
        if !node.on_activate.is_empty() {
            self.behaviors.insert(id, node.on_activate.clone());
        }
        for child in &node.children {
            self.push_subtree(id, child);
        }
        id
    }

    fn notify(&mut self, target: NodeId, kind: MutationKind) {
        let record = MutationRecord { target, kind };
        self.subscribers
            .retain(|tx| tx.send(record.clone()).is_ok());
    }

    fn failure_reason(&self, id: NodeId) -> Option<String> {
        self.behaviors.get(&id).and_then(|list| {
            list.iter().find_map(|b| match b {
                Behavior::Fail { reason } => Some(reason.clone()),
                _ => None,
            })
        })
    }

    fn run_behaviors(&mut self, id: NodeId) {
        let Some(list) = self.behaviors.get(&id).cloned() else {
            return;
        };
        for behavior in list {
            if let Err(e) = self.apply_behavior(&behavior) {
                warn!("Behavior {:?} on {} failed: {}", behavior, id, e);
            }
        }
    }

    fn apply_behavior(&mut self, behavior: &Behavior) -> DomResult<()> {
        match behavior {
            Behavior::Reveal { selector } => {
                for target in self.query_all(&Selector::parse(selector)?) {
                    self.remove_attribute(target, "hidden")?;
                    if self.nodes[target.0 as usize].style_value("display") == Some("none") {
                        self.set_style(target, "display", None)?;
                    }
                    if self.nodes[target.0 as usize].style_value("visibility") == Some("hidden") {
                        self.set_style(target, "visibility", None)?;
                    }
                }
            }
            Behavior::Remove { selector } => {
                for target in self.query_all(&Selector::parse(selector)?) {
                    if self.is_attached(target) {
                        self.remove_node(target)?;
                    }
                }
            }
            Behavior::SetAttribute {
                selector,
                name,
                value,
            } => {
                for target in self.query_all(&Selector::parse(selector)?) {
                    self.set_attribute(target, name, value)?;
                }
            }
            Behavior::RemoveAttribute { selector, name } => {
                for target in self.query_all(&Selector::parse(selector)?) {
                    self.remove_attribute(target, name)?;
                }
            }
            Behavior::Insert { parent, node } => {
                let selector = Selector::parse(parent)?;
                if let Some(target) = self.query_all(&selector).into_iter().next() {
                    self.append_snapshot(target, node)?;
                }
            }
            Behavior::Navigate { url } => {
                self.activity.push(PageActivity::Navigated(url.clone()));
            }
            Behavior::Fail { .. } => {}
        }
        Ok(())
    }

    fn detach_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = &mut self.nodes[next.0 as usize];
            node.attached = false;
            stack.extend(node.children.iter().copied());
        }
    }
}

impl Page for DomTree {
    fn url(&self) -> &str {
        &self.url
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn elements(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    fn element(&self, id: NodeId) -> Option<&ElementNode> {
        self.nodes.get(id.0 as usize)
    }

    fn is_attached(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|n| n.attached)
    }

    fn is_visible(&self, id: NodeId) -> bool {
        let Some(node) = self.element(id) else {
            return false;
        };
        if !node.attached {
            return false;
        }
        if node.bounding_box.is_some_and(|b| b.is_empty()) {
            return false;
        }

        let mut visibility_decided = false;
        for current in std::iter::once(id).chain(self.ancestors(id)) {
            let n = &self.nodes[current.0 as usize];
            if n.has_attr("hidden") || n.style_value("display") == Some("none") {
                return false;
            }
            if !visibility_decided {
                match n.style_value("visibility") {
                    Some("hidden") | Some("collapse") => return false,
                    Some(_) => visibility_decided = true,
                    None => {}
                }
            }
        }
        true
    }

    fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.element(id) else {
            return String::new();
        };
        let mut parts: Vec<&str> = Vec::new();
        if !node.text.trim().is_empty() {
            parts.push(node.text.trim());
        }
        for child in self.descendants(id) {
            let text = self.nodes[child.0 as usize].text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(" ")
    }

    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()> {
        let name = name.to_ascii_lowercase();
        self.attached_node_mut(id)?
            .attributes
            .insert(name.clone(), value.to_string());
        self.notify(id, MutationKind::Attribute(name));
        Ok(())
    }

    fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<Option<String>> {
        let name = name.to_ascii_lowercase();
        let previous = self.attached_node_mut(id)?.attributes.remove(&name);
        if previous.is_some() {
            self.notify(id, MutationKind::Attribute(name));
        }
        Ok(previous)
    }

    fn set_style(
        &mut self,
        id: NodeId,
        property: &str,
        value: Option<&str>,
    ) -> DomResult<Option<String>> {
        let property = property.to_ascii_lowercase();
        let node = self.attached_node_mut(id)?;
        let previous = match value {
            Some(v) => node.style.insert(property.clone(), v.to_string()),
            None => node.style.remove(&property),
        };
        if previous.as_deref() != value {
            self.notify(id, MutationKind::Style(property));
        }
        Ok(previous)
    }

    fn remove_node(&mut self, id: NodeId) -> DomResult<()> {
        let parent = self.attached_node_mut(id)?.parent;
        self.detach_subtree(id);
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize].children.retain(|c| *c != id);
            self.notify(parent, MutationKind::ChildList);
        }
        self.activity.push(PageActivity::Removed(id));
        debug!("Removed node {}", id);
        Ok(())
    }

    fn unlock_scroll(&mut self) -> bool {
        let containers: Vec<NodeId> = self
            .elements()
            .into_iter()
            .filter(|n| {
                let e = &self.nodes[n.0 as usize];
                e.is_tag("html") || e.is_tag("body")
            })
            .collect();

        let mut changed = false;
        for id in containers {
            for property in ["overflow", "overflow-y"] {
                if self.nodes[id.0 as usize].style_value(property) == Some("hidden") {
                    // Containers are attached, so this cannot fail.
                    let _ = self.set_style(id, property, None);
                    changed = true;
                }
            }
        }
        if changed {
            self.activity.push(PageActivity::ScrollUnlocked);
        }
        changed
    }

    fn dispatch(&mut self, id: NodeId, event: InteractionEvent) -> DomResult<()> {
        self.attached_node_mut(id)?;
        self.activity.push(PageActivity::Dispatched(id, event));
        Ok(())
    }

    fn activate(&mut self, id: NodeId) -> DomResult<()> {
        let node = self.attached_node_mut(id)?;
        if node.is_disabled() {
            debug!("Activation of disabled control {} ignored", id);
            return Ok(());
        }
        if let Some(reason) = self.failure_reason(id) {
            return Err(DomError::ActivationFailed { node: id, reason });
        }

        self.activity.push(PageActivity::Activated(id));
        self.run_behaviors(id);

        let node = &self.nodes[id.0 as usize];
        if node.is_tag("a") {
            if let Some(href) = node.attr("href") {
                let href = href.trim();
                if !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:") {
                    self.activity.push(PageActivity::Navigated(href.to_string()));
                }
            }
        }

        if node.is_submit_control() {
            if let Some(form) = self.closest(id, &|e: &ElementNode| e.is_tag("form")) {
                if self.is_attached(form) {
                    self.submit_form(form)
                        .map_err(|e| DomError::ActivationFailed {
                            node: id,
                            reason: e.to_string(),
                        })?;
                }
            }
        }
        Ok(())
    }

    fn submit_form(&mut self, id: NodeId) -> DomResult<()> {
        let node = self.attached_node_mut(id)?;
        if !node.is_tag("form") {
            return Err(DomError::SubmissionFailed {
                node: id,
                reason: format!("<{}> is not a form", node.tag_name),
            });
        }
        if let Some(reason) = self.failure_reason(id) {
            return Err(DomError::SubmissionFailed { node: id, reason });
        }

        self.activity.push(PageActivity::Submitted(id));
        self.run_behaviors(id);
        if let Some(action) = self.nodes[id.0 as usize].attr("action") {
            if !action.trim().is_empty() {
                self.activity.push(PageActivity::Navigated(action.trim().to_string()));
            }
        }
        Ok(())
    }

    fn scroll_to(&mut self, target: ScrollTarget) {
        self.activity.push(PageActivity::Scrolled(target));
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }
}
