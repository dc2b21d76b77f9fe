//! The document interface the engine is driven against.
//!
//! A `Page` is a live, mutating tree: the engine reads element text, tag,
//! attributes and computed visibility, and mutates it only through the
//! activation and cleanup entry points below. Implementations may be backed
//! by a real browser session or by the in-memory [`DomTree`](crate::DomTree).

use tokio::sync::mpsc;

use crate::dom_types::{ElementNode, InteractionEvent, MutationRecord, NodeId, ScrollTarget};
use crate::error::DomResult;
use crate::selector::Selector;

pub trait Page: Send {
    /// Page URL.
    fn url(&self) -> &str;

    /// Lowercased hostname of the page URL, empty if it has none.
    fn hostname(&self) -> String {
        url::Url::parse(self.url())
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default()
    }

    /// Root element.
    fn root(&self) -> NodeId;

    /// All attached elements in document order.
    fn elements(&self) -> Vec<NodeId>;

    /// Element data, `None` if the id is unknown.
    fn element(&self, id: NodeId) -> Option<&ElementNode>;

    /// Whether the element is still part of the tree.
    fn is_attached(&self, id: NodeId) -> bool;

    /// Computed visibility (display, visibility, hidden attribute, geometry).
    fn is_visible(&self, id: NodeId) -> bool;

    /// Own text plus all descendant text.
    fn text_content(&self, id: NodeId) -> String;

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(|e| e.parent)
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.element(id)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    /// Trimmed direct text, excluding descendants.
    fn own_text(&self, id: NodeId) -> &str {
        self.element(id).map(|e| e.text.trim()).unwrap_or("")
    }

    /// Ancestors, nearest first.
    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Attached descendants in document order.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.element(id) {
            Some(e) => e.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            if let Some(e) = self.element(next) {
                out.push(next);
                stack.extend(e.children.iter().rev().copied());
            }
        }
        out
    }

    /// Nearest inclusive ancestor matching `pred`.
    fn closest(&self, id: NodeId, pred: &dyn Fn(&ElementNode) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| self.element(*n).is_some_and(pred))
    }

    /// Attached elements matching a selector, in document order.
    fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|id| selector.matches(self, *id))
            .collect()
    }

    /// Set an attribute value.
    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> DomResult<()>;

    /// Remove an attribute, returning its previous value.
    fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<Option<String>>;

    /// Set (`Some`) or clear (`None`) an inline style property, returning the
    /// previous inline value.
    fn set_style(&mut self, id: NodeId, property: &str, value: Option<&str>)
    -> DomResult<Option<String>>;

    /// Detach an element and its subtree.
    fn remove_node(&mut self, id: NodeId) -> DomResult<()>;

    /// Force the scroll container back to a scrollable state.
    /// Returns true if anything changed.
    fn unlock_scroll(&mut self) -> bool;

    /// Dispatch a synthetic interaction event.
    fn dispatch(&mut self, id: NodeId, event: InteractionEvent) -> DomResult<()>;

    /// Invoke the element's native activation behaviour.
    fn activate(&mut self, id: NodeId) -> DomResult<()>;

    /// Invoke the native form submission API.
    fn submit_form(&mut self, id: NodeId) -> DomResult<()>;

    /// Scroll the viewport to an extremity.
    fn scroll_to(&mut self, target: ScrollTarget);

    /// Subscribe to subtree mutations.
    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<MutationRecord>;
}
