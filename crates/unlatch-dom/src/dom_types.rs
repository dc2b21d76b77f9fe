//! DOM type definitions: NodeId, BoundingBox, ElementNode, events and activity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of an element for the lifetime of a page.
///
/// Ids are arena indices and are never reused, even after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout box for an element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One element of the document tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementNode {
    /// Tag name (lowercase).
    pub tag_name: String,
    /// Attributes, including `id` and `class`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Inline style properties.
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    /// Direct text only, not from children.
    #[serde(default)]
    pub text: String,
    /// Explicit geometry; `None` means laid out with a non-empty box.
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// Parent node ID.
    #[serde(skip)]
    pub parent: Option<NodeId>,
    /// Child node IDs in document order.
    #[serde(skip)]
    pub children: Vec<NodeId>,
    /// False once removed from the tree.
    #[serde(skip)]
    pub attached: bool,
}

/// Synthetic interaction events the engine can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionEvent {
    PointerOver,
    PointerEnter,
    MouseOver,
    PointerDown,
    MouseDown,
    Focus,
    PointerUp,
    MouseUp,
    Click,
}

impl InteractionEvent {
    /// Realistic pointer sequence ending in the activation event.
    pub const POINTER_SEQUENCE: [InteractionEvent; 9] = [
        InteractionEvent::PointerOver,
        InteractionEvent::PointerEnter,
        InteractionEvent::MouseOver,
        InteractionEvent::PointerDown,
        InteractionEvent::MouseDown,
        InteractionEvent::Focus,
        InteractionEvent::PointerUp,
        InteractionEvent::MouseUp,
        InteractionEvent::Click,
    ];
}

impl std::fmt::Display for InteractionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InteractionEvent::PointerOver => "pointerover",
            InteractionEvent::PointerEnter => "pointerenter",
            InteractionEvent::MouseOver => "mouseover",
            InteractionEvent::PointerDown => "pointerdown",
            InteractionEvent::MouseDown => "mousedown",
            InteractionEvent::Focus => "focus",
            InteractionEvent::PointerUp => "pointerup",
            InteractionEvent::MouseUp => "mouseup",
            InteractionEvent::Click => "click",
        };
        write!(f, "{}", name)
    }
}

/// Kind of tree change delivered to mutation subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    ChildList,
    Attribute(String),
    Style(String),
    Text,
}

/// A single tree change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Side effects observed on a page, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageActivity {
    Activated(NodeId),
    Submitted(NodeId),
    Dispatched(NodeId, InteractionEvent),
    Removed(NodeId),
    Navigated(String),
    ScrollUnlocked,
    Scrolled(ScrollTarget),
}

/// Scroll destinations for the companion scroll requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollTarget {
    Top,
    Bottom,
}
