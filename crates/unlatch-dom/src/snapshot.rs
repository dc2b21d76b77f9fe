//! JSON page snapshots.
//!
//! A snapshot describes a page as a nested element tree plus scripted
//! behaviours that run when an element is activated or a form is submitted,
//! which is enough to replay multi-step gates offline.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dom_types::{BoundingBox, ElementNode};
use crate::error::{DomError, DomResult};

/// Root of a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Page URL; its host is the host the engine runs for.
    pub url: String,
    /// Root element, usually `html` or `body`.
    pub root: SnapshotNode,
}

/// One element in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
    /// Behaviours run when this element is activated or submitted.
    #[serde(default)]
    pub on_activate: Vec<Behavior>,
}

/// Scripted page reaction to an activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Behavior {
    /// Clear `hidden`, `display:none` and `visibility:hidden` on matches.
    Reveal { selector: String },
    /// Remove matches from the tree.
    Remove { selector: String },
    SetAttribute {
        selector: String,
        name: String,
        value: String,
    },
    RemoveAttribute { selector: String, name: String },
    /// Append a new subtree under the first match of `parent`.
    Insert { parent: String, node: SnapshotNode },
    /// Record a navigation.
    Navigate { url: String },
    /// Make the activation (or submission) throw.
    Fail { reason: String },
}

impl PageSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> DomResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(content: &str) -> DomResult<Self> {
        let snapshot: PageSnapshot = serde_json::from_str(content)?;
        if snapshot.root.tag.trim().is_empty() {
            return Err(DomError::Snapshot("root element has no tag".to_string()));
        }
        Ok(snapshot)
    }
}

impl SnapshotNode {
    /// Create a snapshot node with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            text: String::new(),
            bounding_box: None,
            children: Vec::new(),
            on_activate: Vec::new(),
        }
    }

    /// Element data without children or behaviours.
    pub fn to_element(&self) -> ElementNode {
        let mut element = ElementNode::new(self.tag.clone()).with_text(self.text.clone());
        for (name, value) in &self.attributes {
            element = element.with_attr(name.clone(), value.clone());
        }
        for (property, value) in &self.style {
            element = element.with_style(property.clone(), value.clone());
        }
        element.bounding_box = self.bounding_box;
        element
    }
}
