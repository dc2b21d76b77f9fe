//! # unlatch DOM
//!
//! Document model for the unlatch gate engine.
//!
//! The engine never talks to a browser directly. It is driven against the
//! [`Page`] trait, which exposes exactly what the heuristics need:
//!
//! - element tag, attributes, inline style and text
//! - computed visibility and a numeric stacking order
//! - a mutation subscription that fires on subtree changes
//! - activation entry points (native click, form submission, synthetic events)
//!
//! [`DomTree`] is an in-memory arena implementation. It records every side
//! effect in an activity log and can replay scripted page reactions loaded
//! from a JSON [`PageSnapshot`].

mod dom_node;
mod dom_tree;
mod dom_types;
mod error;
mod page;
mod selector;
mod snapshot;

pub use dom_tree::DomTree;
pub use dom_types::{
    BoundingBox, ElementNode, InteractionEvent, MutationKind, MutationRecord, NodeId,
    PageActivity, ScrollTarget,
};
pub use error::{DomError, DomResult};
pub use page::Page;
pub use selector::Selector;
pub use snapshot::{Behavior, PageSnapshot, SnapshotNode};

#[cfg(test)]
#[path = "dom_tests.rs"]
mod tests;
