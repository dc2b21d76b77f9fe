//! Force-interact: make an element clickable, click it like a user would,
//! then put its inline style back.

use tracing::debug;
use unlatch_dom::{DomResult, InteractionEvent, NodeId, Page};

use crate::error::EngineResult;

/// Inline style values that block interaction, with their overrides.
const BLOCKING_STYLES: &[(&str, &str, &str)] = &[
    ("display", "none", "inline-block"),
    ("visibility", "hidden", "visible"),
    ("opacity", "0", "1"),
    ("pointer-events", "none", "auto"),
];

/// Inline style values to put back after a forced interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRestore {
    node: NodeId,
    saved: Vec<(&'static str, Option<String>)>,
}

impl StyleRestore {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Restore the saved inline values. Detached nodes are skipped.
    pub fn apply(self, page: &mut dyn Page) {
        if !page.is_attached(self.node) {
            return;
        }
        for (property, previous) in self.saved {
            if let Err(e) = page.set_style(self.node, property, previous.as_deref()) {
                debug!(node = %self.node, "Style restore of {} skipped: {}", property, e);
            }
        }
    }
}

/// Override blocking inline styles, clear `disabled`, dispatch the pointer
/// sequence and invoke native activation.
///
/// Returns the style values to restore, if any were overridden.
pub fn force_interact(page: &mut dyn Page, node: NodeId) -> EngineResult<Option<StyleRestore>> {
    let mut saved = Vec::new();

    if page.element(node).is_some_and(|e| e.is_disabled()) {
        page.remove_attribute(node, "disabled")?;
    }

    for (property, blocking, forced) in BLOCKING_STYLES {
        let current = page
            .element(node)
            .and_then(|e| e.style_value(property))
            .map(str::to_string);
        if current.as_deref() == Some(*blocking) {
            let previous = page.set_style(node, property, Some(*forced))?;
            saved.push((*property, previous));
        }
    }

    let restore = (!saved.is_empty()).then_some(StyleRestore { node, saved });

    match click(page, node) {
        Ok(()) => Ok(restore),
        Err(e) => {
            if let Some(restore) = restore {
                restore.apply(page);
            }
            Err(e.into())
        }
    }
}

fn click(page: &mut dyn Page, node: NodeId) -> DomResult<()> {
    for event in InteractionEvent::POINTER_SEQUENCE {
        page.dispatch(node, event)?;
    }
    page.activate(node)
}
