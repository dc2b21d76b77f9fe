//! BoundingBox geometry methods and ElementNode accessors/builders.

use std::collections::BTreeMap;

use super::{BoundingBox, ElementNode};

/// Tags that accept a `disabled` attribute and user activation.
const CONTROL_TAGS: [&str; 4] = ["button", "input", "select", "textarea"];

impl BoundingBox {
    /// Create a box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the box has no area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Get the center point of this bounding box.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

impl ElementNode {
    /// Create a detached element with the given tag.
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            text: String::new(),
            bounding_box: None,
            parent: None,
            children: Vec::new(),
            attached: false,
        }
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_attr("id", id)
    }

    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attr("class", class)
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style
            .insert(property.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    /// Get an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Element `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Class list split on whitespace.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Inline style property value.
    pub fn style_value(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(|v| v.trim())
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name == tag
    }

    /// Whether this is a form control that can carry `disabled`.
    pub fn is_control(&self) -> bool {
        CONTROL_TAGS.contains(&self.tag_name.as_str())
    }

    pub fn is_disabled(&self) -> bool {
        self.is_control() && self.has_attr("disabled")
    }

    /// Lowercased `type` attribute.
    pub fn input_type(&self) -> Option<String> {
        self.attr("type").map(|t| t.trim().to_ascii_lowercase())
    }

    /// Whether activating this element submits its form.
    pub fn is_submit_control(&self) -> bool {
        match self.tag_name.as_str() {
            "button" => matches!(self.input_type().as_deref(), None | Some("submit")),
            "input" => matches!(self.input_type().as_deref(), Some("submit") | Some("image")),
            _ => false,
        }
    }

    /// Whether this is a hidden form field.
    pub fn is_hidden_input(&self) -> bool {
        self.is_tag("input") && self.input_type().as_deref() == Some("hidden")
    }

    /// Explicit stacking order from the inline `z-index`.
    ///
    /// Non-numeric values such as `auto` are treated as absent.
    pub fn z_index(&self) -> Option<i64> {
        self.style_value("z-index")?.parse::<i64>().ok()
    }

    /// Whether the element is taken out of normal flow.
    pub fn is_out_of_flow(&self) -> bool {
        matches!(self.style_value("position"), Some("fixed") | Some("absolute"))
    }

    /// Label text for controls whose caption lives in an attribute.
    pub fn caption(&self) -> Option<&str> {
        if self.is_tag("input") {
            return self.attr("value");
        }
        self.attr("aria-label")
    }
}
