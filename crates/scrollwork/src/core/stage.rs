use glam::Vec2;

use crate::api::types::{Property, PropertyWrite, TargetId};
use crate::core::error::MotionError;
use crate::core::surface::{Rect, Surface};

/// Visual state of one mounted element.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: TargetId,
    /// String tag for finding nodes by name (e.g. "hero-logo").
    pub tag: String,
    /// Detached nodes reject writes until they are mounted again.
    pub attached: bool,
    pub bounds: Rect,
    pub opacity: f32,
    pub translate: Vec2,
    pub scale: f32,
    pub stroke_offset: f32,
    pub text: String,
}

impl Node {
    pub fn new(id: TargetId) -> Self {
        Self {
            id,
            tag: String::new(),
            attached: true,
            bounds: Rect::default(),
            opacity: 1.0,
            translate: Vec2::ZERO,
            scale: 1.0,
            stroke_offset: 0.0,
            text: String::new(),
        }
    }

    // -- Builder pattern --

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_stroke_offset(mut self, offset: f32) -> Self {
        self.stroke_offset = offset;
        self
    }

    pub fn get(&self, property: Property) -> f32 {
        match property {
            Property::Opacity => self.opacity,
            Property::TranslateX => self.translate.x,
            Property::TranslateY => self.translate.y,
            Property::Scale => self.scale,
            Property::StrokeOffset => self.stroke_offset,
        }
    }

    fn set(&mut self, property: Property, value: f32) {
        match property {
            Property::Opacity => self.opacity = value,
            Property::TranslateX => self.translate.x = value,
            Property::TranslateY => self.translate.y = value,
            Property::Scale => self.scale = value,
            Property::StrokeOffset => self.stroke_offset = value,
        }
    }
}

/// In-memory mirror of the page's animated elements.
///
/// Flat Vec storage, sized for a page's worth of targets (tens, not thousands).
/// Every successful write is also appended to a per-frame log that the web
/// bridge packs into the shared buffer.
#[derive(Debug, Default)]
pub struct Stage {
    nodes: Vec<Node>,
    writes: Vec<PropertyWrite>,
    text_writes: Vec<(TargetId, String)>,
}

impl Stage {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(64),
            writes: Vec::with_capacity(256),
            text_writes: Vec::new(),
        }
    }

    /// Mount a node. Replaces any node with the same id.
    pub fn mount(&mut self, node: Node) {
        self.unmount(node.id);
        self.nodes.push(node);
    }

    /// Remove a node entirely. Returns the removed node if found.
    pub fn unmount(&mut self, id: TargetId) -> Option<Node> {
        let idx = self.nodes.iter().position(|n| n.id == id)?;
        Some(self.nodes.swap_remove(idx))
    }

    /// Keep the node's slot but reject further writes (element removed from the DOM).
    pub fn detach(&mut self, id: TargetId) {
        if let Some(node) = self.get_mut(id) {
            node.attached = false;
        }
    }

    pub fn get(&self, id: TargetId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.tag == tag)
    }

    /// Update layout bounds after a resize or content change.
    pub fn set_bounds(&mut self, id: TargetId, bounds: Rect) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.bounds = bounds;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Property writes recorded since the last `clear_writes`.
    pub fn writes(&self) -> &[PropertyWrite] {
        &self.writes
    }

    /// Text writes recorded since the last `clear_writes`.
    pub fn text_writes(&self) -> &[(TargetId, String)] {
        &self.text_writes
    }

    /// Clear the per-frame write log.
    pub fn clear_writes(&mut self) {
        self.writes.clear();
        self.text_writes.clear();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.clear_writes();
    }

    fn attached_mut(&mut self, id: TargetId) -> Result<&mut Node, MotionError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(MotionError::TargetMissing(id))?;
        if !node.attached {
            return Err(MotionError::TargetDetached(id));
        }
        Ok(node)
    }
}

impl Surface for Stage {
    fn bounds(&self, target: TargetId) -> Option<Rect> {
        self.get(target).filter(|n| n.attached).map(|n| n.bounds)
    }

    fn property(&self, target: TargetId, property: Property) -> Option<f32> {
        self.get(target).filter(|n| n.attached).map(|n| n.get(property))
    }

    fn set_property(&mut self, target: TargetId, property: Property, value: f32) -> Result<(), MotionError> {
        let node = self.attached_mut(target)?;
        node.set(property, value);
        self.writes.push(PropertyWrite::new(target, property, value));
        Ok(())
    }

    fn set_text(&mut self, target: TargetId, text: &str) -> Result<(), MotionError> {
        let node = self.attached_mut(target)?;
        node.text.clear();
        node.text.push_str(text);
        self.text_writes.push((target, text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_and_write() {
        let mut stage = Stage::new();
        let id = TargetId(1);
        stage.mount(Node::new(id).with_bounds(Rect::new(0.0, 100.0, 50.0, 20.0)));

        stage.set_property(id, Property::Opacity, 0.25).unwrap();
        assert_eq!(stage.get(id).unwrap().opacity, 0.25);
        assert_eq!(stage.writes().len(), 1);
        assert_eq!(stage.writes()[0].value, 0.25);
    }

    #[test]
    fn detached_node_rejects_writes() {
        let mut stage = Stage::new();
        let id = TargetId(3);
        stage.mount(Node::new(id).with_text("hello"));
        stage.detach(id);

        assert!(matches!(
            stage.set_text(id, "bye"),
            Err(MotionError::TargetDetached(_))
        ));
        assert_eq!(stage.get(id).unwrap().text, "hello");
        assert!(stage.bounds(id).is_none());
    }

    #[test]
    fn missing_node_is_reported() {
        let mut stage = Stage::new();
        assert!(matches!(
            stage.set_property(TargetId(9), Property::Scale, 2.0),
            Err(MotionError::TargetMissing(_))
        ));
    }

    #[test]
    fn find_by_tag() {
        let mut stage = Stage::new();
        stage.mount(Node::new(TargetId(1)).with_tag("logo"));
        stage.mount(Node::new(TargetId(2)).with_tag("headline"));
        assert_eq!(stage.find_by_tag("headline").unwrap().id, TargetId(2));
    }
}
