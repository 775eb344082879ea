//! Scroll position → active navigation section.

use crate::api::types::TargetId;
use crate::core::surface::{Rect, Surface};

/// One named range of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub start_offset: f32,
    pub end_offset: f32,
    /// Element the range is measured from, if any.
    pub target: Option<TargetId>,
    /// Registration order, used as a stable tie-break when sorting.
    order: u32,
}

/// Sections ordered by document position.
#[derive(Debug, Clone, Default)]
pub struct SectionMap {
    sections: Vec<Section>,
    next_order: u32,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: String, bounds: Rect, target: Option<TargetId>) {
        self.sections.retain(|s| s.name != name);
        self.sections.push(Section {
            name,
            start_offset: bounds.top(),
            end_offset: bounds.bottom(),
            target,
            order: self.next_order,
        });
        self.next_order += 1;
        self.sort();
    }

    fn sort(&mut self) {
        self.sections.sort_by(|a, b| {
            a.start_offset
                .total_cmp(&b.start_offset)
                .then(a.order.cmp(&b.order))
        });
    }

    /// Name of the first section (in document order) whose `[start, end)` contains `position`.
    pub fn section_at(&self, position: f32) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| position >= s.start_offset && position < s.end_offset)
            .map(|s| s.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Tracks which section the focus point is in.
///
/// The focus point is `smoothed_offset + focus_bias`: a fixed distance below
/// the top of the viewport, so a section becomes active once it is well into view.
#[derive(Debug, Clone)]
pub struct SectionTracker {
    map: SectionMap,
    focus_bias: f32,
    active: Option<String>,
}

impl SectionTracker {
    pub fn new(focus_bias: f32) -> Self {
        Self {
            map: SectionMap::new(),
            focus_bias,
            active: None,
        }
    }

    /// Register a section by explicit bounds. Re-registering a name replaces it.
    pub fn register_section(&mut self, name: impl Into<String>, bounds: Rect) {
        self.map.insert(name.into(), bounds, None);
    }

    /// Register a section measured from a mounted element.
    /// Returns false (and registers nothing) if the target is not mounted.
    pub fn register_target(&mut self, name: impl Into<String>, target: TargetId, surface: &dyn Surface) -> bool {
        let Some(bounds) = surface.bounds(target) else {
            log::debug!("section target {:?} not mounted, skipping", target);
            return false;
        };
        self.map.insert(name.into(), bounds, Some(target));
        true
    }

    pub fn unregister_section(&mut self, name: &str) -> bool {
        let before = self.map.sections.len();
        self.map.sections.retain(|s| s.name != name);
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.map.sections.len() != before
    }

    /// Re-read bounds of element-backed sections after layout changed.
    pub fn refresh(&mut self, surface: &dyn Surface) {
        for section in &mut self.map.sections {
            if let Some(bounds) = section.target.and_then(|t| surface.bounds(t)) {
                section.start_offset = bounds.top();
                section.end_offset = bounds.bottom();
            }
        }
        self.map.sort();
    }

    /// Recompute from the virtual offset. Returns the new active section if it changed.
    pub fn update(&mut self, smoothed_offset: f32) -> Option<Option<&str>> {
        let next = self.map.section_at(smoothed_offset + self.focus_bias);
        if next == self.active.as_deref() {
            return None;
        }
        self.active = next.map(str::to_string);
        Some(self.active.as_deref())
    }

    pub fn active_section(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Scroll offset that puts a section's start at the focus point.
    pub fn offset_of(&self, name: &str) -> Option<f32> {
        self.map.get(name).map(|s| (s.start_offset - self.focus_bias).max(0.0))
    }

    /// Index of a section in document order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.map.iter().position(|s| s.name == name)
    }

    pub fn map(&self) -> &SectionMap {
        &self.map
    }

    pub fn focus_bias(&self) -> f32 {
        self.focus_bias
    }

    pub fn clear(&mut self) {
        self.map = SectionMap::new();
        self.active = None;
    }
}
