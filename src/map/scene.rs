use std::collections::BTreeMap;

use tracing::warn;

use crate::overlay::{Category, DisplaySurface, Handle, MarkerSpec};

/// In-memory display surface: the set of markers the terminal map draws.
#[derive(Debug, Default)]
pub struct Scene {
    objects: BTreeMap<Handle, (Category, MarkerSpec, bool)>,
    next_id: u64,
    unknown_removals: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_visible(&self, handle: Handle) -> bool {
        self.objects.get(&handle).is_some_and(|(_, _, visible)| *visible)
    }

    pub fn get(&self, handle: Handle) -> Option<&MarkerSpec> {
        self.objects.get(&handle).map(|(_, spec, _)| spec)
    }

    /// Visible markers in draw order: by category back to front, then by
    /// insertion within a category
    pub fn visible(&self) -> impl Iterator<Item = (Category, &MarkerSpec)> {
        let mut shown: Vec<(Category, &MarkerSpec)> = self
            .objects
            .values()
            .filter(|(_, _, visible)| *visible)
            .map(|(category, spec, _)| (*category, spec))
            .collect();
        shown.sort_by_key(|(category, _)| *category);
        shown.into_iter()
    }

    /// Removals of handles this scene never issued or already dropped
    pub fn unknown_removals(&self) -> usize {
        self.unknown_removals
    }
}

impl DisplaySurface for Scene {
    fn add(&mut self, category: Category, spec: MarkerSpec, visible: bool) -> Handle {
        self.next_id += 1;
        let handle = Handle(self.next_id);
        self.objects.insert(handle, (category, spec, visible));
        handle
    }

    fn remove(&mut self, handle: Handle) {
        if self.objects.remove(&handle).is_none() {
            self.unknown_removals += 1;
            warn!(?handle, "removing unknown marker");
        }
    }

    fn set_visible(&mut self, handle: Handle, visible: bool) {
        if let Some((_, _, shown)) = self.objects.get_mut(&handle) {
            *shown = visible;
        }
    }
}
