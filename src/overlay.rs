//! Bookkeeping for the visual objects each marker category has placed on a
//! display surface. Every handle added under a category stays tracked until
//! that category is cleared, so nothing is left behind across date changes.

use std::collections::HashMap;

use glam::DVec2;
use thiserror::Error;

/// Marker categories, in back-to-front draw order. Surfaces draw a later
/// category over an earlier one regardless of insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Grid,
    Predicted,
    Observed,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Grid, Category::Predicted, Category::Observed];

    pub fn label(self) -> &'static str {
        match self {
            Category::Grid => "grid",
            Category::Predicted => "predicted",
            Category::Observed => "observed",
        }
    }
}

/// Opaque id of a visual object owned by a display surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 1.0);
    pub const GRAY: Rgba = Rgba::new(128, 128, 128, 1.0);
    pub const RED: Rgba = Rgba::new(255, 0, 0, 1.0);
    pub const ORANGE: Rgba = Rgba::new(255, 165, 0, 1.0);
    pub const YELLOW: Rgba = Rgba::new(255, 255, 0, 1.0);
}

/// What a surface should draw. Positions are `DVec2 { x: lon, y: lat }`.
#[derive(Clone, Debug, PartialEq)]
pub enum MarkerSpec {
    Point {
        position: DVec2,
        /// Pixel size
        size: f64,
        color: Rgba,
        outline: Option<Rgba>,
        label: String,
    },
    Polygon {
        corners: [DVec2; 4],
        fill: Rgba,
        outline: Rgba,
    },
}

/// The rendering surface markers are placed on
pub trait DisplaySurface {
    fn add(&mut self, category: Category, spec: MarkerSpec, visible: bool) -> Handle;
    fn remove(&mut self, handle: Handle);
    fn set_visible(&mut self, handle: Handle, visible: bool);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverlayError {
    #[error("handle {0:?} is already tracked under {1:?}")]
    DuplicateHandle(Handle, Category),
}

#[derive(Debug)]
pub struct OverlayRegistry {
    sets: HashMap<Category, Vec<Handle>>,
    visible: HashMap<Category, bool>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            visible: Category::ALL.iter().map(|&c| (c, true)).collect(),
        }
    }

    /// Remove every handle tracked under `category` from the surface
    pub fn clear(&mut self, category: Category, surface: &mut dyn DisplaySurface) {
        if let Some(handles) = self.sets.get_mut(&category) {
            for handle in handles.drain(..) {
                surface.remove(handle);
            }
        }
    }

    /// Track a handle already placed on the surface
    pub fn add(&mut self, category: Category, handle: Handle) -> Result<(), OverlayError> {
        if let Some((&owner, _)) = self.sets.iter().find(|(_, hs)| hs.contains(&handle)) {
            return Err(OverlayError::DuplicateHandle(handle, owner));
        }
        self.sets.entry(category).or_default().push(handle);
        Ok(())
    }

    /// Place a marker on the surface with the category's visibility and track it
    pub fn insert(
        &mut self,
        category: Category,
        spec: MarkerSpec,
        surface: &mut dyn DisplaySurface,
    ) -> Handle {
        let handle = surface.add(category, spec, self.is_visible(category));
        self.sets.entry(category).or_default().push(handle);
        handle
    }

    pub fn is_visible(&self, category: Category) -> bool {
        self.visible.get(&category).copied().unwrap_or(true)
    }

    /// Show or hide a whole category without refetching anything
    pub fn set_visible(
        &mut self,
        category: Category,
        visible: bool,
        surface: &mut dyn DisplaySurface,
    ) {
        self.visible.insert(category, visible);
        for &handle in self.handles(category) {
            surface.set_visible(handle, visible);
        }
    }

    pub fn toggle(&mut self, category: Category, surface: &mut dyn DisplaySurface) -> bool {
        let visible = !self.is_visible(category);
        self.set_visible(category, visible, surface);
        visible
    }

    pub fn handles(&self, category: Category) -> &[Handle] {
        self.sets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, category: Category) -> usize {
        self.handles(category).len()
    }

    pub fn total(&self) -> usize {
        self.sets.values().map(Vec::len).sum()
    }
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
