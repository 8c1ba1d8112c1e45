//! Date-indexed wildfire overlays: grid-cell fire predictions and observed
//! fire records drawn over a map, stepped through a playback timeline.

pub mod braille;
pub mod conditions;
pub mod config;
pub mod fetch;
pub mod grid;
pub mod hash;
pub mod imagery;
pub mod land;
pub mod map;
pub mod observations;
pub mod overlay;
pub mod predictions;
pub mod region;
pub mod session;
pub mod timeline;
