mod geometry;
mod projection;
mod renderer;
mod scene;

pub use projection::Viewport;
pub use renderer::{ColorLayer, MapLayers, MapRenderer};
pub use scene::Scene;
