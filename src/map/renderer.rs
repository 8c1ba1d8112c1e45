use glam::DVec2;

use crate::braille::BrailleCanvas;
use crate::land::{LandPolygon, LandPolygons};
use crate::map::geometry::{draw_circle, draw_line, draw_ring};
use crate::map::projection::Viewport;
use crate::map::scene::Scene;
use crate::overlay::{Category, MarkerSpec, Rgba};
use crate::region::Bounds;

/// One category's marker dots of a single colour
pub struct ColorLayer {
    pub category: Category,
    pub rgb: (u8, u8, u8),
    pub canvas: BrailleCanvas,
}

/// Rendered map, back to front
pub struct MapLayers {
    pub land: BrailleCanvas,
    pub bounds: BrailleCanvas,
    /// Marker layers, back to front by category
    pub markers: Vec<ColorLayer>,
}

impl MapLayers {
    fn new(width: usize, height: usize) -> Self {
        Self {
            land: BrailleCanvas::new(width, height),
            bounds: BrailleCanvas::new(width, height),
            markers: Vec::new(),
        }
    }

    fn layer(
        &mut self,
        category: Category,
        color: Rgba,
        width: usize,
        height: usize,
    ) -> &mut BrailleCanvas {
        let rgb = (color.r, color.g, color.b);
        let found = self
            .markers
            .iter()
            .position(|l| l.category == category && l.rgb == rgb);
        let idx = match found {
            Some(idx) => idx,
            None => {
                self.markers.push(ColorLayer {
                    category,
                    rgb,
                    canvas: BrailleCanvas::new(width, height),
                });
                self.markers.len() - 1
            }
        };
        &mut self.markers[idx].canvas
    }
}

/// Dot radius for a marker size given in screen pixels
pub fn marker_radius(size: f64) -> i32 {
    ((size / 6.0).round() as i32).clamp(1, 4)
}

#[derive(Clone, Debug)]
pub struct MapRenderer {
    pub show_land: bool,
    pub show_bounds: bool,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            show_land: true,
            show_bounds: true,
        }
    }

    pub fn toggle_land(&mut self) {
        self.show_land = !self.show_land;
    }

    pub fn toggle_bounds(&mut self) {
        self.show_bounds = !self.show_bounds;
    }

    /// Draw land outlines, the region frame and every visible marker.
    /// `width`/`height` are in characters; `viewport` is in dots.
    pub fn render(
        &self,
        width: usize,
        height: usize,
        viewport: &Viewport,
        land: Option<&LandPolygons>,
        region: Option<&Bounds>,
        scene: &Scene,
    ) -> MapLayers {
        let mut layers = MapLayers::new(width, height);

        if self.show_land {
            if let Some(land) = land {
                for polygon in land.polygons() {
                    draw_polygon(&mut layers.land, polygon, viewport);
                }
            }
        }

        if self.show_bounds {
            if let Some(b) = region {
                let corners = [
                    DVec2::new(b.min_lon, b.min_lat),
                    DVec2::new(b.min_lon, b.max_lat),
                    DVec2::new(b.max_lon, b.max_lat),
                    DVec2::new(b.max_lon, b.min_lat),
                ]
                .map(|c| viewport.project(c));
                draw_ring(&mut layers.bounds, &corners);
            }
        }

        // Scene yields markers back to front, so layers come out in category order
        for (category, spec) in scene.visible() {
            match spec {
                MarkerSpec::Polygon { corners, outline, .. } => {
                    let projected = corners.map(|c| viewport.project(c));
                    if projected
                        .iter()
                        .all(|&(x, y)| !viewport.is_visible(x, y))
                    {
                        continue;
                    }
                    draw_ring(layers.layer(category, *outline, width, height), &projected);
                }
                MarkerSpec::Point {
                    position,
                    size,
                    color,
                    ..
                } => {
                    let (px, py) = viewport.project(*position);
                    if viewport.is_visible(px, py) {
                        let canvas = layers.layer(category, *color, width, height);
                        draw_circle(canvas, px, py, marker_radius(*size));
                    }
                }
            }
        }

        layers
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_polygon(canvas: &mut BrailleCanvas, polygon: &LandPolygon, viewport: &Viewport) {
    let (min, max) = polygon.bbox();
    let a = viewport.project(DVec2::new(min.x, max.y));
    let b = viewport.project(DVec2::new(max.x, min.y));
    if !viewport.line_might_be_visible(a, b) {
        return;
    }
    draw_linestring(canvas, polygon.exterior(), viewport);
    for hole in polygon.holes() {
        draw_linestring(canvas, hole, viewport);
    }
}

/// Draw a line string with viewport culling
fn draw_linestring(canvas: &mut BrailleCanvas, line: &[DVec2], viewport: &Viewport) {
    if line.len() < 2 {
        return;
    }

    let mut prev: Option<(i32, i32)> = None;
    for &p in line {
        let (px, py) = viewport.project(p);
        if let Some((prev_x, prev_y)) = prev {
            let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
            if dist < viewport.width * 2 && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                draw_line(canvas, prev_x, prev_y, px, py);
            }
        }
        prev = Some((px, py));
    }
}
