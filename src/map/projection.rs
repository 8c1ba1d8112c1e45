use glam::DVec2;

use crate::region::Bounds;

const MIN_SPAN: f64 = 0.01;
const MAX_SPAN: f64 = 60.0;

/// Visible map area over a braille dot grid.
///
/// Plate carrée with longitude scaled by `cos(center_lat)`, which is close
/// enough at regional extents. Braille dots are roughly square, so one scale
/// serves both axes.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub center_lon: f64,
    pub center_lat: f64,
    /// Degrees of latitude per dot
    pub deg_per_px: f64,
    /// Canvas width in dots
    pub width: usize,
    /// Canvas height in dots
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, deg_per_px: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            deg_per_px,
            width,
            height,
        }
    }

    /// Centre on `bounds` at the largest scale that shows all of it
    pub fn fit(bounds: &Bounds, width: usize, height: usize) -> Self {
        let (center_lon, center_lat) = bounds.center();
        let lon_scale = center_lat.to_radians().cos().max(0.1);
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;
        let by_width = (bounds.max_lon - bounds.min_lon) * lon_scale / w;
        let by_height = (bounds.max_lat - bounds.min_lat) / h;
        let deg_per_px = (by_width.max(by_height) * 1.05).clamp(MIN_SPAN / w, MAX_SPAN / w);
        Self::new(center_lon, center_lat, deg_per_px, width, height)
    }

    fn lon_scale(&self) -> f64 {
        self.center_lat.to_radians().cos().max(0.1)
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.center_lon += dx as f64 * self.deg_per_px / self.lon_scale();
        self.center_lat -= dy as f64 * self.deg_per_px;
        self.center_lon = (self.center_lon + 180.0).rem_euclid(360.0) - 180.0;
        self.center_lat = self.center_lat.clamp(-85.0, 85.0);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(1.5);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(1.0 / 1.5);
    }

    fn zoom_by(&mut self, factor: f64) {
        let w = self.width.max(1) as f64;
        self.deg_per_px = (self.deg_per_px / factor).clamp(MIN_SPAN / w, MAX_SPAN / w);
    }

    /// Zoom keeping the point under `(px, py)` fixed
    pub fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let anchor = self.unproject(px, py);
        self.zoom_by(factor);
        let (nx, ny) = self.project(anchor);
        self.pan(nx - px, ny - py);
    }

    /// Dot coordinates back to `(lon, lat)`
    pub fn unproject(&self, px: i32, py: i32) -> DVec2 {
        let dx = px as f64 - self.width as f64 / 2.0;
        let dy = py as f64 - self.height as f64 / 2.0;
        DVec2::new(
            self.center_lon + dx * self.deg_per_px / self.lon_scale(),
            self.center_lat - dy * self.deg_per_px,
        )
    }

    /// `(lon, lat)` to dot coordinates
    pub fn project(&self, p: DVec2) -> (i32, i32) {
        let px = (p.x - self.center_lon) * self.lon_scale() / self.deg_per_px + self.width as f64 / 2.0;
        let py = (self.center_lat - p.y) / self.deg_per_px + self.height as f64 / 2.0;
        (px.round() as i32, py.round() as i32)
    }

    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Rough bounding-box check for a segment
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        p1.0.max(p2.0) >= 0
            && p1.0.min(p2.0) < self.width as i32
            && p1.1.max(p2.1) >= 0
            && p1.1.min(p2.1) < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(-118.5, 34.0, 0.01, 100, 80);
        assert_eq!(vp.project(DVec2::new(-118.5, 34.0)), (50, 40));
    }

    #[test]
    fn test_unproject_inverts_project() {
        let vp = Viewport::new(127.0, 36.0, 0.02, 200, 120);
        let p = DVec2::new(128.1, 35.3);
        let (px, py) = vp.project(p);
        let back = vp.unproject(px, py);
        assert!((back - p).abs().max_element() < 0.03);
    }

    #[test]
    fn test_fit_shows_region_bounds() {
        let region = Region::la();
        let vp = Viewport::fit(&region.bounds, 160, 96);
        let b = region.bounds;
        for corner in [
            DVec2::new(b.min_lon, b.min_lat),
            DVec2::new(b.max_lon, b.max_lat),
        ] {
            let (px, py) = vp.project(corner);
            assert!((0..=160).contains(&px) && (0..=96).contains(&py), "{corner:?} at {px},{py}");
        }
    }

    #[test]
    fn test_north_is_up_and_pan_moves_east() {
        let mut vp = Viewport::new(0.0, 0.0, 0.1, 100, 100);
        let (_, north) = vp.project(DVec2::new(0.0, 1.0));
        assert!(north < 50);
        vp.pan(10, 0);
        assert!(vp.center_lon > 0.0);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut vp = Viewport::new(-118.5, 34.0, 0.01, 200, 200);
        let anchor = vp.unproject(150, 60);
        vp.zoom_at(150, 60, 1.5);
        let (px, py) = vp.project(anchor);
        assert!((px - 150).abs() <= 1 && (py - 60).abs() <= 1);
    }
}
