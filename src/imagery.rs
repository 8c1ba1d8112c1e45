//! Per-date imagery layers kept in step with the timeline.

/// NOAA emergency-response imagery tiles
pub const NOAA_TEMPLATE: &str = "https://stormscdn.ngs.noaa.gov/{layer}/{z}/{x}/{y}";

#[derive(Clone, Debug, PartialEq)]
pub struct ImageryLayer {
    pub id: String,
    pub visible: bool,
    pub alpha: f32,
}

impl ImageryLayer {
    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> String {
        NOAA_TEMPLATE
            .replace("{layer}", &self.id)
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    pub fn credit(&self) -> String {
        format!("NOAA MAXAR {}", self.id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImageryStack {
    layers: Vec<ImageryLayer>,
}

impl ImageryStack {
    pub fn new(ids: &[String]) -> Self {
        let layers = ids
            .iter()
            .map(|id| ImageryLayer {
                id: id.clone(),
                visible: false,
                alpha: 0.0,
            })
            .collect();
        Self { layers }
    }

    /// Show only the layer for `index`; the first date is drawn opaque
    pub fn sync(&mut self, index: usize) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.visible = i == index;
            layer.alpha = match (i == index, i) {
                (true, 0) => 1.0,
                (true, _) => 0.7,
                (false, _) => 0.0,
            };
        }
    }

    pub fn active(&self) -> Option<&ImageryLayer> {
        self.layers.iter().find(|l| l.visible)
    }

    pub fn layers(&self) -> &[ImageryLayer] {
        &self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> ImageryStack {
        ImageryStack::new(&["a".to_string(), "b".to_string(), "c".to_string()])
    }

    #[test]
    fn test_sync_shows_single_layer() {
        let mut stack = stack();
        assert!(stack.active().is_none());

        stack.sync(1);
        let visible: Vec<&str> = stack
            .layers()
            .iter()
            .filter(|l| l.visible)
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(visible, vec!["b"]);
        assert_eq!(stack.active().map(|l| l.alpha), Some(0.7));
    }

    #[test]
    fn test_first_layer_opaque() {
        let mut stack = stack();
        stack.sync(0);
        assert_eq!(stack.active().map(|l| l.alpha), Some(1.0));
    }

    #[test]
    fn test_out_of_range_hides_all() {
        let mut stack = stack();
        stack.sync(7);
        assert!(stack.active().is_none());
    }

    #[test]
    fn test_tile_url() {
        let layer = ImageryLayer {
            id: "20250108m-maxar".to_string(),
            visible: true,
            alpha: 1.0,
        };
        assert_eq!(
            layer.tile_url(12, 700, 1630),
            "https://stormscdn.ngs.noaa.gov/20250108m-maxar/12/700/1630"
        );
        assert_eq!(layer.credit(), "NOAA MAXAR 20250108m-maxar");
    }
}
