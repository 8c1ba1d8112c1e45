//! Land/sea classification against a polygon boundary dataset.

use std::sync::Arc;

use anyhow::Result;
use geojson::{GeoJson, Geometry, Value};
use glam::DVec2;
use rayon::prelude::*;

/// One land polygon: exterior ring plus holes, with a bbox for early rejection
#[derive(Clone, Debug)]
pub struct LandPolygon {
    exterior: Vec<DVec2>,
    holes: Vec<Vec<DVec2>>,
    min: DVec2,
    max: DVec2,
}

impl LandPolygon {
    pub fn new(exterior: Vec<DVec2>, holes: Vec<Vec<DVec2>>) -> Self {
        let (min, max) = exterior.iter().fold(
            (DVec2::splat(f64::MAX), DVec2::splat(f64::MIN)),
            |(min, max), p| (min.min(*p), max.max(*p)),
        );
        Self {
            exterior,
            holes,
            min,
            max,
        }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        if p.x < self.min.x || p.x > self.max.x || p.y < self.min.y || p.y > self.max.y {
            return false;
        }
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }

    pub fn exterior(&self) -> &[DVec2] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<DVec2>] {
        &self.holes
    }

    /// `(min, max)` corners
    pub fn bbox(&self) -> (DVec2, DVec2) {
        (self.min, self.max)
    }
}

/// Even-odd ray cast. Rings with fewer than three vertices contain nothing.
fn ring_contains(ring: &[DVec2], p: DVec2) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A loaded boundary dataset
#[derive(Clone, Debug, Default)]
pub struct LandPolygons {
    polygons: Vec<LandPolygon>,
}

impl LandPolygons {
    pub fn new(polygons: Vec<LandPolygon>) -> Self {
        Self { polygons }
    }

    /// Parse a GeoJSON document; non-polygon geometries are ignored
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        let geojson: GeoJson = text.parse()?;
        Ok(Self::from_geojson(&geojson))
    }

    pub fn from_geojson(geojson: &GeoJson) -> Self {
        let mut polygons = Vec::new();
        match geojson {
            GeoJson::FeatureCollection(fc) => {
                for feature in &fc.features {
                    if let Some(ref geometry) = feature.geometry {
                        collect_polygons(geometry, &mut polygons);
                    }
                }
            }
            GeoJson::Feature(f) => {
                if let Some(ref geometry) = f.geometry {
                    collect_polygons(geometry, &mut polygons);
                }
            }
            GeoJson::Geometry(geometry) => collect_polygons(geometry, &mut polygons),
        }
        Self { polygons }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    pub fn polygons(&self) -> &[LandPolygon] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

fn to_ring(coords: &[Vec<f64>]) -> Vec<DVec2> {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| DVec2::new(c[0], c[1]))
        .collect()
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<LandPolygon> {
    let (exterior, holes) = rings.split_first()?;
    Some(LandPolygon::new(
        to_ring(exterior),
        holes.iter().map(|h| to_ring(h)).collect(),
    ))
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<LandPolygon>) {
    match &geometry.value {
        Value::Polygon(rings) => out.extend(to_polygon(rings)),
        Value::MultiPolygon(polygons) => {
            out.extend(polygons.iter().filter_map(|rings| to_polygon(rings)));
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

/// Shared land filter. Until a dataset is loaded every point counts as land,
/// so an early query never hides data. A reload swaps the whole dataset.
#[derive(Clone, Debug, Default)]
pub struct LandFilter {
    polygons: Option<Arc<LandPolygons>>,
}

impl LandFilter {
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn loaded(polygons: LandPolygons) -> Self {
        Self {
            polygons: Some(Arc::new(polygons)),
        }
    }

    pub fn replace(&mut self, polygons: LandPolygons) {
        self.polygons = Some(Arc::new(polygons));
    }

    pub fn is_loaded(&self) -> bool {
        self.polygons.is_some()
    }

    pub fn is_land(&self, p: DVec2) -> bool {
        match &self.polygons {
            Some(polygons) => polygons.contains(p),
            None => true,
        }
    }

    /// Classify many points in parallel; output order matches input order
    pub fn classify(&self, points: &[DVec2]) -> Vec<bool> {
        match &self.polygons {
            Some(polygons) => points.par_iter().map(|p| polygons.contains(*p)).collect(),
            None => vec![true; points.len()],
        }
    }

    /// Current dataset, for drawing coastlines
    pub fn snapshot(&self) -> Option<Arc<LandPolygons>> {
        self.polygons.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISLAND: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                        [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20.0, 0.0], [22.0, 0.0], [22.0, 2.0], [20.0, 2.0], [20.0, 0.0]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "LineString", "coordinates": [[50.0, 50.0], [60.0, 60.0]] }
            }
        ]
    }"#;

    fn island() -> LandPolygons {
        LandPolygons::parse(ISLAND.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_polygons_only() {
        assert_eq!(island().len(), 2);
    }

    #[test]
    fn test_containment_and_holes() {
        let land = island();
        assert!(land.contains(DVec2::new(1.0, 1.0)));
        assert!(land.contains(DVec2::new(21.0, 1.0)));
        assert!(!land.contains(DVec2::new(5.0, 5.0)), "inside hole is sea");
        assert!(!land.contains(DVec2::new(15.0, 5.0)));
        assert!(!land.contains(DVec2::new(-1.0, 5.0)));
    }

    #[test]
    fn test_unloaded_fails_open() {
        let filter = LandFilter::unloaded();
        assert!(!filter.is_loaded());
        assert!(filter.is_land(DVec2::new(-150.0, -80.0)));
        assert!(filter.is_land(DVec2::new(5.0, 5.0)));
        assert_eq!(filter.classify(&[DVec2::ZERO, DVec2::ONE]), vec![true, true]);
    }

    #[test]
    fn test_classify_preserves_order() {
        let filter = LandFilter::loaded(island());
        let points = [
            DVec2::new(1.0, 1.0),
            DVec2::new(15.0, 5.0),
            DVec2::new(21.0, 1.0),
            DVec2::new(5.0, 5.0),
        ];
        assert_eq!(filter.classify(&points), vec![true, false, true, false]);
    }

    #[test]
    fn test_replace_swaps_dataset() {
        let mut filter = LandFilter::loaded(island());
        let old = filter.snapshot().unwrap();
        assert!(filter.is_land(DVec2::new(1.0, 1.0)));

        filter.replace(LandPolygons::default());
        assert!(!filter.is_land(DVec2::new(1.0, 1.0)));
        // Readers holding the old snapshot keep a consistent view
        assert!(old.contains(DVec2::new(1.0, 1.0)));
    }

    #[test]
    fn test_degenerate_ring() {
        let poly = LandPolygon::new(vec![DVec2::ZERO, DVec2::ONE], Vec::new());
        assert!(!poly.contains(DVec2::new(0.5, 0.5)));
    }
}
