//! Per-date grid fire predictions: parsing, dedup, sea filtering and markers.

use std::collections::HashSet;

use glam::DVec2;
use simd_json::prelude::*;
use tracing::{debug, info};

use crate::grid::GridCell;
use crate::land::LandFilter;
use crate::overlay::{Category, DisplaySurface, MarkerSpec, OverlayRegistry, Rgba};
use crate::region::Region;

/// A grid cell tagged with a fire probability, as read from a prediction file
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionPoint {
    pub grid_id: String,
    pub probability: f64,
}

/// Colour tier of a probability. Boundaries are exclusive: 0.8 is medium, 0.5 is low.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbabilityTier {
    High,
    Medium,
    Low,
}

impl ProbabilityTier {
    pub fn of(probability: f64) -> Self {
        if probability > 0.8 {
            ProbabilityTier::High
        } else if probability > 0.5 {
            ProbabilityTier::Medium
        } else {
            ProbabilityTier::Low
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            ProbabilityTier::High => Rgba::new(220, 20, 60, 0.9),
            ProbabilityTier::Medium => Rgba::ORANGE.with_alpha(0.8),
            ProbabilityTier::Low => Rgba::YELLOW.with_alpha(0.6),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProbabilityTier::High => "high",
            ProbabilityTier::Medium => "medium",
            ProbabilityTier::Low => "low",
        }
    }
}

/// Point marker size in pixels, growing with probability
pub fn point_size(probability: f64) -> f64 {
    6.0 + 8.0 * probability.clamp(0.0, 1.0)
}

/// Parse a prediction document. Anything that is not a list yields no points;
/// entries without an id or a numeric probability are skipped.
pub fn parse_batch(bytes: &mut [u8]) -> Result<Vec<PredictionPoint>, simd_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let value = simd_json::to_owned_value(bytes)?;
    let Some(entries) = value.as_array() else {
        debug!("prediction document is not a list");
        return Ok(Vec::new());
    };

    let points = entries
        .iter()
        .filter_map(|entry| {
            let grid_id = entry
                .get("grid_id")
                .or_else(|| entry.get("grid_cell"))
                .and_then(|v| v.as_str())?;
            let probability = entry.get("probability").and_then(|v| v.cast_f64())?;
            probability.is_finite().then(|| PredictionPoint {
                grid_id: grid_id.to_string(),
                probability,
            })
        })
        .collect();
    Ok(points)
}

/// A prediction that survived dedup and the land check
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedCell {
    pub grid_id: String,
    pub probability: f64,
    pub tier: ProbabilityTier,
    pub center: DVec2,
    pub corners: [DVec2; 4],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub input: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub sea: usize,
    pub kept: usize,
}

#[derive(Clone, Debug, Default)]
pub struct PreparedBatch {
    pub cells: Vec<PreparedCell>,
    pub stats: BatchStats,
}

/// Resolve ids to geography, keep the first occurrence of each id, drop sea cells
pub fn prepare(points: &[PredictionPoint], region: &Region, land: &LandFilter) -> PreparedBatch {
    let mut stats = BatchStats {
        input: points.len(),
        ..BatchStats::default()
    };
    let mut seen: HashSet<&str> = HashSet::with_capacity(points.len());
    let mut candidates = Vec::with_capacity(points.len());

    for point in points {
        let cell = match GridCell::parse(&point.grid_id) {
            Ok(cell) => cell,
            Err(e) => {
                debug!("skipping prediction: {e}");
                stats.invalid += 1;
                continue;
            }
        };
        if !seen.insert(point.grid_id.as_str()) {
            stats.duplicates += 1;
            continue;
        }
        candidates.push(PreparedCell {
            grid_id: point.grid_id.clone(),
            probability: point.probability,
            tier: ProbabilityTier::of(point.probability),
            center: cell.center(region),
            corners: cell.bounds(region),
        });
    }

    let centers: Vec<DVec2> = candidates.iter().map(|c| c.center).collect();
    let on_land = land.classify(&centers);

    let cells: Vec<PreparedCell> = candidates
        .into_iter()
        .zip(on_land)
        .filter_map(|(cell, keep)| keep.then_some(cell))
        .collect();

    stats.sea = centers.len() - cells.len();
    stats.kept = cells.len();
    PreparedBatch { cells, stats }
}

pub fn point_marker(cell: &PreparedCell) -> MarkerSpec {
    MarkerSpec::Point {
        position: cell.center,
        size: point_size(cell.probability),
        color: cell.tier.color(),
        outline: Some(Rgba::BLACK),
        label: format!("{} {:.2}", cell.grid_id, cell.probability),
    }
}

pub fn cell_marker(cell: &PreparedCell) -> MarkerSpec {
    MarkerSpec::Polygon {
        corners: cell.corners,
        fill: cell.tier.color().with_alpha(0.35),
        outline: cell.tier.color(),
    }
}

/// Drop every prediction and grid marker currently shown
pub fn clear(registry: &mut OverlayRegistry, surface: &mut dyn DisplaySurface) {
    registry.clear(Category::Predicted, surface);
    registry.clear(Category::Grid, surface);
}

/// Replace the shown predictions with `batch`. Returns the number of cells drawn.
pub fn apply(
    batch: &PreparedBatch,
    registry: &mut OverlayRegistry,
    surface: &mut dyn DisplaySurface,
) -> usize {
    clear(registry, surface);
    for cell in &batch.cells {
        registry.insert(Category::Predicted, point_marker(cell), surface);
        registry.insert(Category::Grid, cell_marker(cell), surface);
    }
    info!(
        kept = batch.stats.kept,
        duplicates = batch.stats.duplicates,
        sea = batch.stats.sea,
        invalid = batch.stats.invalid,
        "predictions applied"
    );
    batch.cells.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::land::{LandPolygon, LandPolygons};
    use crate::map::Scene;

    fn points(raw: &[(&str, f64)]) -> Vec<PredictionPoint> {
        raw.iter()
            .map(|&(id, p)| PredictionPoint {
                grid_id: id.to_string(),
                probability: p,
            })
            .collect()
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ProbabilityTier::of(0.81), ProbabilityTier::High);
        assert_eq!(ProbabilityTier::of(0.8), ProbabilityTier::Medium);
        assert_eq!(ProbabilityTier::of(0.51), ProbabilityTier::Medium);
        assert_eq!(ProbabilityTier::of(0.5), ProbabilityTier::Low);
        assert_eq!(ProbabilityTier::of(0.0), ProbabilityTier::Low);
    }

    #[test]
    fn test_point_size_monotonic() {
        assert!(point_size(0.9) > point_size(0.6));
        assert!(point_size(0.6) > point_size(0.1));
        assert_eq!(point_size(2.0), point_size(1.0));
    }

    #[test]
    fn test_parse_batch() {
        let mut doc = br#"[
            {"grid_id": "l_1_2", "probability": 0.91},
            {"grid_id": "l_1_3", "probability": 1},
            {"grid_id": "l_1_4"},
            {"probability": 0.3},
            {"grid_cell": "l_2_2", "probability": 0.4}
        ]"#
        .to_vec();
        let batch = parse_batch(&mut doc).unwrap();
        assert_eq!(
            batch,
            points(&[("l_1_2", 0.91), ("l_1_3", 1.0), ("l_2_2", 0.4)])
        );
    }

    #[test]
    fn test_parse_non_list_is_empty() {
        assert!(parse_batch(&mut br#"{"grid_id": "l_1_2"}"#.to_vec()).unwrap().is_empty());
        assert!(parse_batch(&mut b"[]".to_vec()).unwrap().is_empty());
        assert!(parse_batch(&mut b"  \n".to_vec()).unwrap().is_empty());
        assert!(parse_batch(&mut b"[{".to_vec()).is_err());
    }

    #[test]
    fn test_first_seen_wins() {
        let region = Region::la();
        let batch = prepare(
            &points(&[("l_1_1", 0.9), ("l_1_1", 0.1), ("l_2_2", 0.5)]),
            &region,
            &LandFilter::unloaded(),
        );
        assert_eq!(batch.cells.len(), 2);
        assert_eq!(batch.cells[0].grid_id, "l_1_1");
        assert_eq!(batch.cells[0].probability, 0.9);
        assert_eq!(batch.stats.duplicates, 1);
    }

    #[test]
    fn test_invalid_ids_skipped_not_fatal() {
        let region = Region::la();
        let batch = prepare(
            &points(&[("garbage", 0.9), ("l_x_1", 0.9), ("l_3_3", 0.7)]),
            &region,
            &LandFilter::unloaded(),
        );
        assert_eq!(batch.stats.invalid, 2);
        assert_eq!(batch.cells.len(), 1);
        assert_eq!(batch.cells[0].tier, ProbabilityTier::Medium);
    }

    #[test]
    fn test_sea_cells_dropped() {
        let region = Region::la();
        // Land covers only the first column of cells
        let strip = LandPolygon::new(
            vec![
                DVec2::new(-119.0, 33.0),
                DVec2::new(-118.95, 33.0),
                DVec2::new(-118.95, 35.0),
                DVec2::new(-119.0, 35.0),
            ],
            Vec::new(),
        );
        let land = LandFilter::loaded(LandPolygons::new(vec![strip]));
        let batch = prepare(
            &points(&[("l_0_0", 0.9), ("l_0_5", 0.9), ("l_4_0", 0.2)]),
            &region,
            &land,
        );
        let ids: Vec<&str> = batch.cells.iter().map(|c| c.grid_id.as_str()).collect();
        assert_eq!(ids, vec!["l_0_0", "l_4_0"]);
        assert_eq!(batch.stats.sea, 1);
    }

    #[test]
    fn test_apply_replaces_previous_markers() {
        let region = Region::la();
        let land = LandFilter::unloaded();
        let mut scene = Scene::new();
        let mut registry = OverlayRegistry::new();

        let first = prepare(&points(&[("l_1_1", 0.9), ("l_1_2", 0.6)]), &region, &land);
        assert_eq!(apply(&first, &mut registry, &mut scene), 2);
        assert_eq!(registry.len(Category::Predicted), 2);
        assert_eq!(registry.len(Category::Grid), 2);
        assert_eq!(scene.len(), 4);

        let second = prepare(&points(&[("l_5_5", 0.3)]), &region, &land);
        apply(&second, &mut registry, &mut scene);
        assert_eq!(registry.len(Category::Predicted), 1);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_markers_share_tier_colour() {
        let region = Region::la();
        let batch = prepare(&points(&[("l_1_1", 0.95)]), &region, &LandFilter::unloaded());
        let cell = &batch.cells[0];
        match (point_marker(cell), cell_marker(cell)) {
            (MarkerSpec::Point { color, .. }, MarkerSpec::Polygon { outline, .. }) => {
                assert_eq!(color, outline);
                assert_eq!(color, ProbabilityTier::High.color());
            }
            other => panic!("unexpected markers {other:?}"),
        }
    }
}
