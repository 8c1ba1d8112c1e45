//! Observed fire records: decoding heterogeneous datasets, exact-date
//! filtering and marker encoding.

use chrono::NaiveDate;
use glam::DVec2;
use simd_json::prelude::*;
use simd_json::OwnedValue;
use tracing::{debug, info};

use crate::hash;
use crate::overlay::{Category, DisplaySurface, MarkerSpec, OverlayRegistry, Rgba};
use crate::region::ObservationKind;

/// Candidate field names per attribute, tried in order; the first non-null wins.
struct FieldTable {
    timestamp: &'static [&'static str],
    lat: &'static [&'static str],
    lon: &'static [&'static str],
    confidence: &'static [&'static str],
    frp: &'static [&'static str],
    brightness: &'static [&'static str],
    satellite: &'static [&'static str],
    stage: &'static [&'static str],
    status: &'static [&'static str],
    address: &'static [&'static str],
}

const FIELDS: FieldTable = FieldTable {
    timestamp: &["acq_date", "frfr_frng_dtm", "frfr_sttmn_dt", "start", "date"],
    lat: &["latitude", "lat", "frfr_lctn_ycrd"],
    lon: &["longitude", "lon", "frfr_lctn_xcrd"],
    confidence: &["confidence"],
    frp: &["frp"],
    brightness: &["brightness"],
    satellite: &["satellite"],
    stage: &["frfr_step_issu_cd", "level"],
    status: &["frfr_prgrs_stcd_str", "status"],
    address: &["frfr_sttmn_addr", "frfr_sttm_addr", "address"],
};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Satellite markers are nudged by up to half this many degrees to separate co-located detections
const JITTER_SPAN: f64 = 0.015;

fn first_field<'a>(record: &'a OwnedValue, names: &[&str]) -> Option<&'a OwnedValue> {
    names
        .iter()
        .filter_map(|name| record.get(*name))
        .find(|v| !v.is_null())
}

/// JSON number or numeric string
fn number(value: &OwnedValue) -> Option<f64> {
    value
        .cast_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|v: &f64| v.is_finite())
}

fn text(value: &OwnedValue) -> Option<String> {
    match value.as_str() {
        Some(s) => Some(s.to_string()),
        None => value.cast_f64().map(|n| n.to_string()),
    }
}

/// Calendar day of a date or timestamp string; the time part after a space or `T` is ignored
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    High,
    Nominal,
    Low,
}

impl Confidence {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "h" | "high" => Confidence::High,
            "n" | "nominal" => Confidence::Nominal,
            _ => Confidence::Low,
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            Confidence::High => Rgba::RED.with_alpha(0.8),
            Confidence::Nominal => Rgba::ORANGE.with_alpha(0.8),
            Confidence::Low => Rgba::YELLOW.with_alpha(0.7),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Nominal => "nominal",
            Confidence::Low => "low",
        }
    }
}

/// Incident response stage, escalating from initial response to stage 3
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseStage {
    Initial,
    Stage1,
    Stage2,
    Stage3,
    Unknown,
}

impl ResponseStage {
    pub const KNOWN: [ResponseStage; 4] = [
        ResponseStage::Initial,
        ResponseStage::Stage1,
        ResponseStage::Stage2,
        ResponseStage::Stage3,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "초기대응" | "initial" => ResponseStage::Initial,
            "1단계" | "stage1" => ResponseStage::Stage1,
            "2단계" | "stage2" => ResponseStage::Stage2,
            "3단계" | "stage3" => ResponseStage::Stage3,
            _ => ResponseStage::Unknown,
        }
    }

    /// Pixel size and colour
    pub fn style(self) -> (f64, Rgba) {
        match self {
            ResponseStage::Initial => (12.0, Rgba::YELLOW.with_alpha(0.8)),
            ResponseStage::Stage1 => (18.0, Rgba::ORANGE.with_alpha(0.85)),
            ResponseStage::Stage2 => (22.0, Rgba::new(255, 102, 102, 0.9)),
            ResponseStage::Stage3 => (26.0, Rgba::new(128, 0, 128, 1.0)),
            ResponseStage::Unknown => (12.0, Rgba::GRAY.with_alpha(0.6)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResponseStage::Initial => "initial",
            ResponseStage::Stage1 => "stage 1",
            ResponseStage::Stage2 => "stage 2",
            ResponseStage::Stage3 => "stage 3",
            ResponseStage::Unknown => "unclassified",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObservationDetail {
    Satellite {
        confidence: Confidence,
        frp: Option<f64>,
        brightness: Option<f64>,
        satellite: Option<String>,
    },
    Incident {
        stage: ResponseStage,
        status: Option<String>,
        address: Option<String>,
    },
}

/// One decoded record. `date` or `position` is `None` when the source field
/// was missing or unparseable; such records never render.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub timestamp: Option<String>,
    pub date: Option<NaiveDate>,
    pub position: Option<DVec2>,
    pub detail: ObservationDetail,
}

impl Observation {
    pub fn decode(record: &OwnedValue, kind: ObservationKind) -> Self {
        let timestamp = first_field(record, FIELDS.timestamp).and_then(text);
        let date = timestamp.as_deref().and_then(normalize_date);
        let lat = first_field(record, FIELDS.lat).and_then(number);
        let lon = first_field(record, FIELDS.lon).and_then(number);
        let position = match (lon, lat) {
            (Some(lon), Some(lat)) => Some(DVec2::new(lon, lat)),
            _ => None,
        };

        let detail = match kind {
            ObservationKind::Satellite => ObservationDetail::Satellite {
                confidence: first_field(record, FIELDS.confidence)
                    .and_then(text)
                    .map(|c| Confidence::parse(&c))
                    .unwrap_or(Confidence::Low),
                frp: first_field(record, FIELDS.frp).and_then(number),
                brightness: first_field(record, FIELDS.brightness).and_then(number),
                satellite: first_field(record, FIELDS.satellite).and_then(text),
            },
            ObservationKind::Incident => ObservationDetail::Incident {
                stage: first_field(record, FIELDS.stage)
                    .and_then(text)
                    .map(|s| ResponseStage::parse(&s))
                    .unwrap_or(ResponseStage::Unknown),
                status: first_field(record, FIELDS.status).and_then(text),
                address: first_field(record, FIELDS.address).and_then(text),
            },
        };

        Self {
            timestamp,
            date,
            position,
            detail,
        }
    }

    /// `HH:MM` part of the timestamp, if it has one
    pub fn time_of_day(&self) -> Option<&str> {
        let ts = self.timestamp.as_deref()?;
        let (_, time) = ts.split_once([' ', 'T'])?;
        time.get(..5)
    }

    pub fn stage(&self) -> Option<ResponseStage> {
        match self.detail {
            ObservationDetail::Incident { stage, .. } => Some(stage),
            ObservationDetail::Satellite { .. } => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match &self.detail {
            ObservationDetail::Incident { status, .. } => status.as_deref(),
            ObservationDetail::Satellite { .. } => None,
        }
    }

    /// Size and colour for this record's marker
    pub fn style(&self) -> (f64, Rgba) {
        match &self.detail {
            ObservationDetail::Satellite {
                confidence, frp, ..
            } => {
                let size = (frp.unwrap_or(0.0) / 8.0).clamp(8.0, 20.0);
                (size, confidence.color())
            }
            ObservationDetail::Incident { stage, .. } => stage.style(),
        }
    }
}

/// Extra constraints applied after the date match
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationFilter {
    pub stage: Option<ResponseStage>,
    pub status: Option<String>,
}

impl ObservationFilter {
    pub fn accepts(&self, obs: &Observation) -> bool {
        if let Some(stage) = self.stage {
            if obs.stage() != Some(stage) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if obs.status() != Some(status.as_str()) {
                return false;
            }
        }
        true
    }

    /// Step the stage constraint: none → initial → … → stage 3 → none
    pub fn cycle_stage(&mut self) {
        self.stage = match self.stage {
            None => Some(ResponseStage::Initial),
            Some(ResponseStage::Initial) => Some(ResponseStage::Stage1),
            Some(ResponseStage::Stage1) => Some(ResponseStage::Stage2),
            Some(ResponseStage::Stage2) => Some(ResponseStage::Stage3),
            Some(_) => None,
        };
    }
}

/// A region's full observation dataset, decoded once per load
#[derive(Clone, Debug)]
pub struct ObservationDataset {
    pub kind: ObservationKind,
    records: Vec<Observation>,
}

impl ObservationDataset {
    pub fn new(kind: ObservationKind, records: Vec<Observation>) -> Self {
        Self { kind, records }
    }

    /// Parse a list document. A non-list document is an empty dataset.
    pub fn parse(bytes: &mut [u8], kind: ObservationKind) -> Result<Self, simd_json::Error> {
        let value = simd_json::to_owned_value(bytes)?;
        let records = value
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|record| Observation::decode(record, kind))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { kind, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    pub fn get(&self, idx: usize) -> Option<&Observation> {
        self.records.get(idx)
    }

    /// Indices of records on `date` with a valid position that pass `filter`
    pub fn matching(&self, date: NaiveDate, filter: &ObservationFilter) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, obs)| obs.date == Some(date))
            .filter(|(_, obs)| obs.position.is_some())
            .filter(|(_, obs)| filter.accepts(obs))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Per-stage counts of the records on `date` that pass `filter`, in
    /// `ResponseStage::KNOWN` order. Unclassified records are not counted.
    pub fn stage_counts(
        &self,
        date: NaiveDate,
        filter: &ObservationFilter,
    ) -> [(ResponseStage, usize); 4] {
        let mut counts = ResponseStage::KNOWN.map(|stage| (stage, 0));
        for idx in self.matching(date, filter) {
            let Some(stage) = self.records[idx].stage() else {
                continue;
            };
            if let Some(entry) = counts.iter_mut().find(|(s, _)| *s == stage) {
                entry.1 += 1;
            }
        }
        counts
    }

    /// Statuses present in the dataset, sorted
    pub fn statuses(&self) -> Vec<String> {
        let mut statuses: Vec<String> = self
            .records
            .iter()
            .filter_map(|obs| obs.status().map(str::to_string))
            .collect();
        statuses.sort();
        statuses.dedup();
        statuses
    }
}

pub fn marker(obs: &Observation, position: DVec2) -> MarkerSpec {
    let (size, color) = obs.style();
    MarkerSpec::Point {
        position,
        size,
        color,
        outline: Some(Rgba::BLACK),
        label: obs.timestamp.clone().unwrap_or_default(),
    }
}

/// Replace the observed markers with the records for `date`. Returns the
/// indices of the rendered records, in dataset order.
pub fn render(
    dataset: &ObservationDataset,
    date: NaiveDate,
    filter: &ObservationFilter,
    seed: u64,
    registry: &mut OverlayRegistry,
    surface: &mut dyn DisplaySurface,
) -> Vec<usize> {
    registry.clear(Category::Observed, surface);

    let matching = dataset.matching(date, filter);
    for &idx in &matching {
        let obs = &dataset.records[idx];
        let Some(position) = obs.position else {
            continue;
        };
        let position = match dataset.kind {
            // Per-record seed so identical coordinates still separate
            ObservationKind::Satellite => {
                hash::jitter(position, hash::hash3(seed, idx as u64, 0), JITTER_SPAN)
            }
            ObservationKind::Incident => position,
        };
        registry.insert(Category::Observed, marker(obs, position), surface);
    }

    debug!(%date, total = dataset.len(), "observation filter pass");
    info!(%date, rendered = matching.len(), "observations rendered");
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Scene;

    const FIRMS: &str = r#"[
        {"latitude": 34.1, "longitude": -118.5, "acq_date": "2025-01-08", "confidence": "h", "frp": 200.0},
        {"latitude": 34.2, "longitude": -118.6, "acq_date": "2025-01-08", "confidence": "n", "frp": "12.5"},
        {"latitude": "bad", "longitude": -118.6, "acq_date": "2025-01-08", "confidence": "l"},
        {"latitude": 34.3, "longitude": -118.7, "acq_date": "2025-01-09", "confidence": "l", "frp": 1}
    ]"#;

    const INCIDENTS: &str = r#"[
        {"frfr_frng_dtm": "2025-02-03 14:25:00", "frfr_lctn_ycrd": "36.5", "frfr_lctn_xcrd": "127.9",
         "frfr_step_issu_cd": "2단계", "frfr_prgrs_stcd_str": "진화완료", "frfr_sttmn_addr": "충북 괴산군"},
        {"frfr_frng_dtm": "2025-02-03T09:10:00", "frfr_lctn_ycrd": 35.1, "frfr_lctn_xcrd": 128.7,
         "frfr_step_issu_cd": "기타", "frfr_prgrs_stcd_str": "진화중"},
        {"date": "20250203", "lat": 37.0, "lon": 127.0, "level": "초기대응"},
        {"frfr_frng_dtm": null, "start": "2025/02/04 10:00", "lat": 37.1, "lon": 127.1}
    ]"#;

    fn dataset(doc: &str, kind: ObservationKind) -> ObservationDataset {
        ObservationDataset::parse(&mut doc.as_bytes().to_vec(), kind).unwrap()
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_normalize_date_variants() {
        assert_eq!(normalize_date("2025-01-08"), Some(day(1, 8)));
        assert_eq!(normalize_date("2025-01-08 23:59:00"), Some(day(1, 8)));
        assert_eq!(normalize_date("2025-01-08T01:00:00Z"), Some(day(1, 8)));
        assert_eq!(normalize_date("20250108"), Some(day(1, 8)));
        assert_eq!(normalize_date("2025/01/08 10:00"), Some(day(1, 8)));
        assert_eq!(normalize_date("2025.01.08"), Some(day(1, 8)));
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_satellite_exact_date_match() {
        let data = dataset(FIRMS, ObservationKind::Satellite);
        assert_eq!(data.len(), 4);
        // The record with a non-numeric latitude is skipped and not counted
        assert_eq!(data.matching(day(1, 8), &ObservationFilter::default()), vec![0, 1]);
        assert_eq!(data.matching(day(1, 9), &ObservationFilter::default()), vec![3]);
        assert!(data.matching(day(1, 10), &ObservationFilter::default()).is_empty());
    }

    #[test]
    fn test_satellite_style() {
        let data = dataset(FIRMS, ObservationKind::Satellite);
        let (size, color) = data.records()[0].style();
        assert_eq!(size, 20.0);
        assert_eq!(color, Confidence::High.color());
        let (size, color) = data.records()[1].style();
        assert_eq!(size, 8.0);
        assert_eq!(color, Confidence::Nominal.color());
        let (_, color) = data.records()[2].style();
        assert_eq!(color, Confidence::Low.color());
    }

    #[test]
    fn test_incident_fields_and_fallbacks() {
        let data = dataset(INCIDENTS, ObservationKind::Incident);
        let first = &data.records()[0];
        assert_eq!(first.date, Some(day(2, 3)));
        assert_eq!(first.position, Some(DVec2::new(127.9, 36.5)));
        assert_eq!(first.stage(), Some(ResponseStage::Stage2));
        assert_eq!(first.time_of_day(), Some("14:25"));
        assert_eq!(first.style(), ResponseStage::Stage2.style());

        let unknown = &data.records()[1];
        assert_eq!(unknown.stage(), Some(ResponseStage::Unknown));
        assert_eq!(unknown.style().0, 12.0);

        let third = &data.records()[2];
        assert_eq!(third.date, Some(day(2, 3)));
        assert_eq!(third.stage(), Some(ResponseStage::Initial));

        // Null fields fall through to the next candidate name
        assert_eq!(data.records()[3].date, Some(day(2, 4)));
    }

    #[test]
    fn test_stage_sizes_escalate() {
        let sizes: Vec<f64> = ResponseStage::KNOWN.iter().map(|s| s.style().0).collect();
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
        assert!(ResponseStage::Unknown.style().0 <= sizes[0]);
    }

    #[test]
    fn test_filter_stage_and_status() {
        let data = dataset(INCIDENTS, ObservationKind::Incident);
        let mut filter = ObservationFilter::default();
        assert_eq!(data.matching(day(2, 3), &filter), vec![0, 1, 2]);

        filter.stage = Some(ResponseStage::Stage2);
        assert_eq!(data.matching(day(2, 3), &filter), vec![0]);

        filter.stage = None;
        filter.status = Some("진화중".to_string());
        assert_eq!(data.matching(day(2, 3), &filter), vec![1]);
        assert_eq!(data.statuses(), vec!["진화완료".to_string(), "진화중".to_string()]);
    }

    #[test]
    fn test_cycle_stage_wraps() {
        let mut filter = ObservationFilter::default();
        for _ in 0..5 {
            filter.cycle_stage();
        }
        assert_eq!(filter.stage, None);
    }

    #[test]
    fn test_render_replaces_markers() {
        let data = dataset(FIRMS, ObservationKind::Satellite);
        let filter = ObservationFilter::default();
        let mut scene = Scene::new();
        let mut registry = OverlayRegistry::new();

        let shown = render(&data, day(1, 8), &filter, 1, &mut registry, &mut scene);
        assert_eq!(shown.len(), 2);
        assert_eq!(registry.len(Category::Observed), 2);

        let shown = render(&data, day(1, 20), &filter, 2, &mut registry, &mut scene);
        assert!(shown.is_empty());
        assert_eq!(registry.len(Category::Observed), 0);
        assert_eq!(scene.len(), 0);
    }

    #[test]
    fn test_colocated_detections_separate() {
        let doc = r#"[
            {"latitude": 34.1, "longitude": -118.5, "acq_date": "2025-01-08", "confidence": "h"},
            {"latitude": 34.1, "longitude": -118.5, "acq_date": "2025-01-08", "confidence": "h"}
        ]"#;
        let data = dataset(doc, ObservationKind::Satellite);
        let mut scene = Scene::new();
        let mut registry = OverlayRegistry::new();
        render(&data, day(1, 8), &ObservationFilter::default(), 1, &mut registry, &mut scene);

        let positions: Vec<DVec2> = scene
            .visible()
            .filter_map(|(_, spec)| match spec {
                MarkerSpec::Point { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(positions.len(), 2);
        assert_ne!(positions[0], positions[1]);
        let origin = DVec2::new(-118.5, 34.1);
        assert!(positions
            .iter()
            .all(|p| (*p - origin).abs().max_element() <= JITTER_SPAN / 2.0));
    }

    #[test]
    fn test_stage_counts() {
        let data = dataset(INCIDENTS, ObservationKind::Incident);
        let counts = data.stage_counts(day(2, 3), &ObservationFilter::default());
        assert_eq!(
            counts,
            [
                (ResponseStage::Initial, 1),
                (ResponseStage::Stage1, 0),
                (ResponseStage::Stage2, 1),
                (ResponseStage::Stage3, 0),
            ]
        );
        let none = data.stage_counts(day(2, 5), &ObservationFilter::default());
        assert!(none.iter().all(|(_, n)| *n == 0));

        let satellite = dataset(FIRMS, ObservationKind::Satellite);
        let counts = satellite.stage_counts(day(1, 8), &ObservationFilter::default());
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn test_non_list_dataset_is_empty() {
        let data = dataset(r#"{"error": "nope"}"#, ObservationKind::Satellite);
        assert!(data.is_empty());
    }
}
