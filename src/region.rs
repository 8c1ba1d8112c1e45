use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

/// Grid cell edge length in degrees, shared by every region.
pub const CELL_SIZE: f64 = 0.05;

/// Placeholder substituted with the `YYYYMMDD` form of a date in path templates.
const DATE_PLACEHOLDER: &str = "{date}";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown region {0:?}")]
pub struct UnknownRegion(pub String);

/// Shape of the observation dataset a region ships with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    /// Satellite hotspot detections (confidence + radiative power)
    Satellite,
    /// Regional incident reports (response stage + status + address)
    Incident,
}

/// Geographic bounding box in degrees
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) * 0.5,
            (self.min_lat + self.max_lat) * 0.5,
        )
    }
}

fn default_cell_size() -> f64 {
    CELL_SIZE
}

/// A region with its grid origin and the static resources that belong to it.
#[derive(Clone, Debug, Deserialize)]
pub struct Region {
    pub name: String,
    /// Southern edge of grid row 0
    pub origin_lat: f64,
    /// Western edge of grid column 0
    pub origin_lon: f64,
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    pub bounds: Bounds,
    /// Prediction document path, `{date}` replaced by `YYYYMMDD`
    pub prediction_path: String,
    pub observation_path: String,
    pub observation_kind: ObservationKind,
    /// Fixed date list; empty means derive it from the prediction files present
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    /// Imagery layer ids, one per entry of `dates`
    #[serde(default)]
    pub imagery_layers: Vec<String>,
}

impl Region {
    /// Los Angeles, January 2025 fires
    pub fn la() -> Self {
        let days = [8, 9, 10, 13, 14, 16, 18, 20];
        let dates = days
            .iter()
            .filter_map(|&d| NaiveDate::from_ymd_opt(2025, 1, d))
            .collect();
        let imagery_layers = [
            "20250108m-maxar",
            "20250109m-maxar",
            "20250110n-maxar",
            "20250113m-maxar",
            "20250114m-maxar",
            "20250116m-maxar",
            "20250118m-maxar",
            "20250120m-maxar",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            name: "la".to_string(),
            origin_lat: 33.5,
            origin_lon: -119.0,
            cell_size: CELL_SIZE,
            bounds: Bounds {
                min_lat: 33.5,
                min_lon: -119.2,
                max_lat: 34.4,
                max_lon: -117.8,
            },
            prediction_path: "predicted/predicted_grid_fire_points_{date}.json".to_string(),
            observation_path: "fire_archive_SV-C2_616504.json".to_string(),
            observation_kind: ObservationKind::Satellite,
            dates,
            imagery_layers,
        }
    }

    /// South Korea, incident reports with derived prediction dates
    pub fn korea() -> Self {
        Self {
            name: "korea".to_string(),
            origin_lat: 34.0,
            origin_lon: 126.0,
            cell_size: CELL_SIZE,
            bounds: Bounds {
                min_lat: 33.0,
                min_lon: 124.0,
                max_lat: 39.0,
                max_lon: 132.0,
            },
            prediction_path: "predicted/korea/predicted_grid_fire_points_korea_{date}.json"
                .to_string(),
            observation_path: "data/korea_fire_weather.json".to_string(),
            observation_kind: ObservationKind::Incident,
            dates: Vec::new(),
            imagery_layers: Vec::new(),
        }
    }

    /// Path of the prediction document for `date`
    pub fn prediction_path_for(&self, date: NaiveDate) -> String {
        self.prediction_path.replace(DATE_PLACEHOLDER, &date_tag(date))
    }

    /// Directory holding this region's prediction documents
    pub fn prediction_dir(&self) -> &str {
        match self.prediction_path.rfind('/') {
            Some(idx) => &self.prediction_path[..idx],
            None => "",
        }
    }

    /// Recover the date from a prediction file name, if it matches the template
    pub fn date_from_file_name(&self, file_name: &str) -> Option<NaiveDate> {
        let template = match self.prediction_path.rfind('/') {
            Some(idx) => &self.prediction_path[idx + 1..],
            None => self.prediction_path.as_str(),
        };
        let (prefix, suffix) = template.split_once(DATE_PLACEHOLDER)?;
        let tag = file_name.strip_prefix(prefix)?.strip_suffix(suffix)?;
        if tag.len() != 8 {
            return None;
        }
        NaiveDate::parse_from_str(tag, "%Y%m%d").ok()
    }

    /// Whether the date list must come from a listing of prediction files
    pub fn derives_dates(&self) -> bool {
        self.dates.is_empty()
    }
}

/// `YYYYMMDD` form used in resource paths
pub fn date_tag(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// The set of regions the viewer can switch between
#[derive(Clone, Debug)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    pub fn builtin() -> Self {
        Self {
            regions: vec![Region::la(), Region::korea()],
        }
    }

    /// Replace regions with matching names, append the rest
    pub fn with_overrides(mut self, overrides: Vec<Region>) -> Self {
        for region in overrides {
            match self.regions.iter_mut().find(|r| r.name == region.name) {
                Some(slot) => *slot = region,
                None => self.regions.push(region),
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<&Region, UnknownRegion> {
        self.regions
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| UnknownRegion(name.to_string()))
    }

    /// Region following `name` in catalog order, wrapping around
    pub fn next_after(&self, name: &str) -> Option<&Region> {
        let idx = self.regions.iter().position(|r| r.name == name)?;
        self.regions.get((idx + 1) % self.regions.len())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}

impl Default for RegionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
