//! The viewer session: one region, its timeline, and everything drawn for the
//! current date.
//!
//! All state changes go through [`Session::dispatch`], [`Session::tick`] and
//! [`Session::poll`], which the event loop calls on one thread. Background
//! fetches come back through `poll`; a prediction result is applied only if the
//! timeline has not moved since it was requested.

use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::conditions::ConditionsReport;
use crate::config::{Config, DisplayConfig};
use crate::fetch::{Completion, FetchError, Fetcher, Payload, Request};
use crate::imagery::ImageryStack;
use crate::land::{LandFilter, LandPolygons};
use crate::observations::{self, Observation, ObservationDataset, ObservationFilter};
use crate::overlay::{Category, DisplaySurface, OverlayRegistry};
use crate::predictions::{self, BatchStats};
use crate::region::{Region, RegionCatalog, UnknownRegion};
use crate::timeline::{FetchTag, Timeline};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Seek(usize),
    Step(isize),
    Play,
    Pause,
    TogglePlay,
    ToggleCategory(Category),
    SwitchRegion(String),
    NextRegion,
    CycleStageFilter,
    CycleStatusFilter,
    /// Look up air quality and weather at a point for the current date
    Inspect { lat: f64, lon: f64 },
}

pub struct Session {
    catalog: RegionCatalog,
    region: Region,
    land_path: String,
    display: DisplayConfig,
    timeline: Timeline,
    land: LandFilter,
    observations: Option<ObservationDataset>,
    filter: ObservationFilter,
    rendered: Vec<usize>,
    registry: OverlayRegistry,
    imagery: ImageryStack,
    fetcher: Fetcher,
    prediction_stats: Option<BatchStats>,
    conditions: Option<ConditionsReport>,
    conditions_seq: u64,
    render_seed: u64,
    status: String,
}

impl Session {
    pub fn new(config: &Config, fetcher: Fetcher) -> Result<Self, UnknownRegion> {
        let catalog = config.catalog();
        let region = catalog.get(&config.region)?.clone();
        Ok(Self {
            timeline: Timeline::new(Vec::new(), config.interval(), config.playback.end),
            imagery: ImageryStack::new(&region.imagery_layers),
            catalog,
            region,
            land_path: config.land_path.clone(),
            display: config.display,
            land: LandFilter::unloaded(),
            observations: None,
            filter: ObservationFilter::default(),
            rendered: Vec::new(),
            registry: OverlayRegistry::new(),
            fetcher,
            prediction_stats: None,
            conditions: None,
            conditions_seq: 0,
            render_seed: 0,
            status: String::new(),
        })
    }

    /// Apply the display toggles, request land boundaries and load the region
    pub fn start(&mut self, surface: &mut dyn DisplaySurface) {
        let shown = [
            (Category::Observed, self.display.show_observations),
            (Category::Predicted, self.display.show_predictions),
            (Category::Grid, self.display.show_grid),
        ];
        for (category, visible) in shown {
            self.registry.set_visible(category, visible, surface);
        }
        self.fetcher.submit(
            None,
            Request::Land {
                path: self.land_path.clone(),
            },
        );
        info!(source = %self.fetcher.describe(), region = %self.region.name, "session started");
        self.load_region(surface);
    }

    pub fn dispatch(&mut self, command: Command, now: Instant, surface: &mut dyn DisplaySurface) {
        debug!(?command, "dispatch");
        match command {
            Command::Seek(index) => {
                if let Some(tag) = self.timeline.seek(index) {
                    self.refresh(Some(tag), surface);
                }
            }
            Command::Step(delta) => {
                if let Some(tag) = self.timeline.step(delta) {
                    self.refresh(Some(tag), surface);
                }
            }
            Command::Play => {
                if self.timeline.play(now) {
                    self.status = "playing".into();
                }
            }
            Command::Pause => {
                if self.timeline.pause() {
                    self.status = "paused".into();
                }
            }
            Command::TogglePlay => {
                let next = if self.timeline.is_playing() {
                    Command::Pause
                } else {
                    Command::Play
                };
                self.dispatch(next, now, surface);
            }
            Command::ToggleCategory(category) => {
                let visible = self.registry.toggle(category, surface);
                self.status = format!(
                    "{} {}",
                    category.label(),
                    if visible { "shown" } else { "hidden" }
                );
            }
            Command::SwitchRegion(name) => self.switch_region(&name, surface),
            Command::NextRegion => {
                if let Some(next) = self.catalog.next_after(&self.region.name) {
                    let name = next.name.clone();
                    self.switch_region(&name, surface);
                }
            }
            Command::CycleStageFilter => {
                self.filter.cycle_stage();
                self.status = match self.filter.stage {
                    Some(stage) => format!("stage filter: {}", stage.label()),
                    None => "stage filter off".into(),
                };
                self.render_observations(surface);
            }
            Command::CycleStatusFilter => {
                let statuses = self
                    .observations
                    .as_ref()
                    .map(ObservationDataset::statuses)
                    .unwrap_or_default();
                self.filter.status = next_status(&statuses, self.filter.status.as_deref());
                self.status = match &self.filter.status {
                    Some(status) => format!("status filter: {status}"),
                    None => "status filter off".into(),
                };
                self.render_observations(surface);
            }
            Command::Inspect { lat, lon } => self.inspect(lat, lon),
        }
    }

    /// Advance playback if due
    pub fn tick(&mut self, now: Instant, surface: &mut dyn DisplaySurface) {
        let was_playing = self.timeline.is_playing();
        match self.timeline.tick(now) {
            Some(tag) => self.refresh(Some(tag), surface),
            None if was_playing && !self.timeline.is_playing() => {
                self.status = "playback finished".into();
            }
            None => {}
        }
    }

    /// Apply every completion that has arrived. Returns how many were handled.
    pub fn poll(&mut self, surface: &mut dyn DisplaySurface) -> usize {
        let mut handled = 0;
        while let Some(completion) = self.fetcher.try_recv() {
            self.on_completion(completion, surface);
            handled += 1;
        }
        handled
    }

    pub fn on_completion(&mut self, completion: Completion, surface: &mut dyn DisplaySurface) {
        let Completion {
            tag,
            request,
            payload,
        } = completion;

        match (request, payload) {
            (Request::Land { path }, Payload::Bytes(result)) => self.on_land(&path, result, surface),
            (Request::Observations { region, .. }, Payload::Bytes(result)) => {
                if region == self.region.name {
                    self.on_observations(result, surface);
                } else {
                    debug!(%region, "discarding observations for inactive region");
                }
            }
            (Request::DateListing { region, dir }, Payload::Listing(result)) => {
                if region == self.region.name {
                    self.on_listing(&dir, result, surface);
                } else {
                    debug!(%region, "discarding listing for inactive region");
                }
            }
            (Request::Predictions { region, date, .. }, Payload::Bytes(result)) => {
                let current = region == self.region.name
                    && tag.is_some_and(|t| self.timeline.is_current(&t));
                if current {
                    self.on_predictions(date, result, surface);
                } else {
                    debug!(%region, %date, "discarding stale predictions");
                }
            }
            (Request::Conditions { seq, .. }, Payload::Conditions(report)) => {
                if seq == self.conditions_seq {
                    self.conditions = Some(report);
                }
            }
            (request, _) => warn!(?request, "completion with mismatched payload"),
        }
    }

    /// Redraw everything for the timeline position `tag`
    pub fn refresh(&mut self, tag: Option<FetchTag>, surface: &mut dyn DisplaySurface) {
        self.imagery.sync(self.timeline.index());
        predictions::clear(&mut self.registry, surface);
        self.prediction_stats = None;

        let Some(tag) = tag else {
            self.registry.clear(Category::Observed, surface);
            self.rendered.clear();
            return;
        };

        self.render_observations(surface);
        self.fetcher.submit(
            Some(tag),
            Request::Predictions {
                region: self.region.name.clone(),
                date: tag.date,
                path: self.region.prediction_path_for(tag.date),
            },
        );
    }

    fn switch_region(&mut self, name: &str, surface: &mut dyn DisplaySurface) {
        match self.catalog.get(name) {
            Ok(region) => {
                self.region = region.clone();
                info!(region = %self.region.name, "switched region");
                self.status = format!("region {}", self.region.name);
                self.load_region(surface);
            }
            Err(e) => {
                warn!("{e}");
                self.status = e.to_string();
            }
        }
    }

    fn load_region(&mut self, surface: &mut dyn DisplaySurface) {
        for category in Category::ALL {
            self.registry.clear(category, surface);
        }
        self.observations = None;
        self.filter = ObservationFilter::default();
        self.rendered.clear();
        self.conditions = None;
        self.imagery = ImageryStack::new(&self.region.imagery_layers);

        self.fetcher.submit(
            None,
            Request::Observations {
                region: self.region.name.clone(),
                path: self.region.observation_path.clone(),
            },
        );

        if self.region.derives_dates() {
            self.timeline.replace_dates(Vec::new());
            self.fetcher.submit(
                None,
                Request::DateListing {
                    region: self.region.name.clone(),
                    dir: self.region.prediction_dir().to_string(),
                },
            );
        } else {
            let tag = self.timeline.replace_dates(self.region.dates.clone());
            self.refresh(tag, surface);
        }
    }

    fn render_observations(&mut self, surface: &mut dyn DisplaySurface) {
        let (Some(dataset), Some(date)) = (&self.observations, self.timeline.current_date()) else {
            self.registry.clear(Category::Observed, surface);
            self.rendered.clear();
            return;
        };
        self.render_seed = self.render_seed.wrapping_add(1);
        self.rendered = observations::render(
            dataset,
            date,
            &self.filter,
            self.render_seed,
            &mut self.registry,
            surface,
        );
    }

    fn inspect(&mut self, lat: f64, lon: f64) {
        let Some(date) = self.timeline.current_date() else {
            self.status = "no date selected".into();
            return;
        };
        self.conditions_seq += 1;
        self.conditions = None;
        self.fetcher.submit(
            None,
            Request::Conditions {
                lat,
                lon,
                date,
                seq: self.conditions_seq,
            },
        );
        self.status = format!("conditions at {lat:.3}, {lon:.3} on {date}");
    }

    fn on_land(
        &mut self,
        path: &str,
        result: Result<Vec<u8>, FetchError>,
        surface: &mut dyn DisplaySurface,
    ) {
        let parsed = result
            .map_err(anyhow::Error::from)
            .and_then(|bytes| LandPolygons::parse(&bytes));
        match parsed {
            Ok(polygons) => {
                info!(polygons = polygons.len(), "land boundaries loaded");
                self.land.replace(polygons);
                // Anything fetched before the swap was filtered against the old dataset
                if self.timeline.current_date().is_some() {
                    let tag = self.timeline.retag();
                    self.refresh(tag, surface);
                }
            }
            Err(e) => {
                warn!("land boundaries from {path}: {e:#}");
                self.status = "land boundaries unavailable; showing all cells".into();
            }
        }
    }

    fn on_observations(
        &mut self,
        result: Result<Vec<u8>, FetchError>,
        surface: &mut dyn DisplaySurface,
    ) {
        let kind = self.region.observation_kind;
        let parsed = result.map_err(anyhow::Error::from).and_then(|mut bytes| {
            ObservationDataset::parse(&mut bytes, kind).map_err(anyhow::Error::from)
        });
        match parsed {
            Ok(dataset) => {
                info!(records = dataset.len(), region = %self.region.name, "observations loaded");
                self.observations = Some(dataset);
            }
            Err(e) => {
                warn!("observations for {}: {e:#}", self.region.name);
                self.status = "observations unavailable".into();
                self.observations = None;
            }
        }
        self.render_observations(surface);
    }

    fn on_listing(
        &mut self,
        dir: &str,
        result: Result<Vec<String>, FetchError>,
        surface: &mut dyn DisplaySurface,
    ) {
        let names = match result {
            Ok(names) => names,
            Err(e) => {
                warn!("listing {dir}: {e}");
                self.status = format!("no date list for {}", self.region.name);
                return;
            }
        };
        let mut dates: Vec<NaiveDate> = names
            .iter()
            .filter_map(|name| self.region.date_from_file_name(name))
            .collect();
        dates.sort();
        dates.dedup();
        info!(dates = dates.len(), region = %self.region.name, "prediction dates discovered");
        if dates.is_empty() {
            self.status = format!("no prediction files under {dir}");
        }
        let tag = self.timeline.replace_dates(dates);
        self.refresh(tag, surface);
    }

    fn on_predictions(
        &mut self,
        date: NaiveDate,
        result: Result<Vec<u8>, FetchError>,
        surface: &mut dyn DisplaySurface,
    ) {
        let points = match result {
            Ok(mut bytes) => predictions::parse_batch(&mut bytes).map_err(anyhow::Error::from),
            // A date without a prediction file simply has no predictions
            Err(FetchError::NotFound(path)) => {
                debug!(%path, "no prediction file");
                Ok(Vec::new())
            }
            Err(e) => Err(anyhow::Error::from(e)),
        };
        match points {
            Ok(points) => {
                let batch = predictions::prepare(&points, &self.region, &self.land);
                predictions::apply(&batch, &mut self.registry, surface);
                self.prediction_stats = Some(batch.stats);
            }
            Err(e) => {
                warn!("predictions for {date}: {e:#}");
                predictions::clear(&mut self.registry, surface);
                self.status = format!("predictions for {date} unavailable");
            }
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn imagery(&self) -> &ImageryStack {
        &self.imagery
    }

    pub fn land(&self) -> &LandFilter {
        &self.land
    }

    pub fn filter(&self) -> &ObservationFilter {
        &self.filter
    }

    pub fn observations(&self) -> Option<&ObservationDataset> {
        self.observations.as_ref()
    }

    /// Records drawn for the current date, in dataset order
    pub fn rendered_observations(&self) -> impl Iterator<Item = &Observation> {
        self.rendered
            .iter()
            .filter_map(|&idx| self.observations.as_ref()?.get(idx))
    }

    pub fn prediction_stats(&self) -> Option<BatchStats> {
        self.prediction_stats
    }

    pub fn conditions(&self) -> Option<&ConditionsReport> {
        self.conditions.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

/// none → first → … → last → none
fn next_status(statuses: &[String], current: Option<&str>) -> Option<String> {
    match current {
        None => statuses.first().cloned(),
        Some(current) => statuses
            .iter()
            .position(|s| s == current)
            .and_then(|i| statuses.get(i + 1))
            .cloned(),
    }
}
