//! Static data sources and the background fetcher that reads from them.
//!
//! Requests run on short-lived named threads and report back over a channel,
//! so the event loop never blocks on disk or network. Each completion carries
//! the [`FetchTag`] it was issued under; deciding whether it is still wanted is
//! left to the receiver.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use crossbeam_channel::{Receiver, Sender};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::conditions::{ConditionsClient, ConditionsError, ConditionsReport};
use crate::timeline::FetchTag;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{path}: HTTP {status}")]
    Status { path: String, status: u16 },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{path}: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0} does not support listing")]
    Unsupported(String),
}

/// Somewhere static documents can be read from, addressed by relative path
pub trait DataSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// File names directly inside `dir`
    fn list(&self, dir: &str) -> Result<Vec<String>, FetchError> {
        let _ = dir;
        Err(FetchError::Unsupported(self.describe()))
    }

    fn describe(&self) -> String;
}

/// Documents under a local directory
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl DataSource for FileSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        fs::read(self.resolve(path)).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.to_string()),
            _ => FetchError::Io {
                path: path.to_string(),
                source,
            },
        })
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, FetchError> {
        let io_err = |source: io::Error| FetchError::Io {
            path: dir.to_string(),
            source,
        };
        let entries = fs::read_dir(self.resolve(dir)).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(dir.to_string()),
            _ => io_err(source),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Documents served over HTTP(S) below a base URL
pub struct HttpSource {
    base: String,
    client: Client,
}

impl HttpSource {
    pub fn new(base: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            base: base.into(),
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl DataSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let network = |source| FetchError::Network {
            path: path.to_string(),
            source,
        };
        let response = self.client.get(self.url(path)).send().map_err(network)?;
        match response.status() {
            status if status.is_success() => {
                response.bytes().map(|b| b.to_vec()).map_err(network)
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound(path.to_string())),
            status => Err(FetchError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    fn describe(&self) -> String {
        self.base.clone()
    }
}

/// Pick a source for a configured location: http(s) URLs go over the network
pub fn source_for(location: &str) -> Result<Arc<dyn DataSource>, reqwest::Error> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(location)?))
    } else {
        Ok(Arc::new(FileSource::new(location)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Land { path: String },
    Observations { region: String, path: String },
    Predictions { region: String, date: NaiveDate, path: String },
    DateListing { region: String, dir: String },
    Conditions { lat: f64, lon: f64, date: NaiveDate, seq: u64 },
}

impl Request {
    fn thread_name(&self) -> &'static str {
        match self {
            Request::Land { .. } => "fetch-land",
            Request::Observations { .. } => "fetch-observations",
            Request::Predictions { .. } => "fetch-predictions",
            Request::DateListing { .. } => "fetch-listing",
            Request::Conditions { .. } => "fetch-conditions",
        }
    }
}

#[derive(Debug)]
pub enum Payload {
    Bytes(Result<Vec<u8>, FetchError>),
    Listing(Result<Vec<String>, FetchError>),
    Conditions(ConditionsReport),
}

#[derive(Debug)]
pub struct Completion {
    pub tag: Option<FetchTag>,
    pub request: Request,
    pub payload: Payload,
}

fn run(
    source: &dyn DataSource,
    conditions: Option<&ConditionsClient>,
    request: &Request,
) -> Payload {
    match request {
        Request::Land { path }
        | Request::Observations { path, .. }
        | Request::Predictions { path, .. } => Payload::Bytes(source.fetch(path)),
        Request::DateListing { dir, .. } => Payload::Listing(source.list(dir)),
        &Request::Conditions { lat, lon, date, .. } => Payload::Conditions(match conditions {
            Some(client) => client.lookup(lat, lon, date),
            None => {
                let off = ConditionsError::Unavailable("no conditions endpoint configured".into());
                ConditionsReport {
                    lat,
                    lon,
                    date,
                    aqi: Err(off.clone()),
                    weather: Err(off),
                }
            }
        }),
    }
}

pub struct Fetcher {
    source: Arc<dyn DataSource>,
    conditions: Option<Arc<ConditionsClient>>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn DataSource>, conditions: Option<Arc<ConditionsClient>>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            source,
            conditions,
            tx,
            rx,
        }
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Run `request` in the background; the result arrives via [`Fetcher::try_recv`]
    pub fn submit(&self, tag: Option<FetchTag>, request: Request) {
        let source = Arc::clone(&self.source);
        let conditions = self.conditions.clone();
        let tx = self.tx.clone();
        let name = request.thread_name();
        debug!(?request, ?tag, "fetch submitted");

        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let payload = run(source.as_ref(), conditions.as_deref(), &request);
            // The receiver only goes away on shutdown
            let _ = tx.send(Completion {
                tag,
                request,
                payload,
            });
        });
        if let Err(e) = spawned {
            warn!("failed to spawn {name} worker: {e}");
        }
    }

    pub fn try_recv(&self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// In-memory source for tests
#[cfg(test)]
pub(crate) struct MemorySource {
    files: std::collections::HashMap<String, Vec<u8>>,
}

#[cfg(test)]
impl MemorySource {
    pub(crate) fn new() -> Self {
        Self {
            files: std::collections::HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, path: &str, body: &str) -> Self {
        self.files.insert(path.to_string(), body.as_bytes().to_vec());
        self
    }
}

#[cfg(test)]
impl DataSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }

    fn list(&self, dir: &str) -> Result<Vec<String>, FetchError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_file_source_fetch_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("predicted")).unwrap();
        fs::write(dir.path().join("predicted/a.json"), b"[]").unwrap();

        let source = FileSource::new(dir.path());
        assert_eq!(source.fetch("predicted/a.json").unwrap(), b"[]");
        assert!(matches!(
            source.fetch("predicted/b.json"),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_source_lists_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("predicted/korea");
        fs::create_dir_all(sub.join("nested")).unwrap();
        fs::write(sub.join("b_20250302.json"), b"[]").unwrap();
        fs::write(sub.join("a_20250301.json"), b"[]").unwrap();

        let source = FileSource::new(dir.path());
        assert_eq!(
            source.list("predicted/korea").unwrap(),
            vec!["a_20250301.json".to_string(), "b_20250302.json".to_string()]
        );
        assert!(matches!(source.list("nowhere"), Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_http_source_does_not_list() {
        let source = HttpSource::new("https://example.org/data/").unwrap();
        assert_eq!(source.url("/predicted/x.json"), "https://example.org/data/predicted/x.json");
        assert!(matches!(source.list("predicted"), Err(FetchError::Unsupported(_))));
    }

    #[test]
    fn test_source_for_picks_by_scheme() {
        assert_eq!(source_for("https://example.org").unwrap().describe(), "https://example.org");
        assert_eq!(source_for("public").unwrap().describe(), "public");
    }

    #[test]
    fn test_fetcher_delivers_tagged_completion() {
        let source = MemorySource::new().with("land.geojson", "{}");
        let fetcher = Fetcher::new(Arc::new(source), None);
        let tag = FetchTag {
            generation: 7,
            index: 1,
            date: NaiveDate::from_ymd_opt(2025, 1, 9).unwrap(),
        };
        fetcher.submit(
            Some(tag),
            Request::Land {
                path: "land.geojson".into(),
            },
        );

        let done = fetcher.recv_timeout(WAIT).unwrap();
        assert_eq!(done.tag, Some(tag));
        assert!(matches!(done.payload, Payload::Bytes(Ok(ref b)) if b == b"{}"));
        assert!(fetcher.try_recv().is_none());
    }

    #[test]
    fn test_conditions_without_endpoint_reports_unavailable() {
        let fetcher = Fetcher::new(Arc::new(MemorySource::new()), None);
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        fetcher.submit(
            None,
            Request::Conditions {
                lat: 34.0,
                lon: -118.0,
                date,
                seq: 1,
            },
        );
        match fetcher.recv_timeout(WAIT).map(|c| c.payload) {
            Some(Payload::Conditions(report)) => {
                assert!(matches!(report.aqi, Err(ConditionsError::Unavailable(_))));
                assert!(report.weather.is_err());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
