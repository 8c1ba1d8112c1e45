//! Air-quality and weather lookups through the proxy endpoints.

use std::time::Duration;

use chrono::{Days, NaiveDate};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use simd_json::prelude::*;
use simd_json::OwnedValue;
use thiserror::Error;

pub const AIR_QUALITY_ENDPOINT: &str = "api/airquality";
pub const WEATHER_ENDPOINT: &str = "api/meteostat";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionsError {
    #[error("missing lat/lon/start/end")]
    MissingParameters,
    #[error("no data")]
    NoData,
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// US AQI bands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AqiBand {
    Good,
    Moderate,
    Sensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiBand {
    pub fn of(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiBand::Good
        } else if aqi <= 100.0 {
            AqiBand::Moderate
        } else if aqi <= 150.0 {
            AqiBand::Sensitive
        } else if aqi <= 200.0 {
            AqiBand::Unhealthy
        } else if aqi <= 300.0 {
            AqiBand::VeryUnhealthy
        } else {
            AqiBand::Hazardous
        }
    }

    /// Display colour as RGB
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            AqiBand::Good => (0x00, 0xe4, 0x00),
            AqiBand::Moderate => (0xff, 0xff, 0x00),
            AqiBand::Sensitive => (0xff, 0x7e, 0x00),
            AqiBand::Unhealthy => (0xff, 0x00, 0x00),
            AqiBand::VeryUnhealthy => (0x8f, 0x3f, 0x97),
            AqiBand::Hazardous => (0x7e, 0x00, 0x23),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Weather {
    pub wind_speed: Option<f64>,
    pub wind_dir: Option<f64>,
    pub temp: Option<f64>,
}

/// Outcome of one lookup; each half fails independently
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionsReport {
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
    pub aqi: Result<f64, ConditionsError>,
    pub weather: Result<Weather, ConditionsError>,
}

fn status_error(status: StatusCode) -> ConditionsError {
    match status {
        StatusCode::BAD_REQUEST => ConditionsError::MissingParameters,
        StatusCode::NOT_FOUND => ConditionsError::NoData,
        other => ConditionsError::Unavailable(format!("HTTP {other}")),
    }
}

/// `data[0]` of a provider response
fn first_record(bytes: &mut [u8]) -> Result<OwnedValue, ConditionsError> {
    let value = simd_json::to_owned_value(bytes)
        .map_err(|e| ConditionsError::Unavailable(format!("malformed response: {e}")))?;
    value
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|records| records.first())
        .cloned()
        .ok_or(ConditionsError::NoData)
}

pub fn parse_air_quality(bytes: &mut [u8]) -> Result<f64, ConditionsError> {
    let record = first_record(bytes)?;
    record
        .get("aqi")
        .and_then(|v| v.cast_f64())
        .ok_or(ConditionsError::NoData)
}

pub fn parse_weather(bytes: &mut [u8]) -> Result<Weather, ConditionsError> {
    let record = first_record(bytes)?;
    let field = |name: &str| record.get(name).and_then(|v| v.cast_f64());
    Ok(Weather {
        wind_speed: field("wspd"),
        wind_dir: field("wdir"),
        temp: field("temp"),
    })
}

fn send(request: RequestBuilder) -> Result<Vec<u8>, ConditionsError> {
    let response = request
        .send()
        .map_err(|e| ConditionsError::Unavailable(e.to_string()))?;
    if !response.status().is_success() {
        return Err(status_error(response.status()));
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| ConditionsError::Unavailable(e.to_string()))
}

pub struct ConditionsClient {
    base: String,
    client: Client,
}

impl ConditionsClient {
    pub fn new(base: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            base: base.into(),
            client,
        })
    }

    /// GET request covering one day starting at `date`
    pub fn request(&self, endpoint: &str, lat: f64, lon: f64, date: NaiveDate) -> RequestBuilder {
        let end = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let url = format!("{}/{}", self.base.trim_end_matches('/'), endpoint);
        self.client.get(url).query(&[
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("start", date.to_string()),
            ("end", end.to_string()),
        ])
    }

    pub fn air_quality(&self, lat: f64, lon: f64, date: NaiveDate) -> Result<f64, ConditionsError> {
        let mut body = send(self.request(AIR_QUALITY_ENDPOINT, lat, lon, date))?;
        parse_air_quality(&mut body)
    }

    pub fn weather(&self, lat: f64, lon: f64, date: NaiveDate) -> Result<Weather, ConditionsError> {
        let mut body = send(self.request(WEATHER_ENDPOINT, lat, lon, date))?;
        parse_weather(&mut body)
    }

    pub fn lookup(&self, lat: f64, lon: f64, date: NaiveDate) -> ConditionsReport {
        ConditionsReport {
            lat,
            lon,
            date,
            aqi: self.air_quality(lat, lon, date),
            weather: self.weather(lat, lon, date),
        }
    }
}
