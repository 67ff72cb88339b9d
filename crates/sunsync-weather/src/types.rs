use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Weather condition categories mapped from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Thunderstorm,
    Drizzle,
    Rain,
    FreezingRain,
    Showers,
    Snow,
    Fog,
    Clear,
    PartlyCloudy,
    Cloudy,
    Unknown,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a category
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: i32) -> Self {
        match id {
            200..=232 => Self::Thunderstorm,
            300..=321 => Self::Drizzle,
            500..=504 => Self::Rain,
            511 => Self::FreezingRain,
            520..=531 => Self::Showers,
            600..=622 => Self::Snow,
            701..=781 => Self::Fog,
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "Thunderstorm",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::FreezingRain => "Freezing Rain",
            Self::Showers => "Showers",
            Self::Snow => "Snow",
            Self::Fog => "Fog",
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Unknown => "Unknown",
        }
    }
}

/// One day's forecast.
///
/// Temperatures are metric throughout; conversion happens only at display time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub min_temp: f64,
    pub max_temp: f64,
    pub weather_condition_id: i32,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
}

impl WeatherRecord {
    pub fn new(date: NaiveDate, min_temp: f64, max_temp: f64, weather_condition_id: i32) -> Self {
        Self {
            date,
            min_temp,
            max_temp,
            weather_condition_id,
            humidity: 0.0,
            pressure: 0.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
        }
    }

    /// Attach the display-only fields
    pub fn with_details(
        mut self,
        humidity: f64,
        pressure: f64,
        wind_speed: f64,
        wind_direction: f64,
    ) -> Self {
        self.humidity = humidity;
        self.pressure = pressure;
        self.wind_speed = wind_speed;
        self.wind_direction = wind_direction;
        self
    }

    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_owm_id(self.weather_condition_id)
    }
}

/// The complete forecast held by the store: non-empty, ordered by date, one record per day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecords")]
pub struct Snapshot {
    records: Vec<WeatherRecord>,
}

/// Wire form of [`Snapshot`]; decoding goes through [`Snapshot::new`]
#[derive(Deserialize)]
struct SnapshotRecords {
    records: Vec<WeatherRecord>,
}

impl TryFrom<SnapshotRecords> for Snapshot {
    type Error = SnapshotError;

    fn try_from(wire: SnapshotRecords) -> Result<Self, Self::Error> {
        Self::new(wire.records)
    }
}

impl Snapshot {
    /// Build a snapshot, sorting records by date.
    ///
    /// # Errors
    /// Fails when `records` is empty or two records share a date.
    pub fn new(mut records: Vec<WeatherRecord>) -> Result<Self, SnapshotError> {
        if records.is_empty() {
            return Err(SnapshotError::Empty);
        }

        records.sort_by_key(|r| r.date);
        if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SnapshotError::DuplicateDate(pair[0].date));
        }

        Ok(Self { records })
    }

    /// The soonest record
    pub fn first(&self) -> &WeatherRecord {
        // non-empty by construction
        &self.records[0]
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn into_records(self) -> Vec<WeatherRecord> {
        self.records
    }
}

/// Why a well-formed payload carried no usable forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The server did not recognise the requested location
    LocationNotFound,
    /// The server reported an error code of its own
    ServerError(u16),
    /// The payload was fine but listed no days
    NoRecords,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocationNotFound => write!(f, "location not found"),
            Self::ServerError(code) => write!(f, "server reported code {}", code),
            Self::NoRecords => write!(f, "no forecast records"),
        }
    }
}

/// Result of decoding a payload
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedForecast {
    Data(Snapshot),
    Empty(EmptyReason),
}
