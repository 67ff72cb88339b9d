//! Decoding of OpenWeatherMap daily forecast payloads.
//!
//! Error payloads (`"cod": "404"` and friends) are well-formed JSON and decode
//! to [`ParsedForecast::Empty`]; only undecodable input is a [`ParseError`].

use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::types::{EmptyReason, ParsedForecast, Snapshot, WeatherRecord};

/// Decodes a raw payload into a forecast.
pub trait PayloadParser: Send + Sync {
    /// # Errors
    /// The payload is not decodable at all.
    fn parse(&self, raw: &str) -> Result<ParsedForecast, ParseError>;
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    cod: Option<Value>,
    #[serde(default)]
    list: Vec<OwmDay>,
}

#[derive(Debug, Deserialize)]
struct OwmDay {
    temp: OwmTemp,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwmTemp {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    id: i32,
}

/// Parser for the OpenWeatherMap daily forecast format.
///
/// Entry `i` of `list` is dated `start_day + i`; `start_day` defaults to
/// today in UTC.
#[derive(Debug, Clone, Default)]
pub struct OwmJsonParser {
    start_day: Option<NaiveDate>,
}

impl OwmJsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the first forecast day instead of using today's UTC date
    pub fn starting(start_day: NaiveDate) -> Self {
        Self {
            start_day: Some(start_day),
        }
    }

    fn status_code(cod: &Value) -> Result<u16, ParseError> {
        let code = match cod {
            Value::String(s) => s.trim().parse::<u16>().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            _ => None,
        };
        code.ok_or_else(|| ParseError::Malformed(format!("unrecognised cod value {}", cod)))
    }
}

impl PayloadParser for OwmJsonParser {
    fn parse(&self, raw: &str) -> Result<ParsedForecast, ParseError> {
        let response: OwmResponse = serde_json::from_str(raw)?;

        if let Some(cod) = &response.cod {
            match Self::status_code(cod)? {
                200 => {}
                404 => return Ok(ParsedForecast::Empty(EmptyReason::LocationNotFound)),
                other => return Ok(ParsedForecast::Empty(EmptyReason::ServerError(other))),
            }
        }

        if response.list.is_empty() {
            return Ok(ParsedForecast::Empty(EmptyReason::NoRecords));
        }

        let start_day = self.start_day.unwrap_or_else(|| Utc::now().date_naive());
        let mut records = Vec::with_capacity(response.list.len());
        for (offset, day) in (0i64..).zip(response.list) {
            let condition = day
                .weather
                .first()
                .ok_or(ParseError::MissingField("weather[0].id"))?;

            records.push(
                WeatherRecord::new(
                    start_day + Duration::days(offset),
                    day.temp.min,
                    day.temp.max,
                    condition.id,
                )
                .with_details(day.humidity, day.pressure, day.speed, day.deg),
            );
        }

        Ok(ParsedForecast::Data(Snapshot::new(records)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_parses_list_with_consecutive_dates() {
        let raw = r#"{
            "cod": "200",
            "list": [
                {"temp": {"min": 10.0, "max": 20.0}, "weather": [{"id": 800}], "humidity": 60, "pressure": 1013.5, "speed": 3.1, "deg": 180},
                {"temp": {"min": 8.0, "max": 18.0}, "weather": [{"id": 500}]}
            ]
        }"#;

        let parsed = OwmJsonParser::starting(start()).parse(raw).unwrap();
        let ParsedForecast::Data(snapshot) = parsed else {
            panic!("expected data, got {:?}", parsed);
        };

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records()[0].date, start());
        assert_eq!(snapshot.records()[1].date, start() + Duration::days(1));
        assert_eq!(snapshot.records()[0].pressure, 1013.5);
        assert_eq!(snapshot.records()[1].weather_condition_id, 500);
        assert_eq!(snapshot.records()[1].humidity, 0.0);
    }

    #[test]
    fn test_city_not_found_is_empty() {
        let raw = r#"{"cod": "404", "message": "city not found"}"#;
        assert_eq!(
            OwmJsonParser::new().parse(raw).unwrap(),
            ParsedForecast::Empty(EmptyReason::LocationNotFound)
        );
    }

    #[test]
    fn test_numeric_server_error_code_is_empty() {
        let raw = r#"{"cod": 500, "message": "internal error"}"#;
        assert_eq!(
            OwmJsonParser::new().parse(raw).unwrap(),
            ParsedForecast::Empty(EmptyReason::ServerError(500))
        );
    }

    #[test]
    fn test_missing_cod_and_empty_list() {
        assert_eq!(
            OwmJsonParser::new().parse(r#"{"list": []}"#).unwrap(),
            ParsedForecast::Empty(EmptyReason::NoRecords)
        );
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = OwmJsonParser::new().parse("<html>502</html>").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_unrecognised_cod_is_error() {
        let err = OwmJsonParser::new().parse(r#"{"cod": "abc"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_entry_without_condition_is_error() {
        let raw = r#"{"list": [{"temp": {"min": 1.0, "max": 2.0}, "weather": []}]}"#;
        let err = OwmJsonParser::starting(start()).parse(raw).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("weather[0].id")));
    }
}
