//! Remote forecast retrieval.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use sunsync_core::{LocationConfig, NetworkError, ReqwestErrorExt, WeatherConfig};

use crate::error::FetchError;

/// Longest error body excerpt kept in a `ServerError`
const MAX_ERROR_BODY: usize = 200;

/// Retrieves the raw forecast payload for a location.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    /// # Errors
    /// Network failure, timeout, or a non-2xx response.
    async fn fetch(&self, location: &LocationConfig) -> Result<String, FetchError>;
}

/// Daily forecast over HTTP in the OpenWeatherMap format.
///
/// Always requests metric units; display conversion happens downstream.
#[derive(Debug, Clone)]
pub struct HttpWeatherFetcher {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
    forecast_days: u8,
}

impl HttpWeatherFetcher {
    pub fn new(config: &WeatherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            forecast_days: config.forecast_days,
        })
    }

    /// Build the request URL. Coordinates win over the place name.
    pub fn request_url(&self, location: &LocationConfig) -> Result<Url, FetchError> {
        let mut params: Vec<(&str, String)> = match location.coordinates {
            Some(c) => vec![
                ("lat", c.latitude.to_string()),
                ("lon", c.longitude.to_string()),
            ],
            None => vec![("q", location.place.clone())],
        };
        params.push(("mode", "json".to_string()));
        params.push(("units", "metric".to_string()));
        params.push(("cnt", self.forecast_days.to_string()));
        if let Some(key) = &self.api_key {
            params.push(("appid", key.clone()));
        }

        Url::parse_with_params(&self.base_url, &params)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }
}

#[async_trait]
impl WeatherFetcher for HttpWeatherFetcher {
    async fn fetch(&self, location: &LocationConfig) -> Result<String, FetchError> {
        let url = self.request_url(location)?;
        tracing::debug!("Fetching forecast for {} from {}", location.describe(), url.path());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.into_network_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(api_key: Option<&str>) -> HttpWeatherFetcher {
        let config = WeatherConfig {
            base_url: "https://weather.example.com/daily".to_string(),
            api_key: api_key.map(str::to_string),
            forecast_days: 7,
            ..WeatherConfig::default()
        };
        HttpWeatherFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_url_for_named_place() {
        let url = fetcher(None)
            .request_url(&LocationConfig::named("94043,USA"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://weather.example.com/daily?q=94043%2CUSA&mode=json&units=metric&cnt=7"
        );
    }

    #[test]
    fn test_url_prefers_coordinates() {
        let mut location = LocationConfig::at(37.4, -122.08);
        location.place = "ignored".to_string();
        let url = fetcher(Some("k3y")).request_url(&location).unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("lat".to_string(), "37.4".to_string())));
        assert!(pairs.contains(&("lon".to_string(), "-122.08".to_string())));
        assert!(pairs.contains(&("appid".to_string(), "k3y".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "q"));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = WeatherConfig {
            base_url: "not a url".to_string(),
            ..WeatherConfig::default()
        };
        let fetcher = HttpWeatherFetcher::new(&config).unwrap();
        let err = fetcher
            .request_url(&LocationConfig::named("Berlin"))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
