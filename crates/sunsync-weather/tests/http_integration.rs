//! Integration tests for the HTTP fetcher and companion channel using wiremock.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use sunsync_core::{CompanionConfig, LocationConfig, NetworkError, WeatherConfig};
use sunsync_weather::{
    CompanionChannel, CompanionError, CompanionMessage, CompanionMirror, DatasetStore, FetchError,
    HttpCompanionChannel, HttpWeatherFetcher, LogNotifier, NotificationThrottle, OwmJsonParser,
    SharedPreferences, SqliteWeatherStore, SyncOrchestrator, SyncOutcome, WeatherFetcher,
    WeatherRecord,
};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create one forecast day
fn owm_day(min: f64, max: f64, id: i32) -> serde_json::Value {
    serde_json::json!({
        "temp": {"min": min, "max": max},
        "weather": [{"id": id, "main": "x", "description": "x"}],
        "humidity": 60,
        "pressure": 1012.5,
        "speed": 3.1,
        "deg": 200
    })
}

fn weather_config(server: &MockServer) -> WeatherConfig {
    WeatherConfig {
        base_url: format!("{}/data/2.5/forecast/daily", server.uri()),
        api_key: Some("test-key".to_string()),
        forecast_days: 3,
        timeout_secs: 5,
        ..WeatherConfig::default()
    }
}

fn companion_config(server: &MockServer) -> CompanionConfig {
    CompanionConfig {
        peer_url: Some(format!("{}/", server.uri())),
        timeout_secs: 2,
    }
}

#[tokio::test]
async fn test_fetch_success_sends_expected_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast/daily"))
        .and(query_param("q", "94043,USA"))
        .and(query_param("mode", "json"))
        .and(query_param("units", "metric"))
        .and(query_param("cnt", "3"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"cod":"200","list":[]}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpWeatherFetcher::new(&weather_config(&mock_server)).unwrap();
    let body = fetcher
        .fetch(&LocationConfig::named("94043,USA"))
        .await
        .unwrap();

    assert_eq!(body, r#"{"cod":"200","list":[]}"#);
}

#[tokio::test]
async fn test_fetch_with_coordinates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast/daily"))
        .and(query_param("lat", "52.52"))
        .and(query_param("lon", "13.405"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = HttpWeatherFetcher::new(&weather_config(&mock_server)).unwrap();
    let result = fetcher.fetch(&LocationConfig::at(52.52, 13.405)).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_fetch_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast/daily"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let fetcher = HttpWeatherFetcher::new(&weather_config(&mock_server)).unwrap();
    let err = fetcher
        .fetch(&LocationConfig::named("Berlin"))
        .await
        .unwrap_err();

    match err {
        FetchError::Network(NetworkError::ServerError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_unreachable_host() {
    let config = WeatherConfig {
        base_url: "http://127.0.0.1:1/daily".to_string(),
        timeout_secs: 2,
        ..WeatherConfig::default()
    };
    let fetcher = HttpWeatherFetcher::new(&config).unwrap();

    let err = fetcher
        .fetch(&LocationConfig::named("Berlin"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Network(_)));
}

#[tokio::test]
async fn test_companion_put_returns_receipt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/wearable"))
        .and(body_partial_json(serde_json::json!({
            "max_temp": "20",
            "min_temp": "10",
            "weather_id": 800
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uri": "wear://watch-1/wearable"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let channel = Arc::new(HttpCompanionChannel::new(&companion_config(&mock_server)).unwrap());
    let mirror = CompanionMirror::new(channel, Duration::from_secs(2));
    let record = WeatherRecord::new(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(), 10.0, 20.0, 800);

    let outcome = mirror
        .push(&CompanionMessage::from_record(&record, chrono::Utc::now()))
        .await;

    assert!(outcome.is_delivered());
}

#[tokio::test]
async fn test_companion_receipt_falls_back_to_request_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/wearable"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let channel = HttpCompanionChannel::new(&companion_config(&mock_server)).unwrap();
    let receipt = channel
        .put_data_item("/wearable", serde_json::Map::new())
        .await
        .unwrap();

    assert_eq!(receipt.uri, format!("{}/wearable", mock_server.uri()));
}

#[tokio::test]
async fn test_companion_handshake_refused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let channel = Arc::new(HttpCompanionChannel::new(&companion_config(&mock_server)).unwrap());
    let err = channel.connect().await.unwrap_err();
    assert!(matches!(err, CompanionError::HandshakeFailed(_)));
    assert!(err.is_unavailable());

    let mirror = CompanionMirror::new(channel, Duration::from_secs(2));
    let record = WeatherRecord::new(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(), 1.0, 2.0, 600);
    let outcome = mirror
        .push(&CompanionMessage::from_record(&record, chrono::Utc::now()))
        .await;
    assert!(!outcome.is_delivered());
}

#[tokio::test]
async fn test_companion_put_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/wearable"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&mock_server)
        .await;

    let channel = HttpCompanionChannel::new(&companion_config(&mock_server)).unwrap();
    let err = channel
        .put_data_item("/wearable", serde_json::Map::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CompanionError::Rejected(_)));
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn test_end_to_end_sync_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast/daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cod": "200",
            "cnt": 3,
            "list": [owm_day(10.0, 20.0, 800), owm_day(8.0, 18.0, 500), owm_day(5.0, 15.0, 200)]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/wearable"))
        .and(body_partial_json(serde_json::json!({"weather_id": 800})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SqliteWeatherStore::in_memory().unwrap());
    let start = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
    let orchestrator = SyncOrchestrator::new(
        Arc::new(HttpWeatherFetcher::new(&weather_config(&mock_server)).unwrap()),
        Arc::new(OwmJsonParser::starting(start)),
        store.clone(),
        CompanionMirror::new(
            Arc::new(HttpCompanionChannel::new(&companion_config(&mock_server)).unwrap()),
            Duration::from_secs(2),
        ),
        NotificationThrottle::new(store.clone()),
        Arc::new(LogNotifier::new(Default::default())),
        Arc::new(SharedPreferences::new(true)),
    );

    let outcome = orchestrator
        .sync_weather(&LocationConfig::named("94043,USA"))
        .await;

    assert_eq!(outcome, SyncOutcome::Updated);
    let snapshot = store.latest().unwrap().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.first().date, start);
    assert_eq!(snapshot.first().humidity, 60.0);
    assert!(store.last_synced_at().unwrap().is_some());
}

#[tokio::test]
async fn test_city_not_found_over_http_is_no_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast/daily"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(SqliteWeatherStore::in_memory().unwrap());
    let orchestrator = SyncOrchestrator::new(
        Arc::new(HttpWeatherFetcher::new(&weather_config(&mock_server)).unwrap()),
        Arc::new(OwmJsonParser::new()),
        store.clone(),
        CompanionMirror::new(
            Arc::new(HttpCompanionChannel::new(&companion_config(&mock_server)).unwrap()),
            Duration::from_secs(2),
        ),
        NotificationThrottle::new(store.clone()),
        Arc::new(LogNotifier::new(Default::default())),
        Arc::new(SharedPreferences::new(true)),
    );

    let outcome = orchestrator
        .sync_weather(&LocationConfig::named("Atlantis"))
        .await;

    assert_eq!(outcome, SyncOutcome::NoData);
    assert!(store.latest().unwrap().is_none());
}
