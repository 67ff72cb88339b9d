//! User-facing "new weather" notification.

use sunsync_core::TemperatureUnit;

use crate::error::NotifyError;
use crate::types::WeatherRecord;

pub const NOTIFICATION_TITLE: &str = "sunsync";

/// Surfaces a notification for today's forecast.
pub trait Notifier: Send + Sync {
    /// # Errors
    /// The platform could not display the notification.
    fn notify_new_weather(&self, today: &WeatherRecord) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherNotification {
    pub title: String,
    pub body: String,
}

impl WeatherNotification {
    pub fn for_record(today: &WeatherRecord, unit: TemperatureUnit) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: format!(
                "Forecast: {} - High: {} Low: {}",
                today.condition().description(),
                format_temperature(today.max_temp, unit),
                format_temperature(today.min_temp, unit),
            ),
        }
    }
}

/// Format a stored (metric) temperature for display, rounded to whole degrees.
pub fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    let value = match unit {
        TemperatureUnit::Metric => celsius,
        TemperatureUnit::Imperial => celsius * 1.8 + 32.0,
    };
    format!("{:.0}°", value)
}

/// Renders notifications into the log. Used where no desktop notification
/// service is available.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    unit: TemperatureUnit,
}

impl LogNotifier {
    pub fn new(unit: TemperatureUnit) -> Self {
        Self { unit }
    }
}

impl Notifier for LogNotifier {
    fn notify_new_weather(&self, today: &WeatherRecord) -> Result<(), NotifyError> {
        let notification = WeatherNotification::for_record(today, self.unit);
        tracing::info!(title = %notification.title, "{}", notification.body);
        Ok(())
    }
}
