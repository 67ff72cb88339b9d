//! The sync cycle: fetch, parse, replace, mirror, notify.
//!
//! At most one cycle runs at a time in the process. Callers that arrive while
//! a cycle is in flight wait for it to finish and then run their own.
//! Everything after the store replacement is best-effort and cannot change
//! the outcome.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sunsync_core::LocationConfig;
use tokio::sync::Mutex;

use crate::companion::{CompanionMessage, CompanionMirror};
use crate::notifier::Notifier;
use crate::parser::PayloadParser;
use crate::provider::WeatherFetcher;
use crate::store::DatasetStore;
use crate::throttle::NotificationThrottle;
use crate::types::{ParsedForecast, WeatherRecord};

/// Process-wide single-flight gate for sync cycles
static SYNC_GATE: Mutex<()> = Mutex::const_new(());

/// Stage of the cycle that aborted it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Parse,
    Store,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Parse => write!(f, "parse"),
            Self::Store => write!(f, "store"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub stage: SyncStage,
    pub reason: String,
}

impl SyncFailure {
    fn new(stage: SyncStage, err: impl std::fmt::Display) -> Self {
        Self {
            stage,
            reason: err.to_string(),
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new snapshot is in the store
    Updated,
    /// The server answered but had nothing to show; store untouched
    NoData,
    /// The cycle aborted before replacing the store
    Failed(SyncFailure),
}

impl SyncOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Read-only user preferences consulted on every cycle.
pub trait Preferences: Send + Sync {
    fn notifications_enabled(&self) -> bool;
}

/// Preferences held in memory, changeable at runtime
#[derive(Debug, Default)]
pub struct SharedPreferences {
    notifications_enabled: AtomicBool,
}

impl SharedPreferences {
    pub fn new(notifications_enabled: bool) -> Self {
        Self {
            notifications_enabled: AtomicBool::new(notifications_enabled),
        }
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications_enabled.store(enabled, Ordering::Relaxed);
    }
}

impl Preferences for SharedPreferences {
    fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::Relaxed)
    }
}

pub struct SyncOrchestrator {
    fetcher: Arc<dyn WeatherFetcher>,
    parser: Arc<dyn PayloadParser>,
    store: Arc<dyn DatasetStore>,
    mirror: CompanionMirror,
    throttle: NotificationThrottle,
    notifier: Arc<dyn Notifier>,
    preferences: Arc<dyn Preferences>,
}

impl SyncOrchestrator {
    pub fn new(
        fetcher: Arc<dyn WeatherFetcher>,
        parser: Arc<dyn PayloadParser>,
        store: Arc<dyn DatasetStore>,
        mirror: CompanionMirror,
        throttle: NotificationThrottle,
        notifier: Arc<dyn Notifier>,
        preferences: Arc<dyn Preferences>,
    ) -> Self {
        Self {
            fetcher,
            parser,
            store,
            mirror,
            throttle,
            notifier,
            preferences,
        }
    }

    /// Run one sync cycle for `location`. Never panics or propagates errors.
    pub async fn sync_weather(&self, location: &LocationConfig) -> SyncOutcome {
        self.sync_weather_at(location, Utc::now()).await
    }

    /// Run one sync cycle using `now` as the wall clock for mirroring and throttling.
    pub async fn sync_weather_at(
        &self,
        location: &LocationConfig,
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        let _guard = SYNC_GATE.lock().await;
        let started = Instant::now();
        let place = location.describe();
        tracing::info!("Starting weather sync for {}", place);

        let outcome = match self.run_cycle(location, now).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                tracing::error!(
                    stage = %failure.stage,
                    location = %place,
                    "Weather sync failed: {}",
                    failure.reason
                );
                SyncOutcome::Failed(failure)
            }
        };

        tracing::info!(
            "Weather sync for {} finished in {:?}: {:?}",
            place,
            started.elapsed(),
            outcome
        );
        outcome
    }

    async fn run_cycle(
        &self,
        location: &LocationConfig,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncFailure> {
        let raw = self
            .fetcher
            .fetch(location)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    tracing::debug!("Fetch failure is transient, next refresh will retry");
                }
                SyncFailure::new(SyncStage::Fetch, e)
            })?;

        let snapshot = match self
            .parser
            .parse(&raw)
            .map_err(|e| SyncFailure::new(SyncStage::Parse, e))?
        {
            ParsedForecast::Data(snapshot) => snapshot,
            ParsedForecast::Empty(reason) => {
                tracing::info!("No forecast data for {}: {}", location.describe(), reason);
                return Ok(SyncOutcome::NoData);
            }
        };

        self.store
            .replace_at(&snapshot, now)
            .map_err(|e| SyncFailure::new(SyncStage::Store, e))?;
        tracing::info!("Replaced forecast snapshot ({} days)", snapshot.len());

        // Past this point the cycle has succeeded.
        let today = match self.store.first_record() {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("Store empty right after replace, skipping mirror and notification");
                return Ok(SyncOutcome::Updated);
            }
            Err(e) => {
                tracing::warn!("Could not read back first record: {}", e);
                return Ok(SyncOutcome::Updated);
            }
        };

        // Logged inside push
        self.mirror
            .push(&CompanionMessage::from_record(&today, now))
            .await;

        self.maybe_notify(&today, now);

        Ok(SyncOutcome::Updated)
    }

    fn maybe_notify(&self, today: &WeatherRecord, now: DateTime<Utc>) {
        let enabled = self.preferences.notifications_enabled();
        if !self.throttle.should_notify(now, enabled) {
            tracing::debug!("Notification skipped (enabled: {})", enabled);
            return;
        }

        match self.notifier.notify_new_weather(today) {
            Ok(()) => {
                if let Err(e) = self.throttle.mark_notified(now) {
                    tracing::warn!("Could not persist notification time: {}", e);
                }
            }
            Err(e) => tracing::warn!("Notification failed: {}", e),
        }
    }
}
