//! Weather sync for sunsync
//!
//! Fetches the daily forecast, keeps it as the single current snapshot in
//! SQLite, mirrors today's summary to a paired companion device and raises a
//! throttled "new weather" notification.

pub mod companion;
pub mod error;
pub mod listener;
pub mod notifier;
pub mod parser;
pub mod provider;
pub mod store;
pub mod sync;
pub mod throttle;
pub mod types;

pub use companion::{
    CompanionChannel, CompanionMessage, CompanionMirror, DataItemReceipt, DataMap,
    HttpCompanionChannel, MirrorOutcome, COMPANION_PATH,
};
pub use error::{CompanionError, FetchError, NotifyError, ParseError, SnapshotError, StoreError};
pub use listener::{CompanionListener, InboundMessage};
pub use notifier::{LogNotifier, Notifier, WeatherNotification};
pub use parser::{OwmJsonParser, PayloadParser};
pub use provider::{HttpWeatherFetcher, WeatherFetcher};
pub use store::{DatasetStore, NotificationStateStore, SqliteWeatherStore};
pub use sync::{
    Preferences, SharedPreferences, SyncFailure, SyncOrchestrator, SyncOutcome, SyncStage,
};
pub use throttle::NotificationThrottle;
pub use types::*;
