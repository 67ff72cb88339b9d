//! SQLite-backed storage for the current forecast snapshot and the
//! notification clock.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::StoreError;
use crate::types::{Snapshot, WeatherRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";
const KEY_LAST_NOTIFIED: &str = "last_notified_at";
const KEY_LAST_SYNCED: &str = "last_synced_at";

const RECORD_COLUMNS: &str =
    "date, min_temp, max_temp, weather_id, humidity, pressure, wind_speed, wind_direction";

/// Holds exactly one snapshot. `replace` is atomic for every reader.
pub trait DatasetStore: Send + Sync {
    /// Swap the stored snapshot for `snapshot`, stamping it as synced at `synced_at`.
    ///
    /// # Errors
    /// On failure the previous snapshot is still in place.
    fn replace_at(&self, snapshot: &Snapshot, synced_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// [`replace_at`](Self::replace_at) using the wall clock.
    fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.replace_at(snapshot, Utc::now())
    }

    fn latest(&self) -> Result<Option<Snapshot>, StoreError>;

    /// The soonest record of the current snapshot
    fn first_record(&self) -> Result<Option<WeatherRecord>, StoreError>;
}

/// Persists the time of the last shown notification.
pub trait NotificationStateStore: Send + Sync {
    fn last_notified_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn set_last_notified_at(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// SQLite implementation of both stores.
pub struct SqliteWeatherStore {
    conn: Mutex<Connection>,
}

impl SqliteWeatherStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store, mostly for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather (
                date TEXT PRIMARY KEY,
                min_temp REAL NOT NULL,
                max_temp REAL NOT NULL,
                weather_id INTEGER NOT NULL,
                humidity REAL NOT NULL,
                pressure REAL NOT NULL,
                wind_speed REAL NOT NULL,
                wind_direction REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sync_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Point lookup of the record for one day.
    pub fn record_for_date(&self, date: NaiveDate) -> Result<Option<WeatherRecord>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM weather WHERE date = ?1", RECORD_COLUMNS);
        let record = conn
            .query_row(
                &sql,
                params![date.format(DATE_FORMAT).to_string()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn record_count(&self) -> Result<u32, StoreError> {
        let count: u32 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))?;
        Ok(count)
    }

    /// When the current snapshot was written.
    pub fn last_synced_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.get_timestamp(KEY_LAST_SYNCED)
    }

    /// Drop the snapshot and all sync state.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute_batch("DELETE FROM weather; DELETE FROM sync_state;")?;
        Ok(())
    }

    fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let value: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Ok(None),
            Some(s) => {
                let millis: i64 = s
                    .parse()
                    .map_err(|_| StoreError::Corrupt(format!("{} = {:?}", key, s)))?;
                DateTime::from_timestamp_millis(millis)
                    .map(Some)
                    .ok_or_else(|| StoreError::Corrupt(format!("{} out of range", key)))
            }
        }
    }

    fn set_timestamp(conn: &Connection, key: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?1, ?2)",
            params![key, at.timestamp_millis().to_string()],
        )?;
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<WeatherRecord> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(WeatherRecord {
            date,
            min_temp: row.get(1)?,
            max_temp: row.get(2)?,
            weather_condition_id: row.get(3)?,
            humidity: row.get(4)?,
            pressure: row.get(5)?,
            wind_speed: row.get(6)?,
            wind_direction: row.get(7)?,
        })
    }
}

impl DatasetStore for SqliteWeatherStore {
    fn replace_at(&self, snapshot: &Snapshot, synced_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        // Dropping the transaction without commit rolls it back.
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM weather", [])?;
        {
            let sql = format!(
                "INSERT INTO weather ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                RECORD_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            for record in snapshot.records() {
                stmt.execute(params![
                    record.date.format(DATE_FORMAT).to_string(),
                    record.min_temp,
                    record.max_temp,
                    record.weather_condition_id,
                    record.humidity,
                    record.pressure,
                    record.wind_speed,
                    record.wind_direction,
                ])?;
            }
        }
        Self::set_timestamp(&tx, KEY_LAST_SYNCED, synced_at)?;

        tx.commit()?;
        tracing::debug!("Stored snapshot of {} records", snapshot.len());
        Ok(())
    }

    fn latest(&self) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM weather ORDER BY date ASC", RECORD_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        if records.is_empty() {
            return Ok(None);
        }

        Snapshot::new(records)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn first_record(&self) -> Result<Option<WeatherRecord>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM weather ORDER BY date ASC LIMIT 1",
            RECORD_COLUMNS
        );
        let record = conn.query_row(&sql, [], Self::row_to_record).optional()?;
        Ok(record)
    }
}

impl NotificationStateStore for SqliteWeatherStore {
    fn last_notified_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.get_timestamp(KEY_LAST_NOTIFIED)
    }

    fn set_last_notified_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        Self::set_timestamp(&conn, KEY_LAST_NOTIFIED, at)
    }
}
