//! Error types for each stage of the sync pipeline.

use chrono::NaiveDate;
use sunsync_core::{DatabaseError, NetworkError, RusqliteErrorExt};
use thiserror::Error;

/// Retrieving the raw forecast failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(e) if e.is_transient())
    }
}

/// The payload could not be decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot has no records")]
    Empty,

    #[error("duplicate date {0}")]
    DuplicateDate(NaiveDate),
}

/// Local storage failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Stored data is invalid: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.into_database_error())
    }
}

/// Mirroring to the companion device failed. Never fatal to a sync.
#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("No companion device paired")]
    NotPaired,

    #[error("Companion handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Companion {0} timed out")]
    Timeout(&'static str),

    #[error("Companion rejected data item: {0}")]
    Rejected(String),

    #[error("Companion transport error: {0}")]
    Transport(String),

    #[error("Invalid companion message: {0}")]
    InvalidMessage(String),
}

impl CompanionError {
    /// Expected outcomes when no peer is around; logged quieter than real faults
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotPaired | Self::HandshakeFailed(_) | Self::Timeout(_))
    }
}

/// Showing the notification failed. Never fatal to a sync.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifications unavailable: {0}")]
    Unavailable(String),
}
