//! Inbound messages from the companion device.
//!
//! A message on [`COMPANION_PATH`] asks for a fresh sync; anything else on the
//! channel belongs to someone else and is ignored.

use std::sync::Arc;
use sunsync_core::LocationConfig;
use tokio::sync::mpsc;

use crate::companion::COMPANION_PATH;
use crate::sync::{SyncOrchestrator, SyncOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub path: String,
}

impl InboundMessage {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn is_sync_request(&self) -> bool {
        self.path == COMPANION_PATH
    }
}

pub struct CompanionListener {
    orchestrator: Arc<SyncOrchestrator>,
    location: LocationConfig,
}

impl CompanionListener {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, location: LocationConfig) -> Self {
        Self {
            orchestrator,
            location,
        }
    }

    /// Handle one message. Returns the sync outcome when the message triggered a sync.
    pub async fn handle(&self, message: &InboundMessage) -> Option<SyncOutcome> {
        if !message.is_sync_request() {
            tracing::debug!("Ignoring companion message on {}", message.path);
            return None;
        }

        tracing::info!("Companion requested a weather sync");
        Some(self.orchestrator.sync_weather(&self.location).await)
    }

    /// Process messages until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = rx.recv().await {
            self.handle(&message).await;
        }
        tracing::debug!("Companion listener stopped");
    }
}
