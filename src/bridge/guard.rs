//! Suppression of delete echoes caused by the bridge itself.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::common::types::{MessageKey, Platform};

/// Markers for deletes the bridge is about to perform.
///
/// A marker is consumed by the first matching delete event, so the echo of a
/// bridge-issued delete is not mirrored back.
#[derive(Debug, Default)]
pub struct LoopGuard {
    markers: Mutex<HashSet<(Platform, MessageKey)>>,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that the bridge is about to delete `message_id` on `platform`.
    pub async fn mark_self_initiated(&self, platform: Platform, message_id: &str) {
        self.markers
            .lock()
            .await
            .insert((platform, message_id.to_string()));
    }

    /// Returns true exactly once per marker, removing it.
    pub async fn consume_if_self_initiated(&self, platform: Platform, message_id: &str) -> bool {
        self.markers
            .lock()
            .await
            .remove(&(platform, message_id.to_string()))
    }

    /// Drop a marker whose delete will never echo back.
    pub async fn release(&self, platform: Platform, message_id: &str) {
        self.markers
            .lock()
            .await
            .remove(&(platform, message_id.to_string()));
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.markers.lock().await.len()
    }
}
