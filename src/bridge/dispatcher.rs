//! Routes inbound events to the bridge.
//!
//! Each platform stream is consumed by its own task. Events are fanned out to
//! one lane per channel; a lane handles its events strictly in order, so
//! messages from one channel reach the other side in the order they were
//! posted while different channels proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::common::messages::InboundEvent;
use crate::common::types::{ChannelKey, Platform};

use super::channels::BridgeReceivers;
use super::orchestrator::Bridge;

/// How long shutdown waits for in-flight forwards.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Dispatcher {
    bridge: Arc<Bridge>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(bridge: Arc<Bridge>, cancel: CancellationToken) -> Self {
        Self {
            bridge,
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Start consuming both platform streams.
    pub fn start(&self, receivers: BridgeReceivers) {
        self.spawn_stream(Platform::Discord, receivers.discord_rx);
        self.spawn_stream(Platform::Stoat, receivers.stoat_rx);
    }

    fn spawn_stream(&self, platform: Platform, rx: mpsc::UnboundedReceiver<InboundEvent>) {
        let bridge = Arc::clone(&self.bridge);
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        self.tracker
            .spawn(consume_stream(bridge, platform, rx, cancel, tracker));
    }

    /// Stop intake and wait for lanes to finish their current event.
    ///
    /// Returns false if the timeout elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.cancel.cancel();
        self.tracker.close();
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("Bridge drained");
                true
            }
            Err(_) => {
                warn!("Bridge drain timed out");
                false
            }
        }
    }
}

async fn consume_stream(
    bridge: Arc<Bridge>,
    platform: Platform,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let mut lanes: HashMap<ChannelKey, mpsc::UnboundedSender<InboundEvent>> = HashMap::new();

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let channel_id = event.channel_id().to_string();
        if !bridge.registry().contains(platform, &channel_id) {
            continue;
        }

        let lane = lanes.entry(channel_id.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tracker.spawn(run_lane(Arc::clone(&bridge), rx, cancel.clone()));
            debug!(platform = %platform, channel_id = %channel_id, "Opened channel lane");
            tx
        });

        if lane.send(event).is_err() {
            lanes.remove(&channel_id);
        }
    }

    debug!(platform = %platform, "Event stream closed");
}

async fn run_lane(
    bridge: Arc<Bridge>,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            InboundEvent::Message(msg) => bridge.on_message(msg).await,
            InboundEvent::Delete(delete) => bridge.on_delete(delete).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::bridge::channels::ChannelBundle;
    use crate::bridge::testing::{harness, message};

    #[tokio::test]
    async fn test_events_forwarded_in_channel_order() {
        let h = harness();
        let stoat = Arc::clone(&h.stoat);
        let dispatcher = Dispatcher::new(Arc::new(h.bridge), CancellationToken::new());

        let bundle = ChannelBundle::new();
        dispatcher.start(bundle.bridge);

        for i in 0..5 {
            let event = InboundEvent::Message(message(
                Platform::Discord,
                "D1",
                &format!("d-{}", i),
                &format!("message {}", i),
            ));
            bundle.adapters.discord_tx.send(event).unwrap();
        }
        // Unbridged channel is dropped before reaching a lane.
        bundle
            .adapters
            .discord_tx
            .send(InboundEvent::Message(message(Platform::Discord, "D9", "x", "lost")))
            .unwrap();

        for _ in 0..100 {
            if stoat.sent().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let contents: Vec<String> = stoat.sent().into_iter().map(|s| s.content).collect();
        let expected: Vec<String> = (0..5).map(|i| format!("message {}", i)).collect();
        assert_eq!(contents, expected);

        assert!(dispatcher.shutdown(SHUTDOWN_TIMEOUT).await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_intake() {
        let h = harness();
        let stoat = Arc::clone(&h.stoat);
        let dispatcher = Dispatcher::new(Arc::new(h.bridge), CancellationToken::new());

        let bundle = ChannelBundle::new();
        dispatcher.start(bundle.bridge);
        assert!(dispatcher.shutdown(SHUTDOWN_TIMEOUT).await);

        let _ = bundle
            .adapters
            .discord_tx
            .send(InboundEvent::Message(message(Platform::Discord, "D1", "late", "late")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(stoat.sent().is_empty());
    }
}
