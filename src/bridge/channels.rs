//! Event channels between the platform adapters and the bridge.

use tokio::sync::mpsc;

use crate::common::messages::InboundEvent;

/// Sending halves, handed to the platform gateways.
#[derive(Clone)]
pub struct AdapterSenders {
    /// Events observed on Discord.
    pub discord_tx: mpsc::UnboundedSender<InboundEvent>,
    /// Events observed on Stoat.
    pub stoat_tx: mpsc::UnboundedSender<InboundEvent>,
}

/// Receiving halves, consumed by the dispatcher.
pub struct BridgeReceivers {
    pub discord_rx: mpsc::UnboundedReceiver<InboundEvent>,
    pub stoat_rx: mpsc::UnboundedReceiver<InboundEvent>,
}

/// Bundle of all channels created for the bridge.
pub struct ChannelBundle {
    pub adapters: AdapterSenders,
    pub bridge: BridgeReceivers,
}

impl ChannelBundle {
    pub fn new() -> Self {
        let (discord_tx, discord_rx) = mpsc::unbounded_channel();
        let (stoat_tx, stoat_rx) = mpsc::unbounded_channel();

        Self {
            adapters: AdapterSenders {
                discord_tx,
                stoat_tx,
            },
            bridge: BridgeReceivers {
                discord_rx,
                stoat_rx,
            },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
