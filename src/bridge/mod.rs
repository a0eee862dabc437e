//! Bridge core: pairing, correlation, loop prevention and the forwarding pipeline.
//!
//! ## Module Structure
//!
//! - `registry`: Discord/Stoat channel pairs
//! - `correlation`: bounded message id map used for replies and deletes
//! - `guard`: suppression of delete echoes
//! - `sanitizer`: mention and emoji resolution
//! - `attachments`: size-capped attachment relay
//! - `ledger`: persisted welcome notice record
//! - `platform`: traits implemented by the platform adapters
//! - `orchestrator`: the `Bridge` pipeline
//! - `channels` / `dispatcher`: event streams and per-channel lanes

pub mod attachments;
pub mod channels;
pub mod correlation;
pub mod dispatcher;
pub mod guard;
pub mod ledger;
pub mod orchestrator;
pub mod platform;
pub mod registry;
pub mod sanitizer;

#[cfg(test)]
pub(crate) mod testing;

pub use attachments::{AttachmentRelay, PendingAttachment};
pub use channels::{AdapterSenders, BridgeReceivers, ChannelBundle};
pub use correlation::MessageCorrelationCache;
pub use dispatcher::{Dispatcher, SHUTDOWN_TIMEOUT};
pub use guard::LoopGuard;
pub use ledger::NotificationLedger;
pub use orchestrator::Bridge;
pub use platform::{ChatPlatform, MentionLookup};
pub use registry::{ChannelPair, ChannelPairRegistry};
pub use sanitizer::ContentSanitizer;
