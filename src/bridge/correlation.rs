//! Bounded bidirectional map between mirrored message ids.
//!
//! Each entry links a Discord message to its Stoat counterpart and remembers
//! which side the original was posted on. Capacity is fixed; the least
//! recently used pair is evicted first and lookups refresh recency.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::common::types::{MessageKey, PeerMessage, Platform};

#[derive(Debug)]
struct Entry {
    stoat_id: MessageKey,
    origin: Platform,
}

/// LRU cache of message pairs, indexed from both platforms.
///
/// Pairs live in the LRU keyed by Discord id; `by_stoat` maps back to that
/// key and is pruned whenever the LRU drops an entry.
#[derive(Debug)]
pub struct MessageCorrelationCache {
    entries: LruCache<MessageKey, Entry>,
    by_stoat: HashMap<MessageKey, MessageKey>,
}

impl MessageCorrelationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            by_stoat: HashMap::new(),
        }
    }

    /// Record that `discord_id` and `stoat_id` are the same message.
    ///
    /// Any pair already touching either id is dropped from both directions.
    pub fn record(&mut self, discord_id: &str, stoat_id: &str, origin: Platform) {
        if let Some(previous) = self.by_stoat.remove(stoat_id) {
            if previous != discord_id {
                self.entries.pop(&previous);
            }
        }

        let entry = Entry {
            stoat_id: stoat_id.to_string(),
            origin,
        };
        // `push` hands back either the replaced value for this key or the evicted pair.
        if let Some((dropped_key, dropped)) = self.entries.push(discord_id.to_string(), entry) {
            if self.by_stoat.get(&dropped.stoat_id) == Some(&dropped_key) {
                self.by_stoat.remove(&dropped.stoat_id);
            }
        }
        self.by_stoat.insert(stoat_id.to_string(), discord_id.to_string());
    }

    /// Find the counterpart of a message seen on `platform`.
    pub fn lookup(&mut self, platform: Platform, message_id: &str) -> Option<PeerMessage> {
        let (discord_id, entry) = match platform {
            Platform::Discord => (message_id.to_string(), self.entries.get(message_id)?),
            Platform::Stoat => {
                let discord_id = self.by_stoat.get(message_id)?.clone();
                let entry = self.entries.get(&discord_id)?;
                (discord_id, entry)
            }
        };

        let peer_id = match platform {
            Platform::Discord => entry.stoat_id.clone(),
            Platform::Stoat => discord_id,
        };
        Some(PeerMessage {
            id: peer_id,
            // The peer copy was made by the bridge when the lookup side is the origin.
            mirrored: entry.origin == platform,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
