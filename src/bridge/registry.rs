//! Static pairing of Discord and Stoat channels.

use std::collections::{HashMap, HashSet};

use crate::common::error::ConfigError;
use crate::common::types::Platform;

/// A configured Discord/Stoat channel pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPair {
    pub discord_id: String,
    pub stoat_id: String,
}

/// Bijection between bridged Discord and Stoat channels.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug)]
pub struct ChannelPairRegistry {
    pairs: Vec<ChannelPair>,
    discord_to_stoat: HashMap<String, String>,
    stoat_to_discord: HashMap<String, String>,
}

impl ChannelPairRegistry {
    /// Pair the two id lists index by index.
    pub fn new(discord_ids: &[String], stoat_ids: &[String]) -> Result<Self, ConfigError> {
        if discord_ids.len() != stoat_ids.len() {
            return Err(ConfigError::ChannelCountMismatch {
                discord: discord_ids.len(),
                stoat: stoat_ids.len(),
            });
        }
        if discord_ids.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        let mut seen = HashSet::new();
        for id in discord_ids.iter().chain(stoat_ids) {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::DuplicateChannel {
                    channel_id: id.clone(),
                });
            }
        }

        let pairs: Vec<ChannelPair> = discord_ids
            .iter()
            .zip(stoat_ids)
            .map(|(discord_id, stoat_id)| ChannelPair {
                discord_id: discord_id.clone(),
                stoat_id: stoat_id.clone(),
            })
            .collect();

        let discord_to_stoat = pairs
            .iter()
            .map(|p| (p.discord_id.clone(), p.stoat_id.clone()))
            .collect();
        let stoat_to_discord = pairs
            .iter()
            .map(|p| (p.stoat_id.clone(), p.discord_id.clone()))
            .collect();

        Ok(Self {
            pairs,
            discord_to_stoat,
            stoat_to_discord,
        })
    }

    /// Channel on the peer platform bridged with `channel_id`, if any.
    pub fn peer_of(&self, platform: Platform, channel_id: &str) -> Option<&str> {
        let map = match platform {
            Platform::Discord => &self.discord_to_stoat,
            Platform::Stoat => &self.stoat_to_discord,
        };
        map.get(channel_id).map(String::as_str)
    }

    /// Whether `channel_id` is bridged on `platform`.
    pub fn contains(&self, platform: Platform, channel_id: &str) -> bool {
        self.peer_of(platform, channel_id).is_some()
    }

    /// Configured pairs in declaration order.
    pub fn pairs(&self) -> impl Iterator<Item = &ChannelPair> {
        self.pairs.iter()
    }

    /// Bridged channel ids on one platform.
    pub fn channels(&self, platform: Platform) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(move |p| match platform {
            Platform::Discord => p.discord_id.as_str(),
            Platform::Stoat => p.stoat_id.as_str(),
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pairs_by_position() {
        let registry = ChannelPairRegistry::new(&ids(&["D1", "D2"]), &ids(&["S1", "S2"])).unwrap();

        assert_eq!(registry.peer_of(Platform::Discord, "D2"), Some("S2"));
        assert_eq!(registry.peer_of(Platform::Stoat, "S1"), Some("D1"));
        assert_eq!(registry.peer_of(Platform::Discord, "S1"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup_round_trips() {
        let registry = ChannelPairRegistry::new(&ids(&["D1", "D2"]), &ids(&["S1", "S2"])).unwrap();

        for pair in registry.pairs() {
            let stoat = registry.peer_of(Platform::Discord, &pair.discord_id).unwrap();
            assert_eq!(registry.peer_of(Platform::Stoat, stoat), Some(pair.discord_id.as_str()));
        }
    }

    #[test]
    fn test_unmapped_channel() {
        let registry = ChannelPairRegistry::new(&ids(&["D1"]), &ids(&["S1"])).unwrap();
        assert!(!registry.contains(Platform::Discord, "D9"));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = ChannelPairRegistry::new(&ids(&["D1", "D2"]), &ids(&["S1"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ChannelCountMismatch {
                discord: 2,
                stoat: 1
            }
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let err = ChannelPairRegistry::new(&[], &[]).unwrap_err();
        assert!(matches!(err, ConfigError::NoChannels));
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = ChannelPairRegistry::new(&ids(&["D1", "D1"]), &ids(&["S1", "S2"])).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateChannel { channel_id } if channel_id == "D1"));
    }

    #[test]
    fn test_channels_per_platform() {
        let registry = ChannelPairRegistry::new(&ids(&["D1", "D2"]), &ids(&["S1", "S2"])).unwrap();
        let stoat: Vec<&str> = registry.channels(Platform::Stoat).collect();
        assert_eq!(stoat, vec!["S1", "S2"]);
    }
}
