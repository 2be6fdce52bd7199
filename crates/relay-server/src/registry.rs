//! Live channels keyed by stream key.

use crate::error::{RegistryError, RegistryResult};
use std::collections::HashMap;
use std::sync::Arc;
use streamgate_media::{Packet, StreamDescriptor};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Packets buffered per channel before a slow player starts skipping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 512;

/// One published stream: its tracks and the fan-out of its packets.
///
/// The channel stays open for as long as the publisher holds it; players
/// only hold receivers, so dropping the publisher's handle ends every play.
#[derive(Debug)]
pub struct Channel {
    key: String,
    streams: Vec<StreamDescriptor>,
    packets: broadcast::Sender<Packet>,
}

impl Channel {
    fn new(key: String, streams: Vec<StreamDescriptor>, capacity: usize) -> Self {
        let (packets, _) = broadcast::channel(capacity);
        Self {
            key,
            streams,
            packets,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    /// Receiver positioned at the latest packet.
    pub fn subscribe(&self) -> broadcast::Receiver<Packet> {
        self.packets.subscribe()
    }

    /// Fan a packet out to current players. Returns how many received it.
    pub fn publish(&self, packet: Packet) -> usize {
        // No players is not an error.
        self.packets.send(packet).unwrap_or(0)
    }

    pub fn player_count(&self) -> usize {
        self.packets.receiver_count()
    }
}

/// Registry of live channels: at most one publisher per key, any number of players.
pub struct ChannelRegistry {
    channels: Arc<RwLock<HashMap<String, Arc<Channel>>>>,
    capacity: usize,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChannelRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Register a channel for `key`, failing if one is already live.
    pub async fn register(
        &self,
        key: &str,
        streams: Vec<StreamDescriptor>,
    ) -> RegistryResult<Arc<Channel>> {
        let mut channels = self.channels.write().await;
        if channels.contains_key(key) {
            return Err(RegistryError::AlreadyPublishing {
                key: key.to_string(),
            });
        }

        let channel = Arc::new(Channel::new(key.to_string(), streams, self.capacity));
        channels.insert(key.to_string(), channel.clone());
        debug!("Registered channel {}", key);
        Ok(channel)
    }

    /// Drop the channel for `key`. Players see end of stream once the publisher's handle goes too.
    pub async fn remove(&self, key: &str) -> Option<Arc<Channel>> {
        let removed = self.channels.write().await.remove(key);
        if removed.is_some() {
            debug!("Removed channel {}", key);
        }
        removed
    }

    pub async fn lookup(&self, key: &str) -> RegistryResult<Arc<Channel>> {
        let channels = self.channels.read().await;
        channels
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
            })
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.channels.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let channels = self.channels.read().await;
        let mut keys: Vec<String> = channels.keys().cloned().collect();
        keys.sort();
        keys
    }
}
