//! Standalone FLV relay server.
//!
//! Publishers push an FLV stream under a key with `PUBLISH <key>`; any number of
//! players attach to a live key with `PLAY <key>` and receive the header followed
//! by tags from the moment they joined.

pub mod error;
pub mod registry;
pub mod server;

pub use error::{RegistryError, ServerError};
pub use registry::{Channel, ChannelRegistry, DEFAULT_CHANNEL_CAPACITY};
pub use server::{RelayServer, RelayServerConfig, DEFAULT_LISTEN_ADDR};
