// src/lib.rs
//
// Server-side MoldUDP64 publisher: sequences producer payloads, packs them
// into MTU-bounded downstream packets, multicasts them, heartbeats during
// silence, and serves unicast recovery requests against a log + ring buffer.
// No subscriber/consumer side, no TCP glimpse, no auth/encryption.

pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod net;
pub mod publisher;
pub mod recovery_buffer;
pub mod recovery_log;
pub mod recovery_server;
pub mod registry;
pub mod util;

pub use codec::{DecodedPacket, StreamName};
pub use config::StreamConfig;
pub use error::{MoldError, Result};
pub use publisher::{Publisher, PublisherHandle};
pub use recovery_buffer::RecoveryBuffer;
pub use recovery_log::RecoveryLog;
pub use recovery_server::RecoveryServer;
pub use registry::Registry;
