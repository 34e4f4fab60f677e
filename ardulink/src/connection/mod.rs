//! The byte-oriented transport boundary.
//!
//! The core never reads from a device itself. A [`Connection`] is handed an
//! [`Inbound`] sink when its shared link is assembled and pushes every
//! received chunk through it, from one flow of control per connection.

use std::sync::Weak;

use crate::{error::ConnectionError, link::SharedLink};

mod stream;

pub use stream::StreamConnection;

pub trait Connection: Send + Sync {
    /// Queues bytes for the device. Must not block on device I/O.
    ///
    /// May deliver inbound bytes synchronously before returning. Listeners
    /// reached that way must not start or stop listening on the same link.
    fn write(&self, bytes: &[u8]) -> Result<(), ConnectionError>;

    /// Called once, right after the shared link owning this connection exists.
    fn attach(&self, inbound: Inbound);

    /// Closes the transport. Called at most once by the core.
    fn close(&self) -> Result<(), ConnectionError>;
}

/// Delivers received bytes to the shared link that owns a connection.
#[derive(Clone)]
pub struct Inbound {
    link: Weak<SharedLink>,
}

impl Inbound {
    pub(crate) fn new(link: Weak<SharedLink>) -> Self {
        Self { link }
    }

    /// Returns `false` once the link is gone; the transport should stop reading.
    pub fn deliver(&self, chunk: &[u8]) -> bool {
        match self.link.upgrade() {
            Some(link) if !link.is_closed() => {
                link.on_bytes(chunk);
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Inbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbound")
            .field("attached", &(self.link.strong_count() > 0))
            .finish()
    }
}
