//! Outbound packet sinks for connected players.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use tracing::warn;
use voxelhost_core::UniqueId;
use voxelhost_net::ServerPacket;

/// A player able to observe containers.
///
/// Sends never block: a full or disconnected queue drops the packet with a
/// warning so a slow client cannot stall the mutation path.
#[derive(Clone)]
pub struct Viewer {
    id: UniqueId,
    sink: SyncSender<ServerPacket>,
}

impl Viewer {
    /// Wrap an existing sink.
    pub fn new(id: UniqueId, sink: SyncSender<ServerPacket>) -> Self {
        Self { id, sink }
    }

    /// Create a viewer with a fresh bounded queue.
    pub fn channel(id: UniqueId, capacity: usize) -> (Self, Receiver<ServerPacket>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self::new(id, tx), rx)
    }

    /// Unique id of the viewing player.
    pub fn id(&self) -> UniqueId {
        self.id
    }

    /// Queue a packet. Returns `false` when it was dropped.
    pub fn send(&self, packet: ServerPacket) -> bool {
        match self.sink.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(viewer = %self.id, "Outbound queue full, dropping packet");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(viewer = %self.id, "Viewer disconnected, dropping packet");
                false
            }
        }
    }
}

impl PartialEq for Viewer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Viewer {}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer").field("id", &self.id).finish()
    }
}
