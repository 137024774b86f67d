//! Fixtures for container and transaction tests.

use std::sync::mpsc::Receiver;
use voxelhost_core::{
    BlockPosition, ContainerId, ContainerRef, ContainerType, DimensionId, ItemRegistry, ItemStack,
    RegistryKey, UniqueId,
};
use voxelhost_net::ServerPacket;
use voxelhost_world::{Block, Entity, GameMode, Viewer};

/// Outbound queue capacity of recording viewers.
pub const RECORDING_CAPACITY: usize = 1024;

/// A viewer whose outbound packets are kept for inspection.
pub struct RecordingViewer {
    viewer: Viewer,
    rx: Receiver<ServerPacket>,
}

impl RecordingViewer {
    /// New recording viewer for `id`.
    pub fn new(id: i64) -> Self {
        let (viewer, rx) = Viewer::channel(UniqueId(id), RECORDING_CAPACITY);
        Self { viewer, rx }
    }

    /// The viewer handle to register with containers.
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Viewer id.
    pub fn id(&self) -> UniqueId {
        self.viewer.id()
    }

    /// Take every packet received so far.
    pub fn drain(&self) -> Vec<ServerPacket> {
        self.rx.try_iter().collect()
    }

    /// Slots updated through `InventorySlot` packets for `container_id`
    /// since the last drain.
    pub fn slot_updates(&self, container_id: ContainerId) -> Vec<u32> {
        self.drain()
            .into_iter()
            .filter_map(|packet| match packet {
                ServerPacket::InventorySlot {
                    container_id: id,
                    slot,
                    ..
                } if id == container_id => Some(slot),
                _ => None,
            })
            .collect()
    }
}

/// Parse a registry key, panicking on malformed input.
pub fn key(identifier: &str) -> RegistryKey {
    RegistryKey::parse(identifier).expect("valid registry key")
}

/// A stack of a vanilla item.
pub fn stack(identifier: &str, amount: u32) -> ItemStack {
    let registry = ItemRegistry::vanilla();
    let item_type = registry.get(identifier).expect("vanilla item").clone();
    ItemStack::new(item_type, amount)
}

/// A survival player in the overworld.
pub fn player(recording: &RecordingViewer) -> Entity {
    player_with_mode(recording, GameMode::Survival)
}

/// A player with the given game mode.
pub fn player_with_mode(recording: &RecordingViewer, game_mode: GameMode) -> Entity {
    Entity::player(
        key("player"),
        recording.viewer().clone(),
        DimensionId::Overworld,
        [0.5, 65.0, 0.5],
        game_mode,
    )
}

/// A 27-slot chest.
pub fn chest(position: BlockPosition) -> Block {
    Block::new(key("chest"), DimensionId::Overworld, position)
        .with_container(ContainerType::Container, 27)
}

/// Address of a block container in the overworld.
pub fn block_ref(position: BlockPosition) -> ContainerRef {
    ContainerRef::Block {
        dimension: DimensionId::Overworld,
        position,
    }
}
