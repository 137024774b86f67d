//! Protocol message definitions for the container and transaction traffic.
//!
//! All messages use postcard serialization for compact binary encoding.
//! Every inbound message must pass [`ClientPacket::verify`] before it reaches
//! a handler.

use crate::descriptor::NetworkItemStackDescriptor;
use serde::{Deserialize, Serialize};
use voxelhost_core::{BlockPosition, ContainerId, ContainerName, ContainerType, UniqueId};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u16 = 1;

/// Protocol magic bytes to identify the voxelhost protocol.
pub const PROTOCOL_MAGIC: &[u8; 10] = b"VXHC\x00\x01\x00\x00\x00\x00";

/// Maximum item stack requests in one packet.
pub const MAX_STACK_REQUESTS: usize = 64;

/// Maximum actions in one item stack request.
pub const MAX_REQUEST_ACTIONS: usize = 32;

/// Maximum actions in one normal inventory transaction.
pub const MAX_TRANSACTION_ACTIONS: usize = 16;

/// Maximum slots in a bulk inventory snapshot.
pub const MAX_CONTENT_ITEMS: usize = 256;

/// Maximum units a single descriptor may carry.
pub const MAX_DESCRIPTOR_AMOUNT: u16 = 255;

/// Protocol limit violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Too many item stack requests in one packet.
    #[error("too many item stack requests ({count})")]
    TooManyRequests {
        /// Received count.
        count: usize,
    },
    /// Too many actions in one request or transaction.
    #[error("too many actions ({count}, max {max})")]
    TooManyActions {
        /// Received count.
        count: usize,
        /// Applicable limit.
        max: usize,
    },
    /// Too many slots in a snapshot.
    #[error("inventory snapshot too large ({count} slots)")]
    TooManyItems {
        /// Received count.
        count: usize,
    },
    /// Descriptor amount above the protocol limit.
    #[error("item amount {0} exceeds the descriptor limit")]
    AmountTooLarge(u16),
    /// Action count of zero.
    #[error("action count must be positive")]
    ZeroCount,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientPacket {
    /// Batch of named item stack requests.
    ItemStackRequest {
        /// Requests, applied in order.
        requests: Vec<ItemStackRequest>,
    },

    /// Legacy inventory transaction (drop, block interaction).
    InventoryTransaction {
        /// The transaction.
        transaction: InventoryTransaction,
    },

    /// The client closed a container UI.
    ContainerClose {
        /// Id of the container the client believes is open.
        container_id: ContainerId,
        /// Set when the client acknowledges a server-initiated close.
        server_initiated: bool,
    },
}

impl ClientPacket {
    /// Verify message limits and validity.
    ///
    /// This should be called on all received messages to prevent DoS attacks.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        match self {
            ClientPacket::ItemStackRequest { requests } => {
                if requests.len() > MAX_STACK_REQUESTS {
                    return Err(ProtocolError::TooManyRequests {
                        count: requests.len(),
                    });
                }
                for request in requests {
                    request.verify()?;
                }
            }
            ClientPacket::InventoryTransaction { transaction } => {
                transaction.verify()?;
            }
            ClientPacket::ContainerClose { .. } => {}
        }
        Ok(())
    }
}

/// One slot addressed by symbolic container name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackSlot {
    /// Container name.
    pub container: ContainerName,
    /// Slot within the named container.
    pub slot: u8,
}

impl StackSlot {
    /// Shorthand constructor.
    pub const fn new(container: ContainerName, slot: u8) -> Self {
        Self { container, slot }
    }
}

/// A single action inside an item stack request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ItemStackAction {
    /// Move `count` units from source to destination (pick up).
    Take {
        /// Units to move.
        count: u8,
        /// Where the units come from.
        source: StackSlot,
        /// Where the units go.
        destination: StackSlot,
    },
    /// Move `count` units from source to destination (put down).
    Place {
        /// Units to move.
        count: u8,
        /// Where the units come from.
        source: StackSlot,
        /// Where the units go.
        destination: StackSlot,
    },
    /// Exchange two slots.
    Swap {
        /// First slot.
        source: StackSlot,
        /// Second slot.
        destination: StackSlot,
    },
    /// Throw `count` units from a slot into the world.
    Drop {
        /// Units to drop.
        count: u8,
        /// Slot to drop from.
        source: StackSlot,
        /// Whether the client asked for a random spread.
        randomly: bool,
    },
    /// Discard `count` units (creative deletion).
    Destroy {
        /// Units to discard.
        count: u8,
        /// Slot to discard from.
        source: StackSlot,
    },
    /// Discard `count` units consumed by a craft.
    Consume {
        /// Units to discard.
        count: u8,
        /// Slot to discard from.
        source: StackSlot,
    },
    /// Materialize a new stack from the creative palette.
    CraftCreative {
        /// Item to create.
        item: NetworkItemStackDescriptor,
        /// Slot receiving the new stack.
        destination: StackSlot,
    },
}

impl ItemStackAction {
    fn verify(&self) -> Result<(), ProtocolError> {
        match self {
            ItemStackAction::Take { count, .. }
            | ItemStackAction::Place { count, .. }
            | ItemStackAction::Drop { count, .. }
            | ItemStackAction::Destroy { count, .. }
            | ItemStackAction::Consume { count, .. } => {
                if *count == 0 {
                    return Err(ProtocolError::ZeroCount);
                }
            }
            ItemStackAction::CraftCreative { item, .. } => {
                if item.amount > MAX_DESCRIPTOR_AMOUNT {
                    return Err(ProtocolError::AmountTooLarge(item.amount));
                }
            }
            ItemStackAction::Swap { .. } => {}
        }
        Ok(())
    }

    /// Every slot the action reads or writes.
    pub fn slots(&self) -> Vec<StackSlot> {
        match self {
            ItemStackAction::Take {
                source,
                destination,
                ..
            }
            | ItemStackAction::Place {
                source,
                destination,
                ..
            }
            | ItemStackAction::Swap {
                source,
                destination,
            } => vec![*source, *destination],
            ItemStackAction::Drop { source, .. }
            | ItemStackAction::Destroy { source, .. }
            | ItemStackAction::Consume { source, .. } => vec![*source],
            ItemStackAction::CraftCreative { destination, .. } => vec![*destination],
        }
    }
}

/// One client request: a batch of actions applied in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemStackRequest {
    /// Client-chosen id echoed in the response.
    pub client_request_id: i32,
    /// Actions, applied in order.
    pub actions: Vec<ItemStackAction>,
}

impl ItemStackRequest {
    /// Verify request limits.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        if self.actions.len() > MAX_REQUEST_ACTIONS {
            return Err(ProtocolError::TooManyActions {
                count: self.actions.len(),
                max: MAX_REQUEST_ACTIONS,
            });
        }
        self.actions.iter().try_for_each(ItemStackAction::verify)
    }
}

/// Where an inventory action's units come from or go to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InventorySourceType {
    /// A container slot.
    Container,
    /// Global (unused by the server).
    Global,
    /// The world (dropping or picking up).
    WorldInteraction,
    /// Creative palette.
    Creative,
    /// Untracked craft slots.
    Untracked,
}

/// Source of an inventory action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventorySource {
    /// Source kind.
    pub kind: InventorySourceType,
    /// Container id for `Container` sources.
    pub container_id: ContainerId,
}

/// One legacy inventory action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryAction {
    /// Action source.
    pub source: InventorySource,
    /// Slot within the source.
    pub slot: u32,
    /// Slot contents before the action.
    pub old_item: NetworkItemStackDescriptor,
    /// Slot contents after the action.
    pub new_item: NetworkItemStackDescriptor,
}

/// Legacy inventory transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InventoryTransaction {
    /// Plain slot changes; the server only acts on drops.
    Normal {
        /// The actions.
        actions: Vec<InventoryAction>,
    },
    /// The player used its held item on a block.
    ItemUseOnBlock {
        /// Target block.
        position: BlockPosition,
        /// Clicked face.
        face: u8,
        /// Whether the player is sneaking.
        sneaking: bool,
    },
}

impl InventoryTransaction {
    /// Verify transaction limits.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        if let InventoryTransaction::Normal { actions } = self {
            if actions.len() > MAX_TRANSACTION_ACTIONS {
                return Err(ProtocolError::TooManyActions {
                    count: actions.len(),
                    max: MAX_TRANSACTION_ACTIONS,
                });
            }
        }
        Ok(())
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerPacket {
    /// Single slot update.
    InventorySlot {
        /// Container id as assigned to the receiving viewer.
        container_id: ContainerId,
        /// Slot index.
        slot: u32,
        /// New slot contents.
        item: NetworkItemStackDescriptor,
    },

    /// Bulk snapshot of a container.
    InventoryContent {
        /// Container id as assigned to the receiving viewer.
        container_id: ContainerId,
        /// Every slot, in order.
        items: Vec<NetworkItemStackDescriptor>,
    },

    /// Open a container UI.
    ContainerOpen {
        /// Assigned id.
        container_id: ContainerId,
        /// Container kind.
        container_type: ContainerType,
        /// Block position of the anchor (entity position floored for entities).
        position: BlockPosition,
        /// Unique id of an entity anchor, `-1` for blocks.
        unique_id: UniqueId,
    },

    /// Close a container UI.
    ContainerClose {
        /// Id of the closed container.
        container_id: ContainerId,
        /// Container kind.
        container_type: ContainerType,
        /// Whether the server forced the close.
        server_initiated: bool,
    },

    /// Outcome of every item stack request in a packet.
    ItemStackResponse {
        /// One entry per request.
        responses: Vec<ItemStackResponse>,
    },

    /// Spawn a dropped item entity.
    AddItemActor {
        /// Entity unique id.
        unique_id: UniqueId,
        /// Runtime id.
        runtime_id: u64,
        /// Carried item.
        item: NetworkItemStackDescriptor,
        /// Spawn position.
        position: [f32; 3],
        /// Initial velocity.
        velocity: [f32; 3],
    },

    /// Remove an entity (picked-up or despawned item).
    RemoveActor {
        /// Entity unique id.
        unique_id: UniqueId,
    },

    /// Block state change (chest lid).
    BlockEvent {
        /// Block position.
        position: BlockPosition,
        /// Whether the block is now open.
        open: bool,
    },
}

impl ServerPacket {
    /// Verify message limits and validity.
    pub fn verify(&self) -> Result<(), ProtocolError> {
        match self {
            ServerPacket::InventoryContent { items, .. } => {
                if items.len() > MAX_CONTENT_ITEMS {
                    return Err(ProtocolError::TooManyItems { count: items.len() });
                }
            }
            ServerPacket::ItemStackResponse { responses } => {
                if responses.len() > MAX_STACK_REQUESTS {
                    return Err(ProtocolError::TooManyRequests {
                        count: responses.len(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Result of one item stack request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Every action applied.
    Ok,
    /// The request was rejected; the client should expect a resync.
    Error,
}

/// Final contents of one touched slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseSlotInfo {
    /// Slot index.
    pub slot: u8,
    /// Units left in the slot.
    pub amount: u32,
    /// Network id of the item left in the slot (0 when empty).
    pub network_id: i32,
}

/// Touched slots of one named container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseContainerInfo {
    /// Container name as used in the request.
    pub container: ContainerName,
    /// Touched slots.
    pub slots: Vec<ResponseSlotInfo>,
}

/// Response to one item stack request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStackResponse {
    /// Outcome.
    pub status: ResponseStatus,
    /// Echo of the client request id.
    pub client_request_id: i32,
    /// Final contents; empty for errors.
    pub containers: Vec<ResponseContainerInfo>,
}
