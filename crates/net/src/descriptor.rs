//! Wire representation of item stacks.

use serde::{Deserialize, Serialize};
use voxelhost_core::{ItemRegistry, ItemStack, ItemType, RegistryError};

/// Item stack as carried by sync packets and creative requests.
///
/// Only identity and quantity travel on the wire; custom properties and
/// traits stay on the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkItemStackDescriptor {
    /// Item network id, `0` for an empty slot.
    pub network_id: i32,
    /// Units.
    pub amount: u16,
    /// Metadata value.
    pub metadata: u16,
}

impl NetworkItemStackDescriptor {
    /// Create a descriptor.
    pub const fn new(network_id: i32, amount: u16, metadata: u16) -> Self {
        Self {
            network_id,
            amount,
            metadata,
        }
    }

    /// Descriptor of an empty slot.
    pub const fn air() -> Self {
        Self::new(ItemType::AIR_NETWORK_ID, 0, 0)
    }

    /// Whether the descriptor denotes an empty slot.
    pub fn is_air(&self) -> bool {
        self.network_id == ItemType::AIR_NETWORK_ID || self.amount == 0
    }

    /// Descriptor of a slot's contents.
    pub fn from_stack(stack: Option<&ItemStack>) -> Self {
        match stack {
            Some(stack) if !stack.is_empty() => Self::new(
                stack.item_type().network_id,
                u16::try_from(stack.amount()).unwrap_or(u16::MAX),
                stack.metadata(),
            ),
            _ => Self::air(),
        }
    }

    /// Materialize a fresh stack from the descriptor. Empty descriptors
    /// yield `None`.
    pub fn to_stack(&self, registry: &ItemRegistry) -> Result<Option<ItemStack>, RegistryError> {
        if self.is_air() {
            return Ok(None);
        }
        let item_type = registry.by_network_id(self.network_id)?.clone();
        Ok(Some(
            ItemStack::new(item_type, u32::from(self.amount)).with_metadata(self.metadata),
        ))
    }
}

impl From<&ItemStack> for NetworkItemStackDescriptor {
    fn from(stack: &ItemStack) -> Self {
        Self::from_stack(Some(stack))
    }
}
