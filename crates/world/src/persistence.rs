//! Anchor trait that mirrors a container into the anchor's dynamic
//! properties so it survives a reload.

use crate::anchor::{AnchorTrait, AttachContext, ContainerUpdate, ContainerUpdateHook};
use crate::container::Container;
use tracing::warn;
use voxelhost_core::{
    AttachedTrait, EntityContainerKind, ItemRegistry, ItemStack, ItemStorage, TraitFault,
};

/// Identifier of [`InventoryPersistence`].
pub const INVENTORY_PERSISTENCE: &str = "voxelhost:inventory";

/// Default property key the storage is written under.
pub const INVENTORY_PROPERTY: &str = "inventory";

/// Writes an [`ItemStorage`] on every container update and restores it when
/// attached.
///
/// `kind` selects which entity container to mirror; `None` mirrors a block's
/// container.
#[derive(Debug, Clone)]
pub struct InventoryPersistence {
    kind: Option<EntityContainerKind>,
    property: String,
}

impl InventoryPersistence {
    /// Mirror a block's container under `"inventory"`.
    pub fn block() -> Self {
        Self {
            kind: None,
            property: INVENTORY_PROPERTY.to_string(),
        }
    }

    /// Mirror one of an entity's containers under `property`.
    pub fn entity(kind: EntityContainerKind, property: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            property: property.into(),
        }
    }

    /// Property key.
    pub fn property(&self) -> &str {
        &self.property
    }
}

/// Snapshot a container as persisted entries.
pub fn snapshot(container: &Container) -> ItemStorage {
    ItemStorage {
        size: container.size(),
        items: container
            .storage()
            .iter()
            .enumerate()
            .filter_map(|(slot, stack)| stack.as_ref().map(|s| (slot, s.to_entry())))
            .collect(),
    }
}

/// Restore a snapshot into a container. Entries naming unknown items are
/// skipped with a warning.
pub fn restore(container: &mut Container, storage: &ItemStorage, registry: &ItemRegistry) {
    if storage.size != container.size() {
        container.resize(storage.size);
    }
    for (slot, entry) in &storage.items {
        match ItemStack::from_entry(entry, registry) {
            Ok(stack) => container.set_item(*slot, stack),
            Err(error) => warn!(
                slot,
                identifier = %entry.identifier,
                %error,
                "Skipping persisted stack"
            ),
        }
    }
}

impl AttachedTrait for InventoryPersistence {
    fn identifier(&self) -> &str {
        INVENTORY_PERSISTENCE
    }
}

impl ContainerUpdateHook for InventoryPersistence {
    fn on_container_update(&mut self, update: ContainerUpdate<'_>) -> Result<(), TraitFault> {
        if update.kind != self.kind {
            return Ok(());
        }
        let value = serde_json::to_value(snapshot(update.container))
            .map_err(|e| TraitFault::new(INVENTORY_PERSISTENCE, e.to_string()))?;
        update.properties.insert(self.property.clone(), value);
        Ok(())
    }
}

impl AnchorTrait for InventoryPersistence {
    fn on_attach(&mut self, mut context: AttachContext<'_>) -> Result<(), TraitFault> {
        let Some(value) = context.properties.get(&self.property).cloned() else {
            return Ok(());
        };
        let storage: ItemStorage = serde_json::from_value(value)
            .map_err(|e| TraitFault::new(INVENTORY_PERSISTENCE, e.to_string()))?;
        let registry = context.registry;
        let container = context.container_mut(self.kind).ok_or_else(|| {
            TraitFault::new(INVENTORY_PERSISTENCE, "anchor has no such container")
        })?;
        restore(container, &storage, registry);
        Ok(())
    }

    fn update_hook(&mut self) -> Option<&mut dyn ContainerUpdateHook> {
        Some(self)
    }
}
