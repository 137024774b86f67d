//! Fixed-size slotted item storage with multi-viewer synchronization.
//!
//! Every slot index handed to a [`Container`] primitive is wrapped modulo the
//! container size. Slots never hold an empty stack: a stack that reaches
//! zero units (or the air identity) collapses to `None` immediately.

use crate::allocator::ContainerIdAllocator;
use crate::viewer::Viewer;
use tracing::{debug, warn};
use voxelhost_core::{
    BlockPosition, ContainerHooks, ContainerId, ContainerRef, ContainerType, ItemStack, UniqueId,
};
use voxelhost_net::{NetworkItemStackDescriptor, ServerPacket};

/// A viewer currently observing a container, with the id it was assigned.
#[derive(Debug, Clone)]
pub struct Occupant {
    /// The observing player.
    pub viewer: Viewer,
    /// Container id as known to that player.
    pub identifier: ContainerId,
}

/// Presentation of a container when it is shown.
#[derive(Debug, Clone, Copy)]
pub struct ShowOptions {
    /// Anchor block position carried by the open packet.
    pub position: BlockPosition,
    /// Anchor unique id carried by the open packet (`-1` for blocks).
    pub unique_id: UniqueId,
    /// Kind shown to the viewer instead of the container's own kind.
    pub container_type: Option<ContainerType>,
    /// Id assigned to the viewer instead of the usual allocation.
    pub identifier: Option<ContainerId>,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            position: BlockPosition::default(),
            unique_id: UniqueId(-1),
            container_type: None,
            identifier: None,
        }
    }
}

/// Generic slotted container.
#[derive(Debug, Clone)]
pub struct Container {
    container_type: ContainerType,
    identifier: Option<ContainerId>,
    owner: Option<ContainerRef>,
    storage: Vec<Option<ItemStack>>,
    occupants: Vec<Occupant>,
    owner_viewer: Option<Viewer>,
    shared_offset: Option<u32>,
}

impl Container {
    /// Empty container of `size` slots. Without a fixed identifier every
    /// viewer gets its own id from the allocator.
    pub fn new(container_type: ContainerType, size: usize) -> Self {
        Self {
            container_type,
            identifier: None,
            owner: None,
            storage: vec![None; size],
            occupants: Vec::new(),
            owner_viewer: None,
            shared_offset: None,
        }
    }

    /// Fixed id override.
    pub fn with_identifier(mut self, identifier: ContainerId) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Sync this container as a window of another container sharing its id.
    ///
    /// Slot packets carry `offset + slot`, and bulk updates are sent slot by
    /// slot so the rest of the shared container is left untouched.
    pub fn with_shared_offset(mut self, offset: u32) -> Self {
        self.shared_offset = Some(offset);
        self
    }

    /// First wire slot when the id is shared.
    pub fn shared_offset(&self) -> Option<u32> {
        self.shared_offset
    }

    fn wire_slot(&self, slot: usize) -> u32 {
        self.shared_offset.unwrap_or(0) + slot as u32
    }

    /// Address stamped onto every stack placed in this container.
    pub fn with_owner(mut self, owner: ContainerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Container kind.
    pub fn container_type(&self) -> ContainerType {
        self.container_type
    }

    /// Fixed id, if any.
    pub fn identifier(&self) -> Option<ContainerId> {
        self.identifier
    }

    /// Address of this container.
    pub fn owner(&self) -> Option<ContainerRef> {
        self.owner
    }

    /// Player that always receives sync for this container (its owner),
    /// whether or not it is an occupant.
    pub fn set_owner_viewer(&mut self, viewer: Option<Viewer>) {
        self.owner_viewer = viewer;
    }

    /// Slot count.
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// All slots in order.
    pub fn storage(&self) -> &[Option<ItemStack>] {
        &self.storage
    }

    /// Number of absent slots.
    pub fn empty_slots_count(&self) -> usize {
        self.storage.iter().filter(|slot| slot.is_none()).count()
    }

    /// Whether every slot holds a stack.
    pub fn is_full(&self) -> bool {
        self.empty_slots_count() == 0
    }

    /// Total units across all slots.
    pub fn total_amount(&self) -> u64 {
        self.storage
            .iter()
            .flatten()
            .map(|stack| u64::from(stack.amount()))
            .sum()
    }

    fn wrap(&self, slot: usize) -> Option<usize> {
        match self.storage.len() {
            0 => None,
            size => Some(slot % size),
        }
    }

    /// Stack in a slot.
    pub fn get_item(&self, slot: usize) -> Option<&ItemStack> {
        let slot = self.wrap(slot)?;
        self.storage[slot].as_ref()
    }

    /// Stack in a slot, mutably. Call [`Container::sync_slot`] after changing
    /// it so empty stacks collapse and viewers see the change.
    pub fn get_item_mut(&mut self, slot: usize) -> Option<&mut ItemStack> {
        let slot = self.wrap(slot)?;
        self.storage[slot].as_mut()
    }

    /// Install a stack. An empty stack clears the slot instead.
    pub fn set_item(&mut self, slot: usize, mut item: ItemStack) {
        let Some(slot) = self.wrap(slot) else {
            return;
        };
        if item.is_empty() {
            self.clear_slot(slot);
            return;
        }
        item.set_container(self.owner);
        self.storage[slot] = Some(item);
        self.sync_slot(slot);
    }

    /// Collapse an emptied slot and send its contents to every viewer.
    pub fn sync_slot(&mut self, slot: usize) {
        let Some(slot) = self.wrap(slot) else {
            return;
        };
        if self.storage[slot].as_ref().is_some_and(ItemStack::is_empty) {
            self.storage[slot] = None;
        }
        if !self.has_audience() {
            return;
        }
        let item = NetworkItemStackDescriptor::from_stack(self.storage[slot].as_ref());
        let slot = self.wire_slot(slot);
        self.broadcast(|container_id| ServerPacket::InventorySlot {
            container_id,
            slot,
            item,
        });
    }

    /// Two-phase stacking: merge into the first compatible non-full stack,
    /// otherwise fill the first empty slot, splitting oversized input into
    /// full stacks.
    ///
    /// Units placed are removed from `item`. Returns `true` when every unit
    /// was placed; on `false`, `item` holds the remainder.
    pub fn add_item(&mut self, item: &mut ItemStack) -> bool {
        loop {
            if item.is_empty() {
                return true;
            }
            let max = item.max_stack_size();

            if item.is_stackable() {
                let target = self.storage.iter().position(|slot| {
                    slot.as_ref()
                        .is_some_and(|existing| !existing.is_full() && existing.equals(item))
                });
                if let Some(index) = target {
                    if let Some(existing) = self.storage[index].as_mut() {
                        let moved = existing.remaining_capacity().min(item.amount());
                        existing.increment(moved);
                        item.decrement(moved);
                    }
                    self.sync_slot(index);
                    continue;
                }
            }

            let Some(empty) = self.storage.iter().position(Option::is_none) else {
                return false;
            };
            if item.amount() > max {
                let full = item.split_copy(max);
                item.decrement(max);
                self.set_item(empty, full);
                continue;
            }
            let placed = item.split_copy(item.amount());
            item.set_amount(0);
            self.set_item(empty, placed);
            return true;
        }
    }

    /// Decrement a slot in place by `min(amount, quantity)`.
    ///
    /// Returns the decremented stack: moved out if it collapsed, otherwise a
    /// copy of what remains in the slot.
    pub fn remove_item(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        let slot = self.wrap(slot)?;
        let stack = self.storage[slot].as_mut()?;
        let removed = amount.min(stack.amount());
        stack.decrement(removed);
        let result = if stack.is_empty() {
            self.storage[slot].take()
        } else {
            Some(stack.clone())
        };
        self.sync_slot(slot);
        result
    }

    /// Split `amount` units off a slot into a new independent stack carrying
    /// copies of the original's properties, tags and traits.
    pub fn take_item(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        let slot = self.wrap(slot)?;
        let stack = self.storage[slot].as_mut()?;
        let removed = amount.min(stack.amount());
        if removed == 0 {
            return None;
        }
        let taken = stack.split_copy(removed);
        stack.decrement(removed);
        self.sync_slot(slot);
        Some(taken)
    }

    /// Move the whole stack out of a slot, leaving it absent.
    pub fn take_stack(&mut self, slot: usize) -> Option<ItemStack> {
        let slot = self.wrap(slot)?;
        let mut stack = self.storage[slot].take()?;
        stack.set_container(None);
        self.clear_slot(slot);
        Some(stack)
    }

    /// Exchange two slots, possibly across containers. Both slots are cleared
    /// before either stack is reinstalled.
    pub fn swap_items(&mut self, slot: usize, other_slot: usize, other: Option<&mut Container>) {
        match other {
            None => {
                let first = self.take_stack(slot);
                let second = self.take_stack(other_slot);
                if let Some(first) = first {
                    self.set_item(other_slot, first);
                }
                if let Some(second) = second {
                    self.set_item(slot, second);
                }
            }
            Some(other) => {
                let first = self.take_stack(slot);
                let second = other.take_stack(other_slot);
                if let Some(first) = first {
                    other.set_item(other_slot, first);
                }
                if let Some(second) = second {
                    self.set_item(slot, second);
                }
            }
        }
    }

    /// Make a slot absent.
    pub fn clear_slot(&mut self, slot: usize) {
        let Some(slot) = self.wrap(slot) else {
            return;
        };
        self.storage[slot] = None;
        if !self.has_audience() {
            return;
        }
        self.broadcast(|container_id| ServerPacket::InventorySlot {
            container_id,
            slot: slot as u32,
            item: NetworkItemStackDescriptor::air(),
        });
    }

    /// Make every slot absent.
    pub fn clear(&mut self) {
        for slot in 0..self.size() {
            self.clear_slot(slot);
        }
    }

    /// Change the slot count, keeping entries up to `min(old, new)`.
    pub fn resize(&mut self, size: usize) {
        self.storage.resize_with(size, || None);
        self.update(None);
    }

    /// Send a bulk snapshot to one viewer, or to every viewer.
    pub fn update(&self, viewer: Option<&Viewer>) {
        let items: Vec<_> = self
            .storage
            .iter()
            .map(|slot| NetworkItemStackDescriptor::from_stack(slot.as_ref()))
            .collect();
        let packets = |container_id: ContainerId| -> Vec<ServerPacket> {
            match self.shared_offset {
                Some(_) => items
                    .iter()
                    .enumerate()
                    .map(|(slot, item)| ServerPacket::InventorySlot {
                        container_id,
                        slot: self.wire_slot(slot),
                        item: *item,
                    })
                    .collect(),
                None => vec![ServerPacket::InventoryContent {
                    container_id,
                    items: items.clone(),
                }],
            }
        };
        match viewer {
            Some(viewer) => {
                let container_id = self
                    .occupant_id(viewer.id())
                    .or(self.identifier)
                    .unwrap_or(ContainerId::NONE);
                for packet in packets(container_id) {
                    viewer.send(packet);
                }
            }
            None => self.broadcast_all(packets),
        }
    }

    /// Number of occupants.
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Current occupants.
    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    /// Whether the viewer is an occupant.
    pub fn is_occupant(&self, viewer: UniqueId) -> bool {
        self.occupant_id(viewer).is_some()
    }

    /// Id assigned to an occupant.
    pub fn occupant_id(&self, viewer: UniqueId) -> Option<ContainerId> {
        self.occupants
            .iter()
            .find(|o| o.viewer.id() == viewer)
            .map(|o| o.identifier)
    }

    /// Register a viewer, send it the open packet and a snapshot, and run the
    /// "container opened" hook of every stored stack. Showing to an existing
    /// occupant reuses its id.
    pub fn show(
        &mut self,
        viewer: &Viewer,
        allocator: &mut ContainerIdAllocator,
        options: ShowOptions,
    ) -> ContainerId {
        let identifier = match self.occupant_id(viewer.id()) {
            Some(existing) => existing,
            None => {
                let identifier = options
                    .identifier
                    .or(self.identifier)
                    .unwrap_or_else(|| allocator.allocate());
                self.occupants.push(Occupant {
                    viewer: viewer.clone(),
                    identifier,
                });
                identifier
            }
        };

        viewer.send(ServerPacket::ContainerOpen {
            container_id: identifier,
            container_type: options.container_type.unwrap_or(self.container_type),
            position: options.position,
            unique_id: options.unique_id,
        });
        self.update(Some(viewer));

        let id = viewer.id();
        self.dispatch_item_hooks(|hooks| hooks.on_container_open(id));
        debug!(viewer = %id, container = %identifier, "Container shown");
        identifier
    }

    /// Remove an occupant, notify it and run the "container closed" hook of
    /// every stored stack.
    ///
    /// # Panics
    ///
    /// Panics if `viewer` is not an occupant. Callers acting on client input
    /// must check [`Container::is_occupant`] first.
    pub fn close(&mut self, viewer: UniqueId, server_initiated: bool) {
        let Some(index) = self.occupants.iter().position(|o| o.viewer.id() == viewer) else {
            panic!("viewer {viewer} is not an occupant of this container");
        };
        let occupant = self.occupants.remove(index);
        occupant.viewer.send(ServerPacket::ContainerClose {
            container_id: occupant.identifier,
            container_type: self.container_type,
            server_initiated,
        });
        self.dispatch_item_hooks(|hooks| hooks.on_container_close(viewer));
        debug!(%viewer, container = %occupant.identifier, server_initiated, "Container closed");
    }

    /// Close every occupant. Returns the closed viewers.
    pub fn close_all(&mut self, server_initiated: bool) -> Vec<UniqueId> {
        let viewers: Vec<_> = self.occupants.iter().map(|o| o.viewer.id()).collect();
        for viewer in &viewers {
            self.close(*viewer, server_initiated);
        }
        viewers
    }

    fn has_audience(&self) -> bool {
        !self.occupants.is_empty() || self.owner_viewer.is_some()
    }

    fn broadcast(&self, packet: impl Fn(ContainerId) -> ServerPacket) {
        self.broadcast_all(|container_id| vec![packet(container_id)]);
    }

    fn broadcast_all(&self, packets: impl Fn(ContainerId) -> Vec<ServerPacket>) {
        let send = |viewer: &Viewer, container_id| {
            for packet in packets(container_id) {
                viewer.send(packet);
            }
        };
        for occupant in &self.occupants {
            send(&occupant.viewer, occupant.identifier);
        }
        if let Some(owner) = &self.owner_viewer {
            if !self.is_occupant(owner.id()) {
                send(owner, self.identifier.unwrap_or(ContainerId::NONE));
            }
        }
    }

    fn dispatch_item_hooks(
        &mut self,
        mut call: impl FnMut(&mut dyn ContainerHooks) -> Result<(), voxelhost_core::TraitFault>,
    ) {
        for stack in self.storage.iter_mut().flatten() {
            let item = stack.identifier().to_string();
            stack.traits_mut().dispatch(
                |t| match t.container_hooks() {
                    Some(hooks) => call(hooks),
                    None => Ok(()),
                },
                |t, fault| {
                    warn!(%item, trait_id = t.identifier(), %fault, "Item trait hook failed; detaching trait")
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc::Receiver;
    use voxelhost_core::{AttachedTrait, ItemRegistry, ItemTrait, ItemType, TraitFault};

    type HookLog = Rc<RefCell<Vec<(&'static str, UniqueId)>>>;

    #[derive(Clone)]
    struct Witness {
        log: HookLog,
        fail_on_close: bool,
    }

    impl AttachedTrait for Witness {
        fn identifier(&self) -> &str {
            "test:witness"
        }
    }

    impl ContainerHooks for Witness {
        fn on_container_open(&mut self, viewer: UniqueId) -> Result<(), TraitFault> {
            self.log.borrow_mut().push(("open", viewer));
            Ok(())
        }

        fn on_container_close(&mut self, viewer: UniqueId) -> Result<(), TraitFault> {
            self.log.borrow_mut().push(("close", viewer));
            if self.fail_on_close {
                return Err(TraitFault::new("test:witness", "close refused"));
            }
            Ok(())
        }
    }

    impl ItemTrait for Witness {
        fn clone_trait(&self) -> Box<dyn ItemTrait> {
            Box::new(self.clone())
        }

        fn container_hooks(&mut self) -> Option<&mut dyn ContainerHooks> {
            Some(self)
        }
    }

    fn witnessed(log: &HookLog, fail_on_close: bool) -> ItemStack {
        let mut compass = stack("diamond_pickaxe", 1);
        compass.add_trait(Box::new(Witness {
            log: log.clone(),
            fail_on_close,
        }));
        compass
    }

    fn item_type(identifier: &str) -> ItemType {
        ItemRegistry::vanilla().get(identifier).unwrap().clone()
    }

    fn stack(identifier: &str, amount: u32) -> ItemStack {
        ItemStack::new(item_type(identifier), amount)
    }

    fn viewer(id: i64) -> (Viewer, Receiver<ServerPacket>) {
        Viewer::channel(UniqueId(id), 64)
    }

    fn amounts(container: &Container) -> Vec<u32> {
        container
            .storage()
            .iter()
            .map(|slot| slot.as_ref().map_or(0, ItemStack::amount))
            .collect()
    }

    #[test]
    fn add_item_splits_oversized_stack() {
        let mut inventory = Container::new(ContainerType::Inventory, 36);
        let mut dirt = stack("dirt", 80);
        assert!(inventory.add_item(&mut dirt));
        assert_eq!(dirt.amount(), 0);
        assert_eq!(inventory.get_item(0).map(ItemStack::amount), Some(64));
        assert_eq!(inventory.get_item(1).map(ItemStack::amount), Some(16));
        assert!(inventory.get_item(2).is_none());
    }

    #[test]
    fn add_item_merges_before_using_empty_slots() {
        let mut chest = Container::new(ContainerType::Container, 3);
        chest.set_item(1, stack("dirt", 60));
        let mut dirt = stack("dirt", 10);
        assert!(chest.add_item(&mut dirt));
        assert_eq!(amounts(&chest), vec![6, 64, 0]);
    }

    #[test]
    fn full_incoming_stack_tops_off_a_partial_stack() {
        let mut chest = Container::new(ContainerType::Container, 2);
        chest.set_item(0, stack("dirt", 60));
        chest.set_item(1, stack("stone", 64));

        let mut dirt = stack("dirt", 64);
        assert!(!chest.add_item(&mut dirt));
        assert_eq!(amounts(&chest), vec![64, 64]);
        assert_eq!(dirt.amount(), 60);
    }

    #[test]
    fn full_incoming_stack_merges_before_filling_empty_slots() {
        let mut chest = Container::new(ContainerType::Container, 3);
        chest.set_item(0, stack("dirt", 60));

        let mut dirt = stack("dirt", 64);
        assert!(chest.add_item(&mut dirt));
        assert_eq!(amounts(&chest), vec![64, 60, 0]);
    }

    #[test]
    fn add_item_skips_incompatible_stacks() {
        let mut chest = Container::new(ContainerType::Container, 2);
        let mut named = stack("dirt", 1);
        named.set_property("name", serde_json::json!("special"));
        chest.set_item(0, named);

        let mut dirt = stack("dirt", 5);
        assert!(chest.add_item(&mut dirt));
        assert_eq!(amounts(&chest), vec![1, 5]);
    }

    #[test]
    fn add_item_reports_remainder_when_full() {
        let mut hand = Container::new(ContainerType::Hand, 1);
        let mut pearls = stack("ender_pearl", 20);
        assert!(!hand.add_item(&mut pearls));
        assert_eq!(hand.get_item(0).map(ItemStack::amount), Some(16));
        assert_eq!(pearls.amount(), 4);
    }

    #[test]
    fn unstackable_items_never_merge() {
        let mut chest = Container::new(ContainerType::Container, 3);
        let mut swords = stack("diamond_sword", 2);
        assert!(chest.add_item(&mut swords));
        assert_eq!(amounts(&chest), vec![1, 1, 0]);
    }

    #[test]
    fn slots_wrap_modulo_size() {
        let mut armor = Container::new(ContainerType::Armor, 4);
        armor.set_item(5, stack("iron_helmet", 1));
        assert!(armor.get_item(1).is_some());
        assert!(armor.get_item(9).is_some());
    }

    #[test]
    fn empty_stacks_collapse() {
        let mut chest = Container::new(ContainerType::Container, 2);
        chest.set_item(0, stack("dirt", 0));
        assert!(chest.get_item(0).is_none());
        chest.set_item(0, stack("air", 1));
        assert!(chest.get_item(0).is_none());

        chest.set_item(1, stack("dirt", 3));
        let removed = chest.remove_item(1, 10).unwrap();
        assert_eq!(removed.amount(), 0);
        assert!(chest.get_item(1).is_none());
    }

    #[test]
    fn get_item_mut_then_sync_collapses() {
        let mut chest = Container::new(ContainerType::Container, 1);
        chest.set_item(0, stack("dirt", 3));
        if let Some(dirt) = chest.get_item_mut(0) {
            dirt.decrement(3);
        }
        chest.sync_slot(0);
        assert!(chest.get_item(0).is_none());
    }

    #[test]
    fn take_item_returns_independent_stack() {
        let mut chest = Container::new(ContainerType::Container, 1);
        let mut dirt = stack("dirt", 10);
        dirt.set_tag("display", serde_json::json!("Dirt+"));
        chest.set_item(0, dirt);

        let mut taken = chest.take_item(0, 4).unwrap();
        taken.set_tag("display", serde_json::json!("changed"));

        assert_eq!(taken.amount(), 4);
        let left = chest.get_item(0).unwrap();
        assert_eq!(left.amount(), 6);
        assert_eq!(left.tag("display"), Some(&serde_json::json!("Dirt+")));
    }

    #[test]
    fn set_item_stamps_owner() {
        let owner = ContainerRef::Entity {
            owner: UniqueId(7),
            kind: voxelhost_core::EntityContainerKind::Cursor,
        };
        let mut cursor = Container::new(ContainerType::Hand, 1).with_owner(owner);
        cursor.set_item(0, stack("stone", 1));
        assert_eq!(cursor.get_item(0).and_then(ItemStack::container), Some(owner));
    }

    #[test]
    fn swap_across_containers() {
        let mut a = Container::new(ContainerType::Container, 2);
        let mut b = Container::new(ContainerType::Container, 2);
        a.set_item(0, stack("dirt", 1));
        b.set_item(1, stack("stone", 2));

        a.swap_items(0, 1, Some(&mut b));
        assert_eq!(a.get_item(0).map(ItemStack::amount), Some(2));
        assert_eq!(b.get_item(1).map(ItemStack::amount), Some(1));
        assert!(b.get_item(0).is_none());
    }

    #[test]
    fn resize_keeps_prefix() {
        let mut chest = Container::new(ContainerType::Container, 3);
        chest.set_item(0, stack("dirt", 1));
        chest.set_item(2, stack("dirt", 2));
        chest.resize(2);
        assert_eq!(amounts(&chest), vec![1, 0]);
        chest.resize(4);
        assert_eq!(chest.size(), 4);
        assert_eq!(chest.empty_slots_count(), 3);
    }

    #[test]
    fn clear_without_viewers_sends_nothing() {
        let (watcher, rx) = viewer(1);
        let mut chest = Container::new(ContainerType::Container, 2);
        chest.set_item(0, stack("dirt", 1));
        chest.clear();
        assert!(chest.get_item(0).is_none());
        drop(watcher);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn show_sends_open_then_snapshot_and_syncs_slots() {
        let (watcher, rx) = viewer(1);
        let mut allocator = ContainerIdAllocator::new();
        let mut chest = Container::new(ContainerType::Container, 2);
        chest.set_item(0, stack("dirt", 1));

        let id = chest.show(&watcher, &mut allocator, ShowOptions::default());
        assert_eq!(id, ContainerId::FIRST);
        assert!(chest.is_occupant(UniqueId(1)));

        chest.set_item(1, stack("stone", 3));
        let packets: Vec<_> = rx.try_iter().collect();
        assert!(matches!(packets[0], ServerPacket::ContainerOpen { container_id, .. } if container_id == id));
        assert!(matches!(&packets[1], ServerPacket::InventoryContent { items, .. } if items.len() == 2));
        assert!(matches!(packets[2], ServerPacket::InventorySlot { slot: 1, .. }));
    }

    #[test]
    fn occupants_get_independent_ids() {
        let (first, _rx1) = viewer(1);
        let (second, _rx2) = viewer(2);
        let mut allocator = ContainerIdAllocator::new();
        let mut chest = Container::new(ContainerType::Container, 1);

        let a = chest.show(&first, &mut allocator, ShowOptions::default());
        let b = chest.show(&second, &mut allocator, ShowOptions::default());
        assert_ne!(a, b);
        assert_eq!(chest.show(&first, &mut allocator, ShowOptions::default()), a);
        assert_eq!(chest.occupant_count(), 2);
    }

    #[test]
    fn close_sends_close_packet() {
        let (watcher, rx) = viewer(3);
        let mut allocator = ContainerIdAllocator::new();
        let mut chest = Container::new(ContainerType::Container, 1);
        chest.show(&watcher, &mut allocator, ShowOptions::default());
        chest.close(UniqueId(3), true);

        assert!(!chest.is_occupant(UniqueId(3)));
        let last = rx.try_iter().last();
        assert!(matches!(
            last,
            Some(ServerPacket::ContainerClose { server_initiated: true, .. })
        ));
    }

    #[test]
    fn stored_item_traits_see_open_and_close() {
        let log = HookLog::default();
        let (watcher, _rx) = viewer(4);
        let mut allocator = ContainerIdAllocator::new();
        let mut chest = Container::new(ContainerType::Container, 2);
        chest.set_item(1, witnessed(&log, false));

        chest.show(&watcher, &mut allocator, ShowOptions::default());
        chest.close(UniqueId(4), false);

        assert_eq!(*log.borrow(), vec![("open", UniqueId(4)), ("close", UniqueId(4))]);
        assert!(chest.get_item(1).is_some_and(|s| s.has_trait("test:witness")));
    }

    #[test]
    fn failing_item_hook_is_detached_and_skipped_afterwards() {
        let log = HookLog::default();
        let (watcher, _rx) = viewer(4);
        let mut allocator = ContainerIdAllocator::new();
        let mut chest = Container::new(ContainerType::Container, 2);
        chest.set_item(0, witnessed(&log, true));
        chest.set_item(1, stack("dirt", 5));

        chest.show(&watcher, &mut allocator, ShowOptions::default());
        chest.close(UniqueId(4), false);
        assert!(chest.get_item(0).is_some_and(|s| !s.has_trait("test:witness")));

        chest.show(&watcher, &mut allocator, ShowOptions::default());
        chest.close(UniqueId(4), false);
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(chest.get_item(1).map(ItemStack::amount), Some(5));
    }

    #[test]
    #[should_panic(expected = "not an occupant")]
    fn closing_twice_is_a_contract_violation() {
        let (watcher, _rx) = viewer(3);
        let mut allocator = ContainerIdAllocator::new();
        let mut chest = Container::new(ContainerType::Container, 1);
        chest.show(&watcher, &mut allocator, ShowOptions::default());
        chest.close(UniqueId(3), false);
        chest.close(UniqueId(3), false);
    }

    #[test]
    fn owner_viewer_receives_sync_without_occupying() {
        let (owner, rx) = viewer(9);
        let mut armor = Container::new(ContainerType::Armor, 4).with_identifier(ContainerId::ARMOR);
        armor.set_owner_viewer(Some(owner));
        armor.set_item(0, stack("iron_helmet", 1));

        assert_eq!(armor.occupant_count(), 0);
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerPacket::InventorySlot { container_id: ContainerId::ARMOR, slot: 0, .. })
        ));
    }
}
