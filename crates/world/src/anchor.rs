//! Blocks and entities that own containers, and the anchored view that binds
//! container operations to their owner.
//!
//! [`AnchoredContainer`] wraps a borrowed [`Container`] together with the
//! borrowed state of its anchor. Every mutating call delegates to the
//! container and then runs the anchor's `on_container_update` hooks. A hook
//! that fails is logged with the anchor's identity and detached.

use crate::allocator::ContainerIdAllocator;
use crate::container::{Container, ShowOptions};
use crate::viewer::Viewer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::error;
use voxelhost_core::{
    AttachedTrait, BlockPosition, ContainerHooks, ContainerId, ContainerRef, ContainerType,
    DimensionId, EntityContainerKind, ItemRegistry, ItemStack, RegistryKey, TraitFault, TraitSet,
    UniqueId,
};

/// Dynamic properties of an anchor.
pub type Properties = BTreeMap<String, Value>;

/// Where an anchor lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorLocation {
    /// A block at a fixed position.
    Block(BlockPosition),
    /// An entity.
    Entity {
        /// Entity unique id.
        unique_id: UniqueId,
        /// Current position.
        position: [f32; 3],
    },
}

/// Identity of an anchor, used for logging and open packets.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorInfo {
    /// Block or entity type.
    pub identifier: RegistryKey,
    /// Dimension the anchor lives in.
    pub dimension: DimensionId,
    /// Position or entity identity.
    pub location: AnchorLocation,
}

impl fmt::Display for AnchorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            AnchorLocation::Block(position) => write!(
                f,
                "block \"{}\" at {} in dimension \"{}\"",
                self.identifier, position, self.dimension
            ),
            AnchorLocation::Entity { unique_id, .. } => write!(
                f,
                "entity \"{}:{}\" in dimension \"{}\"",
                self.identifier, unique_id, self.dimension
            ),
        }
    }
}

/// Container update notification handed to anchor traits.
pub struct ContainerUpdate<'a> {
    /// The updated container.
    pub container: &'a Container,
    /// Which entity container changed; `None` for block containers.
    pub kind: Option<EntityContainerKind>,
    /// Anchor's dynamic properties.
    pub properties: &'a mut Properties,
}

/// Capability for reacting to container changes.
pub trait ContainerUpdateHook {
    /// Called after every mutation of one of the anchor's containers.
    fn on_container_update(&mut self, update: ContainerUpdate<'_>) -> Result<(), TraitFault>;
}

/// Context handed to a trait when it is attached to an anchor.
pub struct AttachContext<'a> {
    /// Anchor's dynamic properties.
    pub properties: &'a mut Properties,
    /// Item palette for restoring persisted stacks.
    pub registry: &'a ItemRegistry,
    containers: Vec<(Option<EntityContainerKind>, &'a mut Container)>,
}

impl AttachContext<'_> {
    /// Container of the anchor: `None` selects a block's container.
    pub fn container_mut(&mut self, kind: Option<EntityContainerKind>) -> Option<&mut Container> {
        self.containers
            .iter_mut()
            .find(|(k, _)| *k == kind)
            .map(|(_, container)| &mut **container)
    }
}

/// Behaviour attached to a block or entity.
pub trait AnchorTrait: AttachedTrait {
    /// Called once when the trait is attached.
    fn on_attach(&mut self, _context: AttachContext<'_>) -> Result<(), TraitFault> {
        Ok(())
    }

    /// Container update capability, if the trait has one.
    fn update_hook(&mut self) -> Option<&mut dyn ContainerUpdateHook> {
        None
    }

    /// Container open/close capability, if the trait has one.
    fn container_hooks(&mut self) -> Option<&mut dyn ContainerHooks> {
        None
    }
}

/// Player game mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Survival.
    #[default]
    Survival,
    /// Creative; unlocks the creative palette.
    Creative,
    /// Adventure.
    Adventure,
    /// Spectator.
    Spectator,
}

/// Entity head and body rotation, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotation {
    /// Body yaw.
    pub yaw: f32,
    /// Head yaw.
    pub head_yaw: f32,
    /// Pitch.
    pub pitch: f32,
}

/// Player-only state of an entity.
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Outbound packet sink.
    pub viewer: Viewer,
    /// Selected hotbar slot (0-8).
    pub selected_slot: usize,
    /// Game mode.
    pub game_mode: GameMode,
    /// Container the player currently has open.
    pub opened_container: Option<ContainerRef>,
}

/// A block anchor.
pub struct Block {
    info: AnchorInfo,
    traits: TraitSet<dyn AnchorTrait>,
    properties: Properties,
    container: Option<Container>,
    opened: bool,
}

impl Block {
    /// New block without a container.
    pub fn new(identifier: RegistryKey, dimension: DimensionId, position: BlockPosition) -> Self {
        Self {
            info: AnchorInfo {
                identifier,
                dimension,
                location: AnchorLocation::Block(position),
            },
            traits: TraitSet::new(),
            properties: Properties::new(),
            container: None,
            opened: false,
        }
    }

    /// Give the block a container of `size` slots.
    pub fn with_container(mut self, container_type: ContainerType, size: usize) -> Self {
        let owner = self.container_ref();
        self.container = Some(Container::new(container_type, size).with_owner(owner));
        self
    }

    /// Anchor identity.
    pub fn info(&self) -> &AnchorInfo {
        &self.info
    }

    /// Block position.
    pub fn position(&self) -> BlockPosition {
        match self.info.location {
            AnchorLocation::Block(position) => position,
            AnchorLocation::Entity { .. } => BlockPosition::default(),
        }
    }

    /// Dimension.
    pub fn dimension(&self) -> DimensionId {
        self.info.dimension
    }

    /// Address of the block's container.
    pub fn container_ref(&self) -> ContainerRef {
        ContainerRef::Block {
            dimension: self.info.dimension,
            position: self.position(),
        }
    }

    /// The block's container.
    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Anchored view of the block's container.
    pub fn container_view(&mut self) -> Option<AnchoredContainer<'_>> {
        let container = self.container.as_mut()?;
        Some(AnchoredContainer {
            container,
            kind: None,
            info: &self.info,
            traits: &mut self.traits,
            properties: &mut self.properties,
        })
    }

    /// Move the container out (block teardown).
    pub fn take_container(&mut self) -> Option<Container> {
        self.container.take()
    }

    /// Dynamic properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Dynamic properties, mutably.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Attached traits.
    pub fn traits(&self) -> &TraitSet<dyn AnchorTrait> {
        &self.traits
    }

    /// Attach a trait; it is not attached if its `on_attach` fails.
    pub fn attach_trait(
        &mut self,
        mut value: Box<dyn AnchorTrait>,
        registry: &ItemRegistry,
    ) -> Result<(), TraitFault> {
        let containers = self
            .container
            .as_mut()
            .map(|c| (None, c))
            .into_iter()
            .collect();
        value.on_attach(AttachContext {
            properties: &mut self.properties,
            registry,
            containers,
        })?;
        self.traits.insert(value);
        Ok(())
    }

    /// Whether the block last broadcast itself as open.
    pub(crate) fn opened(&self) -> bool {
        self.opened
    }

    pub(crate) fn set_opened(&mut self, opened: bool) {
        self.opened = opened;
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("info", &self.info)
            .field("traits", &self.traits)
            .field("container", &self.container)
            .finish()
    }
}

/// An entity anchor; players carry a [`PlayerState`].
pub struct Entity {
    info: AnchorInfo,
    runtime_id: u64,
    /// Rotation.
    pub rotation: Rotation,
    traits: TraitSet<dyn AnchorTrait>,
    properties: Properties,
    containers: BTreeMap<EntityContainerKind, Container>,
    player: Option<PlayerState>,
}

const PLAYER_CONTAINERS: [EntityContainerKind; 7] = [
    EntityContainerKind::Inventory,
    EntityContainerKind::Armor,
    EntityContainerKind::Offhand,
    EntityContainerKind::Cursor,
    EntityContainerKind::CraftingInput,
    EntityContainerKind::CraftingOutput,
    EntityContainerKind::CreativeOutput,
];

impl Entity {
    /// New entity without containers.
    pub fn new(
        identifier: RegistryKey,
        unique_id: UniqueId,
        dimension: DimensionId,
        position: [f32; 3],
    ) -> Self {
        Self {
            info: AnchorInfo {
                identifier,
                dimension,
                location: AnchorLocation::Entity {
                    unique_id,
                    position,
                },
            },
            runtime_id: unique_id.0 as u64,
            rotation: Rotation::default(),
            traits: TraitSet::new(),
            properties: Properties::new(),
            containers: BTreeMap::new(),
            player: None,
        }
    }

    /// New player entity with the full set of player containers, each synced
    /// to the player itself.
    pub fn player(
        identifier: RegistryKey,
        viewer: Viewer,
        dimension: DimensionId,
        position: [f32; 3],
        game_mode: GameMode,
    ) -> Self {
        let mut entity = Self::new(identifier, viewer.id(), dimension, position);
        for kind in PLAYER_CONTAINERS {
            let (size, container_type, identifier) = kind.layout();
            let mut container = Container::new(container_type, size)
                .with_identifier(identifier)
                .with_owner(ContainerRef::Entity {
                    owner: viewer.id(),
                    kind,
                });
            if let Some(offset) = kind.ui_slot_offset() {
                container = container.with_shared_offset(offset);
            }
            container.set_owner_viewer(Some(viewer.clone()));
            entity.containers.insert(kind, container);
        }
        entity.player = Some(PlayerState {
            viewer,
            selected_slot: 0,
            game_mode,
            opened_container: None,
        });
        entity
    }

    /// Add (or replace) one of the entity's containers. Ids are allocated
    /// per viewer.
    pub fn with_container(
        mut self,
        kind: EntityContainerKind,
        container_type: ContainerType,
        size: usize,
    ) -> Self {
        let owner = ContainerRef::Entity {
            owner: self.unique_id(),
            kind,
        };
        self.containers
            .insert(kind, Container::new(container_type, size).with_owner(owner));
        self
    }

    /// Change the size of the player's main inventory.
    pub fn with_inventory_size(mut self, size: usize) -> Self {
        if let Some(inventory) = self.containers.get_mut(&EntityContainerKind::Inventory) {
            inventory.resize(size);
        }
        self
    }

    /// Anchor identity.
    pub fn info(&self) -> &AnchorInfo {
        &self.info
    }

    /// Unique id.
    pub fn unique_id(&self) -> UniqueId {
        match self.info.location {
            AnchorLocation::Entity { unique_id, .. } => unique_id,
            AnchorLocation::Block(_) => UniqueId(-1),
        }
    }

    /// Runtime id.
    pub fn runtime_id(&self) -> u64 {
        self.runtime_id
    }

    /// Dimension.
    pub fn dimension(&self) -> DimensionId {
        self.info.dimension
    }

    /// Current position.
    pub fn position(&self) -> [f32; 3] {
        match self.info.location {
            AnchorLocation::Entity { position, .. } => position,
            AnchorLocation::Block(position) => position.center(),
        }
    }

    /// Move the entity.
    pub fn set_position(&mut self, position: [f32; 3]) {
        if let AnchorLocation::Entity { position: current, .. } = &mut self.info.location {
            *current = position;
        }
    }

    /// Player state, if this entity is a player.
    pub fn player_state(&self) -> Option<&PlayerState> {
        self.player.as_ref()
    }

    /// Player state, mutably.
    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        self.player.as_mut()
    }

    /// Whether this entity is a player.
    pub fn is_player(&self) -> bool {
        self.player.is_some()
    }

    /// One of the entity's containers.
    pub fn container(&self, kind: EntityContainerKind) -> Option<&Container> {
        self.containers.get(&kind)
    }

    /// Every container the entity carries.
    pub fn containers(&self) -> impl Iterator<Item = (EntityContainerKind, &Container)> {
        self.containers.iter().map(|(kind, c)| (*kind, c))
    }

    /// Anchored view of one of the entity's containers.
    pub fn container_view(&mut self, kind: EntityContainerKind) -> Option<AnchoredContainer<'_>> {
        let container = self.containers.get_mut(&kind)?;
        Some(AnchoredContainer {
            container,
            kind: Some(kind),
            info: &self.info,
            traits: &mut self.traits,
            properties: &mut self.properties,
        })
    }

    /// Dynamic properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Attached traits.
    pub fn traits(&self) -> &TraitSet<dyn AnchorTrait> {
        &self.traits
    }

    /// Attach a trait; it is not attached if its `on_attach` fails.
    pub fn attach_trait(
        &mut self,
        mut value: Box<dyn AnchorTrait>,
        registry: &ItemRegistry,
    ) -> Result<(), TraitFault> {
        let containers = self
            .containers
            .iter_mut()
            .map(|(kind, c)| (Some(*kind), c))
            .collect();
        value.on_attach(AttachContext {
            properties: &mut self.properties,
            registry,
            containers,
        })?;
        self.traits.insert(value);
        Ok(())
    }

    /// Force-close every viewer of every container of this entity.
    /// Returns the closed viewers.
    pub(crate) fn close_all_viewers(&mut self) -> Vec<UniqueId> {
        let kinds: Vec<_> = self.containers.keys().copied().collect();
        let mut closed = Vec::new();
        for kind in kinds {
            if let Some(mut view) = self.container_view(kind) {
                closed.extend(view.close_all(true));
            }
        }
        closed
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("info", &self.info)
            .field("rotation", &self.rotation)
            .field("traits", &self.traits)
            .field("containers", &self.containers.keys().collect::<Vec<_>>())
            .field("player", &self.player.is_some())
            .finish()
    }
}

/// A container bound to its anchor (the block or entity that owns it).
pub struct AnchoredContainer<'a> {
    container: &'a mut Container,
    kind: Option<EntityContainerKind>,
    info: &'a AnchorInfo,
    traits: &'a mut TraitSet<dyn AnchorTrait>,
    properties: &'a mut Properties,
}

impl AnchoredContainer<'_> {
    /// The underlying container.
    pub fn container(&self) -> &Container {
        self.container
    }

    /// Owner identity.
    pub fn info(&self) -> &AnchorInfo {
        self.info
    }

    /// Which entity container this is; `None` for blocks.
    pub fn kind(&self) -> Option<EntityContainerKind> {
        self.kind
    }

    /// Slot count.
    pub fn size(&self) -> usize {
        self.container.size()
    }

    /// Stack in a slot.
    pub fn get_item(&self, slot: usize) -> Option<&ItemStack> {
        self.container.get_item(slot)
    }

    /// Install a stack, stamping the anchor's dimension onto it.
    pub fn set_item(&mut self, slot: usize, mut item: ItemStack) {
        self.stamp(&mut item);
        self.container.set_item(slot, item);
        self.notify_update();
    }

    /// Make a slot absent.
    pub fn clear_slot(&mut self, slot: usize) {
        self.container.clear_slot(slot);
        self.notify_update();
    }

    /// Make every slot absent.
    pub fn clear(&mut self) {
        self.container.clear();
        self.notify_update();
    }

    /// Two-phase stacking insert; see [`Container::add_item`].
    pub fn add_item(&mut self, item: &mut ItemStack) -> bool {
        self.stamp(item);
        let placed = self.container.add_item(item);
        self.notify_update();
        placed
    }

    /// Decrement a slot in place; see [`Container::remove_item`].
    pub fn remove_item(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        let removed = self.container.remove_item(slot, amount);
        self.notify_update();
        removed
    }

    /// Split units off a slot; see [`Container::take_item`].
    pub fn take_item(&mut self, slot: usize, amount: u32) -> Option<ItemStack> {
        let taken = self.container.take_item(slot, amount);
        self.notify_update();
        taken
    }

    /// Move a whole stack out of a slot.
    pub fn take_stack(&mut self, slot: usize) -> Option<ItemStack> {
        let taken = self.container.take_stack(slot);
        self.notify_update();
        taken
    }

    /// Add units to the stack already in `slot`.
    pub fn increment(&mut self, slot: usize, amount: u32) {
        if let Some(stack) = self.container.get_item_mut(slot) {
            stack.increment(amount);
        }
        self.container.sync_slot(slot);
        self.notify_update();
    }

    /// Exchange two slots of this container.
    pub fn swap_items(&mut self, slot: usize, other_slot: usize) {
        self.container.swap_items(slot, other_slot, None);
        self.notify_update();
    }

    /// Change the slot count.
    pub fn resize(&mut self, size: usize) {
        self.container.resize(size);
        self.notify_update();
    }

    /// Bulk snapshot to one viewer or every viewer.
    pub fn update(&self, viewer: Option<&Viewer>) {
        self.container.update(viewer);
    }

    /// Show the container to a viewer. The open packet carries the block
    /// position, or the entity's position and unique id. A player looking at
    /// somebody else's inventory sees a generic container.
    pub fn show(&mut self, viewer: &Viewer, allocator: &mut ContainerIdAllocator) -> ContainerId {
        let options = match self.info.location {
            AnchorLocation::Block(position) => ShowOptions {
                position,
                ..ShowOptions::default()
            },
            AnchorLocation::Entity {
                unique_id,
                position,
            } => {
                let foreign_inventory = self.kind == Some(EntityContainerKind::Inventory)
                    && unique_id != viewer.id();
                ShowOptions {
                    position: BlockPosition::containing(position),
                    unique_id,
                    container_type: foreign_inventory.then_some(ContainerType::Container),
                    identifier: foreign_inventory.then_some(ContainerId::NONE),
                }
            }
        };
        let identifier = self.container.show(viewer, allocator, options);
        let id = viewer.id();
        self.dispatch_hooks("onContainerOpen", |hooks| hooks.on_container_open(id));
        identifier
    }

    /// Close the container for a viewer.
    ///
    /// # Panics
    ///
    /// Panics if `viewer` is not an occupant.
    pub fn close(&mut self, viewer: UniqueId, server_initiated: bool) {
        self.container.close(viewer, server_initiated);
        self.dispatch_hooks("onContainerClose", |hooks| hooks.on_container_close(viewer));
    }

    /// Close every occupant. Returns the closed viewers.
    pub fn close_all(&mut self, server_initiated: bool) -> Vec<UniqueId> {
        let viewers: Vec<_> = self
            .container
            .occupants()
            .iter()
            .map(|o| o.viewer.id())
            .collect();
        for viewer in &viewers {
            self.close(*viewer, server_initiated);
        }
        viewers
    }

    fn stamp(&self, item: &mut ItemStack) {
        if item.dimension().is_none() {
            item.set_dimension(Some(self.info.dimension));
        }
    }

    fn notify_update(&mut self) {
        let container = &*self.container;
        let kind = self.kind;
        let info = self.info;
        let properties = &mut *self.properties;
        self.traits.dispatch(
            |t| match t.update_hook() {
                Some(hook) => hook.on_container_update(ContainerUpdate {
                    container,
                    kind,
                    properties: &mut *properties,
                }),
                None => Ok(()),
            },
            |t, fault| {
                error!(
                    anchor = %info,
                    trait_id = t.identifier(),
                    %fault,
                    "Failed to trigger onContainerUpdate trait event; detaching trait"
                )
            },
        );
    }

    fn dispatch_hooks(
        &mut self,
        event: &'static str,
        mut call: impl FnMut(&mut dyn ContainerHooks) -> Result<(), TraitFault>,
    ) {
        let info = self.info;
        self.traits.dispatch(
            |t| match t.container_hooks() {
                Some(hooks) => call(hooks),
                None => Ok(()),
            },
            |t, fault| {
                error!(
                    anchor = %info,
                    trait_id = t.identifier(),
                    event,
                    %fault,
                    "Anchor trait hook failed; detaching trait"
                )
            },
        );
    }
}
