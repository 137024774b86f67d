//! The world: anchors, dropped items and the services shared by every
//! container.

use crate::allocator::ContainerIdAllocator;
use crate::anchor::{AnchoredContainer, Block, Entity};
use crate::container::Container;
use crate::drop_item::{DroppedItem, ItemManager};
use crate::signals::{PlayerDropItem, PlayerOpenedContainer, Signals};
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};
use voxelhost_core::{
    scoped_rng, BlockPosition, ContainerId, ContainerRef, DimensionId, EntityContainerKind,
    ItemRegistry, ItemStack, SimTick, UniqueId,
};
use voxelhost_net::{NetworkItemStackDescriptor, ServerPacket};

type BlockMap = BTreeMap<(DimensionId, BlockPosition), Block>;
type EntityMap = BTreeMap<UniqueId, Entity>;
type GroundFn = Box<dyn Fn(DimensionId, f32, f32) -> f32>;

/// Default ground height used when no terrain query is installed.
pub const DEFAULT_GROUND_HEIGHT: f32 = 64.0;

/// Anchored view of any container, borrowing only the anchor maps so the
/// rest of the world stays available.
fn view<'a>(
    blocks: &'a mut BlockMap,
    entities: &'a mut EntityMap,
    target: ContainerRef,
) -> Option<AnchoredContainer<'a>> {
    match target {
        ContainerRef::Block {
            dimension,
            position,
        } => blocks.get_mut(&(dimension, position))?.container_view(),
        ContainerRef::Entity { owner, kind } => entities.get_mut(&owner)?.container_view(kind),
    }
}

/// Server-side world state.
pub struct World {
    seed: u64,
    tick: SimTick,
    registry: ItemRegistry,
    allocator: ContainerIdAllocator,
    signals: Signals,
    blocks: BlockMap,
    entities: EntityMap,
    items: ItemManager,
    next_unique_id: i64,
    ground: GroundFn,
}

impl World {
    /// Empty world.
    pub fn new(seed: u64, registry: ItemRegistry) -> Self {
        Self {
            seed,
            tick: SimTick::ZERO,
            registry,
            allocator: ContainerIdAllocator::new(),
            signals: Signals::new(),
            blocks: BlockMap::new(),
            entities: EntityMap::new(),
            items: ItemManager::new(),
            next_unique_id: 1,
            ground: Box::new(|_, _, _| DEFAULT_GROUND_HEIGHT),
        }
    }

    /// Install the terrain query used by dropped-item physics.
    pub fn with_ground(mut self, ground: impl Fn(DimensionId, f32, f32) -> f32 + 'static) -> Self {
        self.ground = Box::new(ground);
        self
    }

    /// World seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current tick.
    pub fn tick_count(&self) -> SimTick {
        self.tick
    }

    /// Item palette.
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    /// Signal listeners.
    pub fn signals_mut(&mut self) -> &mut Signals {
        &mut self.signals
    }

    /// Fresh entity id, never colliding with a live entity.
    pub fn allocate_unique_id(&mut self) -> UniqueId {
        loop {
            let id = UniqueId(self.next_unique_id);
            self.next_unique_id += 1;
            if !self.entities.contains_key(&id) && self.items.get(id).is_none() {
                return id;
            }
        }
    }

    /// Place a block, replacing whatever was at its position.
    ///
    /// Viewers of a replaced container are force-closed first.
    pub fn add_block(&mut self, block: Block) -> Option<Block> {
        let key = (block.dimension(), block.position());
        let mut replaced = self.blocks.remove(&key);
        if let Some(old) = replaced.as_mut() {
            self.release_viewers(old);
            if old.opened() {
                self.broadcast(key.0, ServerPacket::BlockEvent { position: key.1, open: false });
            }
            debug!(old = %old.info(), new = %block.info(), "Block replaced");
        }
        self.blocks.insert(key, block);
        replaced
    }

    fn release_viewers(&mut self, block: &mut Block) {
        let viewers = match block.container_view() {
            Some(mut view) => view.close_all(true),
            None => return,
        };
        for viewer in viewers {
            self.forget_opened(viewer);
        }
    }

    /// Block at a position.
    pub fn block(&self, dimension: DimensionId, position: BlockPosition) -> Option<&Block> {
        self.blocks.get(&(dimension, position))
    }

    /// Block at a position, mutably.
    pub fn block_mut(&mut self, dimension: DimensionId, position: BlockPosition) -> Option<&mut Block> {
        self.blocks.get_mut(&(dimension, position))
    }

    /// Spawn an entity.
    pub fn add_entity(&mut self, entity: Entity) {
        info!(entity = %entity.info(), "Entity added");
        self.entities.insert(entity.unique_id(), entity);
    }

    /// Entity by id.
    pub fn entity(&self, unique_id: UniqueId) -> Option<&Entity> {
        self.entities.get(&unique_id)
    }

    /// Entity by id, mutably.
    pub fn entity_mut(&mut self, unique_id: UniqueId) -> Option<&mut Entity> {
        self.entities.get_mut(&unique_id)
    }

    /// Every player entity.
    pub fn players(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_player())
    }

    /// Despawn an entity. Its open container is closed and every viewer of
    /// its own containers is force-closed first.
    pub fn remove_entity(&mut self, unique_id: UniqueId) -> Option<Entity> {
        if self.entities.get(&unique_id)?.is_player() {
            self.close_container(unique_id, true);
        }
        let mut entity = self.entities.remove(&unique_id)?;
        for viewer in entity.close_all_viewers() {
            self.forget_opened(viewer);
        }
        info!(entity = %entity.info(), "Entity removed");
        Some(entity)
    }

    /// Container by address.
    pub fn container(&self, target: ContainerRef) -> Option<&Container> {
        match target {
            ContainerRef::Block {
                dimension,
                position,
            } => self.block(dimension, position)?.container(),
            ContainerRef::Entity { owner, kind } => self.entity(owner)?.container(kind),
        }
    }

    /// Anchored view of a container by address.
    pub fn container_view(&mut self, target: ContainerRef) -> Option<AnchoredContainer<'_>> {
        view(&mut self.blocks, &mut self.entities, target)
    }

    /// Container the player currently has open.
    pub fn opened_container(&self, player: UniqueId) -> Option<ContainerRef> {
        self.entity(player)?.player_state()?.opened_container
    }

    /// Open a container for a player.
    ///
    /// Emits [`PlayerOpenedContainer`] first; if a listener cancels, no id
    /// is assigned and nothing is sent. Otherwise the player's previously
    /// open container is closed (server initiated) and the target is shown.
    /// Returns the id the player sees the container under.
    #[instrument(skip(self), fields(player = %player, target = %target))]
    pub fn open_container(&mut self, player: UniqueId, target: ContainerRef) -> Option<ContainerId> {
        let viewer = self.entity(player)?.player_state()?.viewer.clone();
        let anchor = view(&mut self.blocks, &mut self.entities, target)?
            .info()
            .clone();

        let event = PlayerOpenedContainer {
            player,
            target,
            anchor,
        };
        if !self.signals.emit_player_opened_container(&event) {
            debug!("Container open cancelled by a listener");
            return None;
        }

        if self
            .opened_container(player)
            .is_some_and(|previous| previous != target)
        {
            self.close_container(player, true);
        }

        let identifier = view(&mut self.blocks, &mut self.entities, target)?
            .show(&viewer, &mut self.allocator);
        if let Some(state) = self.entity_mut(player).and_then(Entity::player_state_mut) {
            state.opened_container = Some(target);
        }
        info!(container_id = %identifier, "Container opened");
        Some(identifier)
    }

    /// Close the player's open container. Returns `false` if none was open.
    #[instrument(skip(self), fields(player = %player))]
    pub fn close_container(&mut self, player: UniqueId, server_initiated: bool) -> bool {
        let Some(target) = self.opened_container(player) else {
            return false;
        };
        self.forget_opened(player);
        match view(&mut self.blocks, &mut self.entities, target) {
            Some(mut view) if view.container().is_occupant(player) => {
                view.close(player, server_initiated);
                info!(target = %target, server_initiated, "Container closed");
                true
            }
            _ => false,
        }
    }

    fn forget_opened(&mut self, player: UniqueId) {
        if let Some(state) = self.entity_mut(player).and_then(Entity::player_state_mut) {
            state.opened_container = None;
        }
    }

    /// Send a packet to every player in a dimension.
    pub fn broadcast(&self, dimension: DimensionId, packet: ServerPacket) {
        for player in self.players().filter(|p| p.dimension() == dimension) {
            if let Some(state) = player.player_state() {
                state.viewer.send(packet.clone());
            }
        }
    }

    /// Spawn a dropped item and announce it to the dimension.
    pub fn spawn_item(
        &mut self,
        dimension: DimensionId,
        mut stack: ItemStack,
        position: [f32; 3],
        velocity: [f32; 3],
    ) -> UniqueId {
        let unique_id = self.allocate_unique_id();
        stack.set_container(None);
        stack.set_dimension(Some(dimension));
        let item = DroppedItem::new(unique_id, dimension, position, velocity, stack);
        self.broadcast(
            dimension,
            ServerPacket::AddItemActor {
                unique_id,
                runtime_id: item.runtime_id(),
                item: NetworkItemStackDescriptor::from(&item.stack),
                position,
                velocity,
            },
        );
        debug!(%unique_id, item = %item.stack.identifier(), amount = item.stack.amount(), "Item spawned");
        self.items.insert(item);
        unique_id
    }

    /// Throw a stack out of a player's hands.
    ///
    /// Emits [`PlayerDropItem`]; a cancelled drop hands the stack back. The
    /// launch velocity follows the player's head yaw and pitch.
    pub fn drop_from_player(&mut self, player: UniqueId, stack: ItemStack) -> Result<UniqueId, ItemStack> {
        let Some(entity) = self.entity(player) else {
            return Err(stack);
        };
        let event = PlayerDropItem {
            player,
            item: &stack,
        };
        if !self.signals.emit_player_drop_item(&event) {
            debug!(%player, "Item drop cancelled by a listener");
            return Err(stack);
        }

        let dimension = entity.dimension();
        let [x, y, z] = entity.position();
        let yaw = entity.rotation.head_yaw.to_radians();
        let pitch = entity.rotation.pitch.to_radians();
        let velocity = [
            -yaw.sin() * pitch.cos() / 3.0,
            -pitch.sin() / 2.0,
            yaw.cos() * pitch.cos() / 3.0,
        ];
        Ok(self.spawn_item(dimension, stack, [x, y - 0.25, z], velocity))
    }

    /// Dropped items.
    pub fn items(&self) -> &ItemManager {
        &self.items
    }

    /// Break a block: force-close its viewers and scatter its contents.
    #[instrument(skip(self))]
    pub fn break_block(&mut self, dimension: DimensionId, position: BlockPosition) -> Option<Block> {
        let mut block = self.blocks.remove(&(dimension, position))?;
        let mut rng = scoped_rng(self.seed, position.hash64(), self.tick);
        let mut scattered = Vec::new();

        self.release_viewers(&mut block);
        if let Some(mut view) = block.container_view() {
            for slot in 0..view.size() {
                if let Some(stack) = view.take_stack(slot) {
                    scattered.push(stack);
                }
            }
        }

        let center = position.center();
        let count = scattered.len();
        for stack in scattered {
            let velocity = [
                rng.gen::<f32>() * 0.6 - 0.35,
                rng.gen::<f32>() * 0.35,
                rng.gen::<f32>() * 0.6 - 0.35,
            ];
            self.spawn_item(dimension, stack, center, velocity);
        }
        if block.opened() {
            self.broadcast(dimension, ServerPacket::BlockEvent { position, open: false });
        }
        info!(block = %block.info(), scattered = count, "Block broken");
        Some(block)
    }

    /// Advance one tick: block open state, dropped-item physics and pickups.
    #[instrument(skip(self), fields(tick = self.tick.0))]
    pub fn tick(&mut self) {
        self.tick = self.tick.advance(1);

        let mut events = Vec::new();
        for block in self.blocks.values_mut() {
            let occupied = block
                .container()
                .is_some_and(|c| c.occupant_count() > 0);
            if occupied != block.opened() {
                block.set_opened(occupied);
                events.push((
                    block.dimension(),
                    ServerPacket::BlockEvent {
                        position: block.position(),
                        open: occupied,
                    },
                ));
            }
        }
        for (dimension, packet) in events {
            self.broadcast(dimension, packet);
        }

        let despawned = self.items.update(&self.ground);
        for item in despawned {
            debug!(unique_id = %item.unique_id, "Item despawned");
            self.broadcast(item.dimension, ServerPacket::RemoveActor { unique_id: item.unique_id });
        }

        self.collect_pickups();
    }

    fn collect_pickups(&mut self) {
        let players: Vec<_> = self
            .players()
            .map(|p| (p.unique_id(), p.dimension(), p.position()))
            .collect();

        for (player, dimension, position) in players {
            for id in self.items.pickup_candidates(dimension, position) {
                let (Some(item), Some(entity)) = (self.items.get_mut(id), self.entities.get_mut(&player)) else {
                    continue;
                };
                let Some(mut inventory) = entity.container_view(EntityContainerKind::Inventory) else {
                    break;
                };
                let before = item.stack.amount();
                let collected = inventory.add_item(&mut item.stack);
                let picked = before - item.stack.amount();

                if collected {
                    self.items.remove(id);
                    self.broadcast(dimension, ServerPacket::RemoveActor { unique_id: id });
                    debug!(%player, item = %id, picked, "Item picked up");
                } else if picked > 0 {
                    debug!(%player, item = %id, picked, "Item partially picked up");
                }
            }
        }
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("seed", &self.seed)
            .field("tick", &self.tick)
            .field("blocks", &self.blocks.len())
            .field("entities", &self.entities.len())
            .field("items", &self.items.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::GameMode;
    use crate::viewer::Viewer;
    use std::sync::mpsc::Receiver;
    use voxelhost_core::{ContainerType, RegistryKey};

    const CHEST_AT: BlockPosition = BlockPosition::new(0, 64, 0);

    fn key(path: &str) -> RegistryKey {
        RegistryKey::parse(path).unwrap()
    }

    fn world() -> World {
        let mut world = World::new(7, ItemRegistry::vanilla());
        world.add_block(
            Block::new(key("chest"), DimensionId::Overworld, CHEST_AT)
                .with_container(ContainerType::Container, 27),
        );
        world
    }

    fn join(world: &mut World, id: i64) -> Receiver<ServerPacket> {
        let (viewer, rx) = Viewer::channel(UniqueId(id), 256);
        world.add_entity(Entity::player(
            key("player"),
            viewer,
            DimensionId::Overworld,
            [0.5, 65.0, 0.5],
            GameMode::Survival,
        ));
        rx
    }

    fn chest_ref() -> ContainerRef {
        ContainerRef::Block {
            dimension: DimensionId::Overworld,
            position: CHEST_AT,
        }
    }

    fn stack(world: &World, identifier: &str, amount: u32) -> ItemStack {
        ItemStack::new(world.registry().get(identifier).unwrap().clone(), amount)
    }

    #[test]
    fn cancelled_open_assigns_nothing() {
        let mut world = world();
        let rx = join(&mut world, 1);
        world.signals_mut().on_player_opened_container(|_| false);

        assert_eq!(world.open_container(UniqueId(1), chest_ref()), None);
        assert_eq!(world.opened_container(UniqueId(1)), None);
        assert_eq!(world.container(chest_ref()).unwrap().occupant_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn opening_another_container_closes_the_first() {
        let mut world = world();
        let other = BlockPosition::new(5, 64, 5);
        world.add_block(
            Block::new(key("barrel"), DimensionId::Overworld, other)
                .with_container(ContainerType::Container, 27),
        );
        let _rx = join(&mut world, 1);

        world.open_container(UniqueId(1), chest_ref()).unwrap();
        let barrel = ContainerRef::Block {
            dimension: DimensionId::Overworld,
            position: other,
        };
        world.open_container(UniqueId(1), barrel).unwrap();

        assert!(!world.container(chest_ref()).unwrap().is_occupant(UniqueId(1)));
        assert!(world.container(barrel).unwrap().is_occupant(UniqueId(1)));
        assert_eq!(world.opened_container(UniqueId(1)), Some(barrel));
    }

    #[test]
    fn close_without_open_container_is_a_no_op() {
        let mut world = world();
        let _rx = join(&mut world, 1);
        assert!(!world.close_container(UniqueId(1), false));
    }

    #[test]
    fn breaking_a_block_force_closes_and_scatters() {
        let mut world = world();
        let rx = join(&mut world, 1);
        world.open_container(UniqueId(1), chest_ref()).unwrap();
        let diamonds = stack(&world, "diamond", 3);
        let dirt = stack(&world, "dirt", 40);
        let mut view = world.container_view(chest_ref()).unwrap();
        view.set_item(0, diamonds);
        view.set_item(10, dirt);
        rx.try_iter().count();

        let block = world.break_block(DimensionId::Overworld, CHEST_AT).unwrap();
        assert!(block.container().unwrap().storage().iter().all(Option::is_none));
        assert_eq!(world.opened_container(UniqueId(1)), None);
        assert_eq!(world.items().count(), 2);

        let packets: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            packets[0],
            ServerPacket::ContainerClose { server_initiated: true, .. }
        ));
        assert_eq!(
            packets
                .iter()
                .filter(|p| matches!(p, ServerPacket::AddItemActor { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn dropped_items_are_picked_up_after_the_delay() {
        let mut world = world();
        let _rx = join(&mut world, 1);
        let apples = stack(&world, "apple", 5);
        let id = world.spawn_item(DimensionId::Overworld, apples, [0.5, 64.25, 0.5], [0.0; 3]);

        for _ in 0..crate::drop_item::PICKUP_DELAY_TICKS + 1 {
            world.tick();
        }

        assert!(world.items().get(id).is_none());
        let inventory = world
            .entity(UniqueId(1))
            .unwrap()
            .container(EntityContainerKind::Inventory)
            .unwrap();
        assert_eq!(inventory.get_item(0).map(ItemStack::amount), Some(5));
    }

    #[test]
    fn vetoed_drop_returns_the_stack() {
        let mut world = world();
        let _rx = join(&mut world, 1);
        world.signals_mut().on_player_drop_item(|_| false);
        let apples = stack(&world, "apple", 5);

        let returned = world.drop_from_player(UniqueId(1), apples).unwrap_err();
        assert_eq!(returned.amount(), 5);
        assert_eq!(world.items().count(), 0);
    }

    #[test]
    fn replacing_an_open_chest_force_closes_its_viewers() {
        let mut world = world();
        let rx = join(&mut world, 1);
        world.open_container(UniqueId(1), chest_ref()).unwrap();
        world.tick();
        rx.try_iter().count();

        let old = world
            .add_block(Block::new(key("stone"), DimensionId::Overworld, CHEST_AT))
            .unwrap();
        assert_eq!(old.container().unwrap().occupant_count(), 0);
        assert_eq!(world.opened_container(UniqueId(1)), None);

        let packets: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            packets[0],
            ServerPacket::ContainerClose { server_initiated: true, .. }
        ));
        assert!(packets
            .iter()
            .any(|p| matches!(p, ServerPacket::BlockEvent { open: false, .. })));
    }

    #[test]
    fn replacing_a_chest_with_a_chest_leaves_the_new_one_unoccupied() {
        let mut world = world();
        let _rx = join(&mut world, 1);
        world.open_container(UniqueId(1), chest_ref()).unwrap();

        world.add_block(
            Block::new(key("chest"), DimensionId::Overworld, CHEST_AT)
                .with_container(ContainerType::Container, 27),
        );
        assert_eq!(world.opened_container(UniqueId(1)), None);
        assert_eq!(world.container(chest_ref()).unwrap().occupant_count(), 0);
        assert!(!world.close_container(UniqueId(1), false));
    }

    #[test]
    fn drop_velocity_follows_head_rotation() {
        let mut world = world();
        let rx = join(&mut world, 1);
        let entity = world.entity_mut(UniqueId(1)).unwrap();
        entity.rotation.head_yaw = 90.0;
        entity.rotation.pitch = 0.0;
        let apples = stack(&world, "apple", 1);

        world.drop_from_player(UniqueId(1), apples).unwrap();

        let velocity = rx
            .try_iter()
            .find_map(|p| match p {
                ServerPacket::AddItemActor { velocity, .. } => Some(velocity),
                _ => None,
            })
            .expect("item spawned");
        let expected = [-1.0 / 3.0, 0.0, 0.0];
        for (axis, (got, want)) in velocity.iter().zip(expected).enumerate() {
            assert!((got - want).abs() < 1e-5, "axis {axis}: {got} != {want}");
        }
    }

    #[test]
    fn looking_down_throws_downwards() {
        let mut world = world();
        let rx = join(&mut world, 1);
        world.entity_mut(UniqueId(1)).unwrap().rotation.pitch = 90.0;
        let apples = stack(&world, "apple", 1);

        world.drop_from_player(UniqueId(1), apples).unwrap();

        let velocity = rx
            .try_iter()
            .find_map(|p| match p {
                ServerPacket::AddItemActor { velocity, .. } => Some(velocity),
                _ => None,
            })
            .expect("item spawned");
        assert!((velocity[1] + 0.5).abs() < 1e-5);
        assert!(velocity[0].abs() < 1e-5 && velocity[2].abs() < 1e-5);
    }

    #[test]
    fn block_open_state_is_broadcast_on_tick() {
        let mut world = world();
        let rx = join(&mut world, 1);
        world.open_container(UniqueId(1), chest_ref()).unwrap();
        world.tick();
        assert!(rx
            .try_iter()
            .any(|p| matches!(p, ServerPacket::BlockEvent { open: true, .. })));

        world.close_container(UniqueId(1), false);
        world.tick();
        assert!(rx
            .try_iter()
            .any(|p| matches!(p, ServerPacket::BlockEvent { open: false, .. })));
    }
}
