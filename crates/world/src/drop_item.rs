//! Dropped item system with physics and lifecycle management.
//!
//! Items are dropped by players or scattered when a block holding an
//! inventory is broken. They carry the full stack (properties and traits
//! included), fall under simple gravity, can be picked up by nearby players
//! and despawn after 5 minutes.

use std::collections::BTreeMap;
use voxelhost_core::{DimensionId, ItemStack, UniqueId};

/// Maximum lifetime for dropped items (5 minutes = 6000 ticks at 20 TPS).
pub const ITEM_DESPAWN_TICKS: u32 = 6000;

/// Pickup radius in blocks.
pub const PICKUP_RADIUS: f32 = 1.5;

/// Ticks after spawning during which an item cannot be picked up.
pub const PICKUP_DELAY_TICKS: u32 = 40;

/// Downward acceleration per tick.
const GRAVITY: f32 = 0.04;

/// Per-tick velocity multiplier while airborne.
const DRAG: f32 = 0.98;

/// Items rest this far above the ground.
const GROUND_OFFSET: f32 = 0.25;

/// A dropped item entity in the world.
#[derive(Debug, Clone)]
pub struct DroppedItem {
    /// Unique ID of the item entity.
    pub unique_id: UniqueId,
    /// Dimension the item lies in.
    pub dimension: DimensionId,
    /// World position.
    pub position: [f32; 3],
    /// Velocity in blocks per tick.
    pub velocity: [f32; 3],
    /// The dropped stack.
    pub stack: ItemStack,
    /// Ticks remaining before despawn.
    pub lifetime_ticks: u32,
    /// Ticks remaining before the item may be picked up.
    pub pickup_delay: u32,
    /// Whether the item is on the ground (no longer falling).
    pub on_ground: bool,
}

impl DroppedItem {
    /// Create a new dropped item.
    ///
    /// # Arguments
    /// * `unique_id` - Entity id of the item
    /// * `dimension` - Dimension it lies in
    /// * `position` - World position
    /// * `velocity` - Initial launch velocity
    /// * `stack` - The stack it carries
    pub fn new(
        unique_id: UniqueId,
        dimension: DimensionId,
        position: [f32; 3],
        velocity: [f32; 3],
        stack: ItemStack,
    ) -> Self {
        Self {
            unique_id,
            dimension,
            position,
            velocity,
            stack,
            lifetime_ticks: ITEM_DESPAWN_TICKS,
            pickup_delay: PICKUP_DELAY_TICKS,
            on_ground: false,
        }
    }

    /// Runtime id used on the wire.
    pub fn runtime_id(&self) -> u64 {
        self.unique_id.0 as u64
    }

    /// Update the item's physics and lifetime.
    ///
    /// # Arguments
    /// * `ground_height` - The Y coordinate of the ground under the item
    ///
    /// # Returns
    /// `true` if the item should be removed (despawned), `false` otherwise.
    pub fn update(&mut self, ground_height: f32) -> bool {
        if self.lifetime_ticks > 0 {
            self.lifetime_ticks -= 1;
        } else {
            return true;
        }
        self.pickup_delay = self.pickup_delay.saturating_sub(1);

        if !self.on_ground {
            self.velocity[1] -= GRAVITY;
            for axis in 0..3 {
                self.velocity[axis] *= DRAG;
                self.position[axis] += self.velocity[axis];
            }

            let rest = ground_height + GROUND_OFFSET;
            if self.position[1] <= rest {
                self.position[1] = rest;
                self.velocity[1] = 0.0;
                // Friction
                self.velocity[0] *= 0.5;
                self.velocity[2] *= 0.5;

                if self.velocity[0].abs() < 0.01 && self.velocity[2].abs() < 0.01 {
                    self.on_ground = true;
                }
            }
        }

        false
    }

    /// Check if this item can be picked up by a player at the given position.
    pub fn can_pickup(&self, position: [f32; 3]) -> bool {
        if self.pickup_delay > 0 {
            return false;
        }
        let dist_sq: f32 = (0..3)
            .map(|axis| (self.position[axis] - position[axis]).powi(2))
            .sum();
        dist_sq <= PICKUP_RADIUS * PICKUP_RADIUS
    }
}

/// Manages all dropped items in the world.
#[derive(Debug, Default)]
pub struct ItemManager {
    items: BTreeMap<UniqueId, DroppedItem>,
}

impl ItemManager {
    /// Create a new empty item manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a dropped item.
    pub fn insert(&mut self, item: DroppedItem) {
        self.items.insert(item.unique_id, item);
    }

    /// Stop tracking an item.
    pub fn remove(&mut self, unique_id: UniqueId) -> Option<DroppedItem> {
        self.items.remove(&unique_id)
    }

    /// Update all items (physics and lifetime).
    ///
    /// # Arguments
    /// * `ground_height` - Ground height at an `(x, z)` position of a dimension
    ///
    /// # Returns
    /// Items that despawned this tick.
    pub fn update<F>(&mut self, ground_height: F) -> Vec<DroppedItem>
    where
        F: Fn(DimensionId, f32, f32) -> f32,
    {
        let expired: Vec<UniqueId> = self
            .items
            .values_mut()
            .filter_map(|item| {
                let ground = ground_height(item.dimension, item.position[0], item.position[2]);
                item.update(ground).then_some(item.unique_id)
            })
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.items.remove(&id))
            .collect()
    }

    /// Ids of items in `dimension` a player at `position` can pick up.
    pub fn pickup_candidates(&self, dimension: DimensionId, position: [f32; 3]) -> Vec<UniqueId> {
        self.items
            .values()
            .filter(|item| item.dimension == dimension && item.can_pickup(position))
            .map(|item| item.unique_id)
            .collect()
    }

    /// Get the number of active dropped items.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Get a reference to a specific item by ID.
    pub fn get(&self, unique_id: UniqueId) -> Option<&DroppedItem> {
        self.items.get(&unique_id)
    }

    /// Get a mutable reference to a specific item by ID.
    pub fn get_mut(&mut self, unique_id: UniqueId) -> Option<&mut DroppedItem> {
        self.items.get_mut(&unique_id)
    }

    /// Iterate over every item.
    pub fn items(&self) -> impl Iterator<Item = &DroppedItem> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelhost_core::ItemRegistry;

    fn stone(amount: u32) -> ItemStack {
        ItemStack::new(ItemRegistry::vanilla().get("stone").unwrap().clone(), amount)
    }

    fn dropped(id: i64, position: [f32; 3]) -> DroppedItem {
        DroppedItem::new(
            UniqueId(id),
            DimensionId::Overworld,
            position,
            [0.0, 0.0, 0.0],
            stone(1),
        )
    }

    #[test]
    fn test_dropped_item_physics() {
        let mut item = dropped(1, [10.0, 70.0, 20.0]);
        let ground_height = 64.0;

        for _ in 0..100 {
            if item.update(ground_height) {
                break;
            }
        }

        assert!(item.on_ground);
        assert!((item.position[1] - (ground_height + 0.25)).abs() < 0.1);
    }

    #[test]
    fn test_dropped_item_lifetime() {
        let mut item = dropped(1, [10.0, 64.25, 20.0]);
        item.on_ground = true;
        item.lifetime_ticks = 2;

        assert!(!item.update(64.0));
        assert!(!item.update(64.0));
        assert!(item.update(64.0));
    }

    #[test]
    fn test_item_pickup_radius() {
        let mut item = dropped(1, [10.0, 64.0, 20.0]);
        assert!(!item.can_pickup([10.0, 64.0, 20.0]), "pickup delay applies");
        item.pickup_delay = 0;

        assert!(item.can_pickup([10.0, 64.0, 20.0]));
        assert!(item.can_pickup([10.5, 64.0, 20.0]));
        assert!(item.can_pickup([10.0, 64.5, 20.0]));

        assert!(!item.can_pickup([12.0, 64.0, 20.0]));
        assert!(!item.can_pickup([10.0, 70.0, 20.0]));
    }

    #[test]
    fn test_item_manager_despawn() {
        let mut manager = ItemManager::new();
        let mut item = dropped(7, [10.0, 64.25, 20.0]);
        item.on_ground = true;
        item.lifetime_ticks = 1;
        manager.insert(item);

        let ground_height = |_dimension: DimensionId, _x: f32, _z: f32| 64.0;

        assert!(manager.update(ground_height).is_empty());
        let despawned = manager.update(ground_height);
        assert_eq!(despawned.len(), 1);
        assert_eq!(despawned[0].unique_id, UniqueId(7));
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_pickup_candidates_respect_dimension() {
        let mut manager = ItemManager::new();
        let mut here = dropped(1, [0.0, 64.0, 0.0]);
        here.pickup_delay = 0;
        let mut elsewhere = dropped(2, [0.0, 64.0, 0.0]);
        elsewhere.pickup_delay = 0;
        elsewhere.dimension = DimensionId::Nether;
        manager.insert(here);
        manager.insert(elsewhere);

        assert_eq!(
            manager.pickup_candidates(DimensionId::Overworld, [0.0, 64.0, 0.0]),
            vec![UniqueId(1)]
        );
    }
}
