#![warn(missing_docs)]
//! Core primitives shared across the workspace: ids, item stacks, item
//! traits and the tick clock.

pub mod dimension;
pub mod ids;
pub mod item;
pub mod registry;
pub mod traits;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use dimension::DimensionId;
pub use ids::{
    BlockPosition, ContainerId, ContainerName, ContainerRef, ContainerType, EntityContainerKind,
    UniqueId,
};
pub use item::{ItemStack, ItemStackEntry, ItemStorage, TraitEntry};
pub use registry::{
    ItemRegistry, ItemType, RegistryError, RegistryKey, RegistryKeyError, TraitConstructor,
};
pub use traits::{AttachedTrait, ContainerHooks, ItemTrait, TraitFault, TraitSet};

/// Fixed tick type (20 TPS => 50 ms per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick of a server run.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Reproducible RNG for scatter effects, seeded by world seed, a positional
/// hash and the current tick.
pub fn scoped_rng(world_seed: u64, position_hash: u64, tick: SimTick) -> StdRng {
    let seed = world_seed ^ position_hash ^ tick.0;
    StdRng::seed_from_u64(seed)
}
