//! Identifiers for containers, anchors and positions.
//!
//! `ContainerId` is what a client sees in every sync packet, `ContainerName`
//! is the symbolic slot-group name a client uses inside transaction
//! requests, and `ContainerRef` is the server-side address of a concrete
//! container instance.

use crate::DimensionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique id of an entity (players included). Also identifies viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueId(pub i64);

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer block coordinates.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockPosition {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPosition {
    /// Create a new block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Position of the block centre in world space.
    pub fn center(self) -> [f32; 3] {
        [
            self.x as f32 + 0.5,
            self.y as f32 + 0.5,
            self.z as f32 + 0.5,
        ]
    }

    /// Block containing the given world-space point.
    pub fn containing(point: [f32; 3]) -> Self {
        Self::new(
            point[0].floor() as i32,
            point[1].floor() as i32,
            point[2].floor() as i32,
        )
    }

    /// Cheap positional hash for seeding scatter RNGs.
    pub fn hash64(self) -> u64 {
        (self.x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (self.y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            ^ (self.z as u64).wrapping_mul(0x1656_67B1_9E37_79F9)
    }
}

impl fmt::Display for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Container id as carried by sync packets.
///
/// Fixed ids address well-known player containers; everything else is handed
/// out per viewer from the rotating `FIRST..=LAST` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(pub i8);

impl ContainerId {
    /// No container.
    pub const NONE: Self = Self(-1);
    /// The player's own inventory.
    pub const INVENTORY: Self = Self(0);
    /// First id of the dynamically allocated range.
    pub const FIRST: Self = Self(1);
    /// Last id of the dynamically allocated range.
    pub const LAST: Self = Self(100);
    /// The player's offhand slot.
    pub const OFFHAND: Self = Self(119);
    /// The player's armor slots.
    pub const ARMOR: Self = Self(120);
    /// Player UI slots (cursor, crafting grid, creative output).
    pub const UI: Self = Self(124);

    /// Whether this id falls in the dynamically allocated range.
    pub fn is_dynamic(self) -> bool {
        (Self::FIRST.0..=Self::LAST.0).contains(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container kind, shown to the client when a container opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum ContainerType {
    /// No container UI.
    None = -9,
    /// Player inventory.
    Inventory = -1,
    /// Generic slotted container (chests, barrels, other players' inventories).
    Container = 0,
    /// Crafting table.
    Workbench = 1,
    /// Furnace.
    Furnace = 2,
    /// Hopper.
    Hopper = 8,
    /// Armor slots.
    Armor = 18,
    /// Single-slot hand containers (offhand, cursor).
    Hand = 19,
}

impl ContainerType {
    /// Wire value.
    pub const fn as_i8(self) -> i8 {
        self as i8
    }
}

/// Symbolic slot-group name used by clients inside transaction requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContainerName {
    /// Armor slots of the acting player.
    Armor = 6,
    /// Slots of the block or entity container the player has open.
    LevelEntity = 7,
    /// Hotbar and main inventory addressed together.
    HotbarAndInventory = 12,
    /// 2x2 / 3x3 crafting grid.
    CraftingInput = 13,
    /// Crafting result slot.
    CraftingOutput = 14,
    /// Furnace ingredient slot of an open furnace.
    FurnaceIngredient = 25,
    /// Furnace fuel slot of an open furnace.
    FurnaceFuel = 26,
    /// Hotbar slots (0-8 of the inventory).
    Hotbar = 27,
    /// Main inventory slots (9-35 of the inventory).
    Inventory = 28,
    /// Furnace result slot of an open furnace.
    FurnaceResult = 29,
    /// Offhand slot.
    Offhand = 33,
    /// Open shulker box.
    ShulkerBox = 36,
    /// Open barrel.
    Barrel = 57,
    /// Item held by the pointer while moving stacks around.
    Cursor = 58,
    /// Creative palette output slot.
    CreativeOutput = 59,
    /// Dynamic containers (bundles); resolved as the open container.
    Dynamic = 63,
}

impl ContainerName {
    /// Wire value.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the name addresses whatever container the player has open.
    pub fn targets_open_container(self) -> bool {
        matches!(
            self,
            ContainerName::LevelEntity
                | ContainerName::FurnaceIngredient
                | ContainerName::FurnaceFuel
                | ContainerName::FurnaceResult
                | ContainerName::ShulkerBox
                | ContainerName::Barrel
                | ContainerName::Dynamic
        )
    }
}

impl TryFrom<u8> for ContainerName {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            6 => ContainerName::Armor,
            7 => ContainerName::LevelEntity,
            12 => ContainerName::HotbarAndInventory,
            13 => ContainerName::CraftingInput,
            14 => ContainerName::CraftingOutput,
            25 => ContainerName::FurnaceIngredient,
            26 => ContainerName::FurnaceFuel,
            27 => ContainerName::Hotbar,
            28 => ContainerName::Inventory,
            29 => ContainerName::FurnaceResult,
            33 => ContainerName::Offhand,
            36 => ContainerName::ShulkerBox,
            57 => ContainerName::Barrel,
            58 => ContainerName::Cursor,
            59 => ContainerName::CreativeOutput,
            63 => ContainerName::Dynamic,
            other => return Err(other),
        })
    }
}

/// Containers every entity anchor may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityContainerKind {
    /// Hotbar + main inventory.
    Inventory,
    /// Armor slots.
    Armor,
    /// Offhand slot.
    Offhand,
    /// Pointer slot.
    Cursor,
    /// Crafting grid.
    CraftingInput,
    /// Crafting result.
    CraftingOutput,
    /// Creative palette output.
    CreativeOutput,
}

impl EntityContainerKind {
    /// Slot count, container kind and fixed id for a player-owned container.
    pub fn layout(self) -> (usize, ContainerType, ContainerId) {
        match self {
            EntityContainerKind::Inventory => (36, ContainerType::Inventory, ContainerId::INVENTORY),
            EntityContainerKind::Armor => (4, ContainerType::Armor, ContainerId::ARMOR),
            EntityContainerKind::Offhand => (1, ContainerType::Hand, ContainerId::OFFHAND),
            EntityContainerKind::Cursor => (1, ContainerType::Hand, ContainerId::UI),
            EntityContainerKind::CraftingInput => (4, ContainerType::Workbench, ContainerId::UI),
            EntityContainerKind::CraftingOutput => (1, ContainerType::Workbench, ContainerId::UI),
            EntityContainerKind::CreativeOutput => (1, ContainerType::Inventory, ContainerId::UI),
        }
    }

    /// First slot of this container inside the shared [`ContainerId::UI`]
    /// container, or `None` when the container owns its id outright.
    ///
    /// UI layout: cursor 0, crafting grid 28..=31, crafting result 50,
    /// creative output 51.
    pub fn ui_slot_offset(self) -> Option<u32> {
        match self {
            EntityContainerKind::Cursor => Some(0),
            EntityContainerKind::CraftingInput => Some(28),
            EntityContainerKind::CraftingOutput => Some(50),
            EntityContainerKind::CreativeOutput => Some(51),
            EntityContainerKind::Inventory
            | EntityContainerKind::Armor
            | EntityContainerKind::Offhand => None,
        }
    }
}

/// Server-side address of a concrete container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerRef {
    /// Container owned by a block anchor.
    Block {
        /// Dimension of the block.
        dimension: DimensionId,
        /// Position of the block.
        position: BlockPosition,
    },
    /// Container owned by an entity anchor.
    Entity {
        /// Owning entity.
        owner: UniqueId,
        /// Which of the entity's containers.
        kind: EntityContainerKind,
    },
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Block {
                dimension,
                position,
            } => write!(f, "block {position} in {dimension}"),
            ContainerRef::Entity { owner, kind } => write!(f, "{kind:?} of entity {owner}"),
        }
    }
}
