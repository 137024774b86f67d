//! Turns a client's named item-stack actions into container mutations.
//!
//! Every action resolves and validates both of its ends before touching any
//! slot, so a rejected action leaves the world exactly as it found it.

use thiserror::Error;
use tracing::debug;
use voxelhost_core::{ContainerName, ContainerRef, EntityContainerKind, ItemStack, UniqueId};
use voxelhost_net::{ItemStackAction, NetworkItemStackDescriptor, StackSlot};
use voxelhost_world::{AnchoredContainer, GameMode, World};

/// Why an item-stack action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// The acting player is not in the world.
    #[error("player {0} is not in the world")]
    UnknownPlayer(UniqueId),
    /// The named container does not exist.
    #[error("container {0} not found")]
    ContainerNotFound(ContainerRef),
    /// The name addresses the open container, but none is open.
    #[error("no open container for {0:?}")]
    NoOpenContainer(ContainerName),
    /// Slot index beyond the container.
    #[error("slot {slot} out of range for {container:?} (size {size})")]
    SlotOutOfRange {
        /// Named container.
        container: ContainerName,
        /// Requested slot.
        slot: u8,
        /// Container size.
        size: usize,
    },
    /// Zero-unit action.
    #[error("action count must be positive")]
    ZeroCount,
    /// The source slot is empty.
    #[error("{container:?} slot {slot} is empty")]
    EmptySource {
        /// Named container.
        container: ContainerName,
        /// Slot.
        slot: u8,
    },
    /// More units requested than the source holds.
    #[error("count {count} exceeds the {available} units in {container:?} slot {slot}")]
    CountExceedsQuantity {
        /// Named container.
        container: ContainerName,
        /// Slot.
        slot: u8,
        /// Requested units.
        count: u32,
        /// Units present.
        available: u32,
    },
    /// The destination holds a stack the moved units cannot merge with.
    #[error("cannot merge {incoming} into {existing}")]
    IncompatibleMerge {
        /// Identifier already in the destination.
        existing: String,
        /// Identifier of the moved units.
        incoming: String,
    },
    /// The destination would exceed its max stack size.
    #[error("destination would hold {amount} units, max {max}")]
    Overflow {
        /// Resulting amount.
        amount: u32,
        /// Max stack size.
        max: u32,
    },
    /// The creative descriptor names no known item.
    #[error("unknown item network id {0}")]
    UnknownItem(i32),
    /// Creative actions need creative mode.
    #[error("creative actions require creative mode")]
    NotCreative,
    /// A drop listener cancelled the drop.
    #[error("drop cancelled")]
    DropCancelled,
}

/// A client slot resolved to a concrete container slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSlot {
    /// Client name of the slot group.
    pub name: ContainerName,
    /// Concrete container.
    pub target: ContainerRef,
    /// Slot index, already range-checked.
    pub slot: usize,
}

/// Container a name addresses for `player`.
pub fn resolve_container(
    world: &World,
    player: UniqueId,
    name: ContainerName,
) -> Result<ContainerRef, TransactionError> {
    let kind = match name {
        ContainerName::Armor => EntityContainerKind::Armor,
        ContainerName::Hotbar | ContainerName::Inventory | ContainerName::HotbarAndInventory => {
            EntityContainerKind::Inventory
        }
        ContainerName::Offhand => EntityContainerKind::Offhand,
        ContainerName::Cursor => EntityContainerKind::Cursor,
        ContainerName::CraftingInput => EntityContainerKind::CraftingInput,
        ContainerName::CraftingOutput => EntityContainerKind::CraftingOutput,
        ContainerName::CreativeOutput => EntityContainerKind::CreativeOutput,
        ContainerName::LevelEntity
        | ContainerName::FurnaceIngredient
        | ContainerName::FurnaceFuel
        | ContainerName::FurnaceResult
        | ContainerName::ShulkerBox
        | ContainerName::Barrel
        | ContainerName::Dynamic => {
            return world
                .opened_container(player)
                .ok_or(TransactionError::NoOpenContainer(name));
        }
    };
    Ok(ContainerRef::Entity {
        owner: player,
        kind,
    })
}

/// Return units taken from `slot` after a vetoed drop.
pub(crate) fn put_back(view: &mut AnchoredContainer<'_>, slot: usize, stack: ItemStack) {
    if view.get_item(slot).is_some() {
        view.increment(slot, stack.amount());
    } else {
        view.set_item(slot, stack);
    }
}

/// Applies the actions of one request on behalf of one player.
pub struct TransactionResolver<'w> {
    world: &'w mut World,
    player: UniqueId,
}

impl<'w> TransactionResolver<'w> {
    /// Resolver acting as `player`.
    pub fn new(world: &'w mut World, player: UniqueId) -> Result<Self, TransactionError> {
        if world.entity(player).and_then(|e| e.player_state()).is_none() {
            return Err(TransactionError::UnknownPlayer(player));
        }
        Ok(Self { world, player })
    }

    /// Resolve and range-check a client slot.
    pub fn resolve(&self, slot: StackSlot) -> Result<ResolvedSlot, TransactionError> {
        let target = resolve_container(self.world, self.player, slot.container)?;
        let container = self
            .world
            .container(target)
            .ok_or(TransactionError::ContainerNotFound(target))?;
        if usize::from(slot.slot) >= container.size() {
            return Err(TransactionError::SlotOutOfRange {
                container: slot.container,
                slot: slot.slot,
                size: container.size(),
            });
        }
        Ok(ResolvedSlot {
            name: slot.container,
            target,
            slot: usize::from(slot.slot),
        })
    }

    /// Apply one action.
    pub fn apply(&mut self, action: &ItemStackAction) -> Result<(), TransactionError> {
        match *action {
            ItemStackAction::Take {
                count,
                source,
                destination,
            }
            | ItemStackAction::Place {
                count,
                source,
                destination,
            } => self.move_units(u32::from(count), source, destination),
            ItemStackAction::Swap {
                source,
                destination,
            } => self.swap(source, destination),
            ItemStackAction::Drop { count, source, .. } => self.drop_units(u32::from(count), source),
            ItemStackAction::Destroy { count, source }
            | ItemStackAction::Consume { count, source } => {
                self.destroy(u32::from(count), source)
            }
            ItemStackAction::CraftCreative { item, destination } => {
                self.craft_creative(item, destination)
            }
        }
    }

    fn stack_at(&self, at: ResolvedSlot) -> Option<&ItemStack> {
        self.world.container(at.target)?.get_item(at.slot)
    }

    /// Source stack holding at least `count` units.
    fn source_stack(&self, at: ResolvedSlot, count: u32) -> Result<&ItemStack, TransactionError> {
        if count == 0 {
            return Err(TransactionError::ZeroCount);
        }
        let slot = at.slot as u8;
        let stack = self
            .stack_at(at)
            .ok_or(TransactionError::EmptySource {
                container: at.name,
                slot,
            })?;
        if count > stack.amount() {
            return Err(TransactionError::CountExceedsQuantity {
                container: at.name,
                slot,
                count,
                available: stack.amount(),
            });
        }
        Ok(stack)
    }

    /// Whether `count` units like `incoming` fit into the destination.
    /// Returns `true` when the destination already holds a stack.
    fn check_destination(
        &self,
        at: ResolvedSlot,
        incoming: &ItemStack,
        count: u32,
    ) -> Result<bool, TransactionError> {
        match self.stack_at(at) {
            Some(existing) => {
                if !existing.equals(incoming) {
                    return Err(TransactionError::IncompatibleMerge {
                        existing: existing.identifier().to_string(),
                        incoming: incoming.identifier().to_string(),
                    });
                }
                let amount = existing.amount() + count;
                if amount > existing.max_stack_size() {
                    return Err(TransactionError::Overflow {
                        amount,
                        max: existing.max_stack_size(),
                    });
                }
                Ok(true)
            }
            None if count > incoming.max_stack_size() => Err(TransactionError::Overflow {
                amount: count,
                max: incoming.max_stack_size(),
            }),
            None => Ok(false),
        }
    }

    fn view_of(&mut self, at: ResolvedSlot) -> Result<AnchoredContainer<'_>, TransactionError> {
        self.world
            .container_view(at.target)
            .ok_or(TransactionError::ContainerNotFound(at.target))
    }

    fn move_units(
        &mut self,
        count: u32,
        source: StackSlot,
        destination: StackSlot,
    ) -> Result<(), TransactionError> {
        let from = self.resolve(source)?;
        let to = self.resolve(destination)?;
        let incoming = self.source_stack(from, count)?;
        if from.target == to.target && from.slot == to.slot {
            return Ok(());
        }
        let merge = self.check_destination(to, incoming, count)?;

        let Some(moved) = self.view_of(from)?.take_item(from.slot, count) else {
            return Err(TransactionError::EmptySource {
                container: from.name,
                slot: from.slot as u8,
            });
        };
        let mut target = self.view_of(to)?;
        if merge {
            target.increment(to.slot, moved.amount());
        } else {
            target.set_item(to.slot, moved);
        }
        debug!(player = %self.player, ?source, ?destination, count, "Moved units");
        Ok(())
    }

    fn swap(&mut self, source: StackSlot, destination: StackSlot) -> Result<(), TransactionError> {
        let from = self.resolve(source)?;
        let to = self.resolve(destination)?;
        if from.target == to.target && from.slot == to.slot {
            return Ok(());
        }

        let first = self.view_of(from)?.take_stack(from.slot);
        let second = self.view_of(to)?.take_stack(to.slot);
        if let Some(first) = first {
            self.view_of(to)?.set_item(to.slot, first);
        }
        if let Some(second) = second {
            self.view_of(from)?.set_item(from.slot, second);
        }
        Ok(())
    }

    fn drop_units(&mut self, count: u32, source: StackSlot) -> Result<(), TransactionError> {
        let from = self.resolve(source)?;
        self.source_stack(from, count)?;

        let Some(taken) = self.view_of(from)?.take_item(from.slot, count) else {
            return Ok(());
        };
        match self.world.drop_from_player(self.player, taken) {
            Ok(_) => Ok(()),
            Err(returned) => {
                put_back(&mut self.view_of(from)?, from.slot, returned);
                Err(TransactionError::DropCancelled)
            }
        }
    }

    fn destroy(&mut self, count: u32, source: StackSlot) -> Result<(), TransactionError> {
        let from = self.resolve(source)?;
        self.source_stack(from, count)?;
        self.view_of(from)?.remove_item(from.slot, count);
        Ok(())
    }

    fn craft_creative(
        &mut self,
        item: NetworkItemStackDescriptor,
        destination: StackSlot,
    ) -> Result<(), TransactionError> {
        let game_mode = self
            .world
            .entity(self.player)
            .and_then(|e| e.player_state())
            .map(|state| state.game_mode);
        if game_mode != Some(GameMode::Creative) {
            return Err(TransactionError::NotCreative);
        }

        let created = item
            .to_stack(self.world.registry())
            .ok()
            .flatten()
            .ok_or(TransactionError::UnknownItem(item.network_id))?;
        let to = self.resolve(destination)?;
        let merge = self.check_destination(to, &created, created.amount())?;

        let mut view = self.view_of(to)?;
        if merge {
            view.increment(to.slot, created.amount());
        } else {
            view.set_item(to.slot, created);
        }
        Ok(())
    }
}
