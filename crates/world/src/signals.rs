//! Cancellable world signals.
//!
//! Listeners return `true` to allow the action and `false` to cancel it.
//! Every listener runs; the action proceeds only if none of them cancelled.

use crate::anchor::AnchorInfo;
use std::fmt;
use voxelhost_core::{ContainerRef, ItemStack, UniqueId};

/// A player is about to open a container.
#[derive(Debug, Clone)]
pub struct PlayerOpenedContainer {
    /// The player.
    pub player: UniqueId,
    /// Container being opened.
    pub target: ContainerRef,
    /// The anchor that owns it.
    pub anchor: AnchorInfo,
}

/// A player is about to drop an item onto the ground.
#[derive(Debug)]
pub struct PlayerDropItem<'a> {
    /// The player.
    pub player: UniqueId,
    /// Stack that would be dropped.
    pub item: &'a ItemStack,
}

type Listener<E> = Box<dyn Fn(&E) -> bool>;

/// Registered signal listeners.
#[derive(Default)]
pub struct Signals {
    opened_container: Vec<Listener<PlayerOpenedContainer>>,
    drop_item: Vec<Box<dyn Fn(&PlayerDropItem<'_>) -> bool>>,
}

impl Signals {
    /// No listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for players opening containers.
    pub fn on_player_opened_container(
        &mut self,
        listener: impl Fn(&PlayerOpenedContainer) -> bool + 'static,
    ) {
        self.opened_container.push(Box::new(listener));
    }

    /// Listen for players dropping items.
    pub fn on_player_drop_item(&mut self, listener: impl Fn(&PlayerDropItem<'_>) -> bool + 'static) {
        self.drop_item.push(Box::new(listener));
    }

    /// Returns `false` if any listener cancelled the open.
    pub fn emit_player_opened_container(&self, event: &PlayerOpenedContainer) -> bool {
        self.opened_container
            .iter()
            .fold(true, |allowed, listener| listener(event) && allowed)
    }

    /// Returns `false` if any listener cancelled the drop.
    pub fn emit_player_drop_item(&self, event: &PlayerDropItem<'_>) -> bool {
        self.drop_item
            .iter()
            .fold(true, |allowed, listener| listener(event) && allowed)
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals")
            .field("opened_container", &self.opened_container.len())
            .field("drop_item", &self.drop_item.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorLocation;
    use std::cell::Cell;
    use std::rc::Rc;
    use voxelhost_core::{BlockPosition, DimensionId, RegistryKey};

    fn event() -> PlayerOpenedContainer {
        let position = BlockPosition::new(0, 64, 0);
        PlayerOpenedContainer {
            player: UniqueId(1),
            target: ContainerRef::Block {
                dimension: DimensionId::Overworld,
                position,
            },
            anchor: AnchorInfo {
                identifier: RegistryKey::parse("chest").unwrap(),
                dimension: DimensionId::Overworld,
                location: AnchorLocation::Block(position),
            },
        }
    }

    #[test]
    fn no_listeners_allows() {
        assert!(Signals::new().emit_player_opened_container(&event()));
    }

    #[test]
    fn one_veto_cancels_but_every_listener_runs() {
        let calls = Rc::new(Cell::new(0));
        let mut signals = Signals::new();
        let c = calls.clone();
        signals.on_player_opened_container(move |_| {
            c.set(c.get() + 1);
            false
        });
        let c = calls.clone();
        signals.on_player_opened_container(move |_| {
            c.set(c.get() + 1);
            true
        });

        assert!(!signals.emit_player_opened_container(&event()));
        assert_eq!(calls.get(), 2);
    }
}
