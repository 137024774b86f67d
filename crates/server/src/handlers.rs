//! Handlers for inbound container traffic.

use crate::resolver::{put_back, resolve_container, TransactionError, TransactionResolver};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use voxelhost_core::{ContainerId, ContainerName, ContainerRef, ContainerType, EntityContainerKind, UniqueId};
use voxelhost_net::{
    InventorySourceType, InventoryTransaction, ItemStackAction, ItemStackRequest,
    ItemStackResponse, NetworkItemStackDescriptor, ResponseContainerInfo, ResponseSlotInfo,
    ResponseStatus, ServerPacket,
};
use voxelhost_world::{Viewer, World};

fn viewer_of(world: &World, player: UniqueId) -> Result<Viewer, TransactionError> {
    world
        .entity(player)
        .and_then(|e| e.player_state())
        .map(|state| state.viewer.clone())
        .ok_or(TransactionError::UnknownPlayer(player))
}

/// Apply every request in order and answer with one response per request.
///
/// A request stops at its first failing action; its response is `Error`
/// and every container it named is re-sent to the player. Later requests
/// still run.
pub fn handle_item_stack_request(
    world: &mut World,
    player: UniqueId,
    requests: &[ItemStackRequest],
) -> Result<Vec<ItemStackResponse>, TransactionError> {
    let viewer = viewer_of(world, player)?;
    let mut responses = Vec::with_capacity(requests.len());

    for request in requests {
        let outcome = TransactionResolver::new(world, player).and_then(|mut resolver| {
            request
                .actions
                .iter()
                .try_for_each(|action| resolver.apply(action))
        });
        let response = match outcome {
            Ok(()) => ItemStackResponse {
                status: ResponseStatus::Ok,
                client_request_id: request.client_request_id,
                containers: touched_slots(world, player, &request.actions),
            },
            Err(error) => {
                warn!(
                    %player,
                    client_request_id = request.client_request_id,
                    %error,
                    "Rejected item stack request; resyncing"
                );
                resync(world, player, &viewer, &request.actions);
                ItemStackResponse {
                    status: ResponseStatus::Error,
                    client_request_id: request.client_request_id,
                    containers: Vec::new(),
                }
            }
        };
        responses.push(response);
    }

    viewer.send(ServerPacket::ItemStackResponse {
        responses: responses.clone(),
    });
    Ok(responses)
}

/// Final contents of every (name, slot) the actions touched.
fn touched_slots(
    world: &World,
    player: UniqueId,
    actions: &[ItemStackAction],
) -> Vec<ResponseContainerInfo> {
    let mut touched: BTreeMap<ContainerName, BTreeSet<u8>> = BTreeMap::new();
    for slot in actions.iter().flat_map(ItemStackAction::slots) {
        touched.entry(slot.container).or_default().insert(slot.slot);
    }

    touched
        .into_iter()
        .filter_map(|(name, slots)| {
            let target = resolve_container(world, player, name).ok()?;
            let container = world.container(target)?;
            let slots = slots
                .into_iter()
                .map(|slot| {
                    let stack = container.get_item(usize::from(slot));
                    let descriptor = NetworkItemStackDescriptor::from_stack(stack);
                    ResponseSlotInfo {
                        slot,
                        amount: stack.map_or(0, |s| s.amount()),
                        network_id: descriptor.network_id,
                    }
                })
                .collect();
            Some(ResponseContainerInfo {
                container: name,
                slots,
            })
        })
        .collect()
}

/// Re-send the canonical contents of every container the actions named.
fn resync(world: &World, player: UniqueId, viewer: &Viewer, actions: &[ItemStackAction]) {
    let targets: BTreeSet<ContainerRef> = actions
        .iter()
        .flat_map(ItemStackAction::slots)
        .filter_map(|slot| resolve_container(world, player, slot.container).ok())
        .collect();
    for target in targets {
        if let Some(container) = world.container(target) {
            container.update(Some(viewer));
        }
    }
}

/// Handle a legacy inventory transaction: dropping the held stack, or
/// interacting with a block that has a container.
pub fn handle_inventory_transaction(
    world: &mut World,
    player: UniqueId,
    transaction: &InventoryTransaction,
) -> Result<(), TransactionError> {
    match transaction {
        InventoryTransaction::Normal { actions } => {
            let Some(drop) = actions
                .iter()
                .find(|a| a.source.kind == InventorySourceType::WorldInteraction)
            else {
                debug!(%player, actions = actions.len(), "Ignoring normal transaction");
                return Ok(());
            };
            drop_selected(world, player, u32::from(drop.new_item.amount))
        }
        InventoryTransaction::ItemUseOnBlock {
            position, sneaking, ..
        } => {
            if *sneaking {
                return Ok(());
            }
            let dimension = world
                .entity(player)
                .ok_or(TransactionError::UnknownPlayer(player))?
                .dimension();
            let has_container = world
                .block(dimension, *position)
                .is_some_and(|block| block.container().is_some());
            if has_container {
                world.open_container(
                    player,
                    ContainerRef::Block {
                        dimension,
                        position: *position,
                    },
                );
            }
            Ok(())
        }
    }
}

/// Drop `amount` units of the selected hotbar stack; 0 drops all of it.
fn drop_selected(world: &mut World, player: UniqueId, amount: u32) -> Result<(), TransactionError> {
    let selected = world
        .entity(player)
        .and_then(|e| e.player_state())
        .map(|state| state.selected_slot)
        .ok_or(TransactionError::UnknownPlayer(player))?;
    let inventory = ContainerRef::Entity {
        owner: player,
        kind: EntityContainerKind::Inventory,
    };

    let mut view = world
        .container_view(inventory)
        .ok_or(TransactionError::ContainerNotFound(inventory))?;
    let held = view.get_item(selected).map_or(0, |s| s.amount());
    let amount = if amount == 0 { held } else { amount };
    let Some(taken) = view.take_item(selected, amount) else {
        return Err(TransactionError::EmptySource {
            container: ContainerName::Hotbar,
            slot: selected as u8,
        });
    };

    match world.drop_from_player(player, taken) {
        Ok(_) => Ok(()),
        Err(returned) => {
            if let Some(mut view) = world.container_view(inventory) {
                put_back(&mut view, selected, returned);
            }
            Err(TransactionError::DropCancelled)
        }
    }
}

/// Handle a client closing a container.
///
/// Closing the container the player has open closes it; anything else is
/// answered with a server-initiated close so the client UI cannot stay open
/// on a container the server does not track.
pub fn handle_container_close(
    world: &mut World,
    player: UniqueId,
    container_id: ContainerId,
) -> Result<(), TransactionError> {
    let viewer = viewer_of(world, player)?;
    let open_id = world
        .opened_container(player)
        .and_then(|target| world.container(target))
        .and_then(|container| container.occupant_id(player));

    if open_id == Some(container_id) {
        world.close_container(player, false);
        return Ok(());
    }

    if container_id == ContainerId::INVENTORY {
        debug!(%player, "Player closed own inventory");
    } else {
        warn!(%player, %container_id, ?open_id, "Close for a container that is not open");
    }
    viewer.send(ServerPacket::ContainerClose {
        container_id,
        container_type: ContainerType::None,
        server_initiated: true,
    });
    Ok(())
}
