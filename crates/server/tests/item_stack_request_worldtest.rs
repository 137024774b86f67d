//! Worldtest: Item Stack Requests
//!
//! Validates:
//! - Moves between named slot groups answer with the touched slots
//! - Rejected requests change nothing and resync the requester
//! - Requests in a batch are independent
//! - Creative gating, drops and container close handling

use voxelhost_core::{
    BlockPosition, ContainerId, ContainerName, ContainerRef, EntityContainerKind, ItemRegistry,
    UniqueId,
};
use voxelhost_net::{
    InventoryAction, InventorySource, InventorySourceType, InventoryTransaction, ItemStackAction,
    ItemStackRequest, ItemStackResponse, NetworkItemStackDescriptor, ResponseContainerInfo,
    ResponseSlotInfo, ResponseStatus, ServerPacket, StackSlot,
};
use voxelhost_server::{
    handle_container_close, handle_inventory_transaction, handle_item_stack_request,
    TransactionError,
};
use voxelhost_testkit::{block_ref, chest, player, player_with_mode, stack, RecordingViewer};
use voxelhost_world::{GameMode, World};

const CHEST_AT: BlockPosition = BlockPosition::new(3, 64, -2);

fn setup() -> (World, RecordingViewer) {
    let alice = RecordingViewer::new(1);
    let mut world = World::new(5, ItemRegistry::vanilla());
    world.add_block(chest(CHEST_AT));
    world.add_entity(player(&alice));
    (world, alice)
}

fn owned(owner: UniqueId, kind: EntityContainerKind) -> ContainerRef {
    ContainerRef::Entity { owner, kind }
}

fn slot(container: ContainerName, slot: u8) -> StackSlot {
    StackSlot::new(container, slot)
}

fn request(client_request_id: i32, actions: Vec<ItemStackAction>) -> ItemStackRequest {
    ItemStackRequest {
        client_request_id,
        actions,
    }
}

fn amount_at(world: &World, target: ContainerRef, index: usize) -> Option<u32> {
    world
        .container(target)
        .and_then(|c| c.get_item(index))
        .map(|s| s.amount())
}

fn resynced(packets: &[ServerPacket], container_id: ContainerId) -> bool {
    packets.iter().any(|p| {
        matches!(p, ServerPacket::InventoryContent { container_id: id, .. } if *id == container_id)
    })
}

#[test]
fn armor_to_cursor_take_moves_the_helmet() {
    let (mut world, alice) = setup();
    let armor = owned(alice.id(), EntityContainerKind::Armor);
    let cursor = owned(alice.id(), EntityContainerKind::Cursor);
    world
        .container_view(armor)
        .expect("armor")
        .set_item(0, stack("iron_helmet", 1));
    alice.drain();

    let responses = handle_item_stack_request(
        &mut world,
        alice.id(),
        &[request(
            -1,
            vec![ItemStackAction::Take {
                count: 1,
                source: slot(ContainerName::Armor, 0),
                destination: slot(ContainerName::Cursor, 0),
            }],
        )],
    )
    .expect("known player");

    assert_eq!(
        responses,
        vec![ItemStackResponse {
            status: ResponseStatus::Ok,
            client_request_id: -1,
            containers: vec![
                ResponseContainerInfo {
                    container: ContainerName::Armor,
                    slots: vec![ResponseSlotInfo {
                        slot: 0,
                        amount: 0,
                        network_id: 0,
                    }],
                },
                ResponseContainerInfo {
                    container: ContainerName::Cursor,
                    slots: vec![ResponseSlotInfo {
                        slot: 0,
                        amount: 1,
                        network_id: 306,
                    }],
                },
            ],
        }]
    );
    assert_eq!(amount_at(&world, armor, 0), None);
    assert_eq!(
        world
            .container(cursor)
            .and_then(|c| c.get_item(0))
            .map(|s| s.identifier().to_string()),
        Some("minecraft:iron_helmet".to_string())
    );
    assert!(alice
        .drain()
        .iter()
        .any(|p| matches!(p, ServerPacket::ItemStackResponse { .. })));
}

#[test]
fn count_exceeding_quantity_is_rejected_and_resynced() {
    let (mut world, alice) = setup();
    let inventory = owned(alice.id(), EntityContainerKind::Inventory);
    world
        .container_view(inventory)
        .expect("inventory")
        .set_item(0, stack("dirt", 5));
    alice.drain();

    let responses = handle_item_stack_request(
        &mut world,
        alice.id(),
        &[request(
            2,
            vec![ItemStackAction::Take {
                count: 10,
                source: slot(ContainerName::Hotbar, 0),
                destination: slot(ContainerName::Inventory, 9),
            }],
        )],
    )
    .expect("known player");

    assert_eq!(responses[0].status, ResponseStatus::Error);
    assert!(responses[0].containers.is_empty());
    assert_eq!(amount_at(&world, inventory, 0), Some(5));
    assert_eq!(amount_at(&world, inventory, 9), None);
    assert!(resynced(&alice.drain(), ContainerId::INVENTORY));
}

#[test]
fn incompatible_and_overflowing_merges_change_nothing() {
    let (mut world, alice) = setup();
    let inventory = owned(alice.id(), EntityContainerKind::Inventory);
    let mut view = world.container_view(inventory).expect("inventory");
    view.set_item(0, stack("dirt", 60));
    view.set_item(1, stack("stone", 5));
    view.set_item(2, stack("dirt", 10));

    let responses = handle_item_stack_request(
        &mut world,
        alice.id(),
        &[
            request(
                1,
                vec![ItemStackAction::Place {
                    count: 5,
                    source: slot(ContainerName::Hotbar, 0),
                    destination: slot(ContainerName::Hotbar, 1),
                }],
            ),
            request(
                2,
                vec![ItemStackAction::Place {
                    count: 10,
                    source: slot(ContainerName::Hotbar, 2),
                    destination: slot(ContainerName::Hotbar, 0),
                }],
            ),
        ],
    )
    .expect("known player");

    assert!(responses.iter().all(|r| r.status == ResponseStatus::Error));
    assert_eq!(amount_at(&world, inventory, 0), Some(60));
    assert_eq!(amount_at(&world, inventory, 1), Some(5));
    assert_eq!(amount_at(&world, inventory, 2), Some(10));
}

#[test]
fn batch_continues_after_a_failed_request() {
    let (mut world, alice) = setup();
    let inventory = owned(alice.id(), EntityContainerKind::Inventory);
    world
        .container_view(inventory)
        .expect("inventory")
        .set_item(0, stack("cobblestone", 20));

    let responses = handle_item_stack_request(
        &mut world,
        alice.id(),
        &[
            request(
                1,
                vec![ItemStackAction::Place {
                    count: 5,
                    source: slot(ContainerName::Hotbar, 0),
                    destination: slot(ContainerName::Hotbar, 1),
                }],
            ),
            request(
                2,
                vec![
                    ItemStackAction::Place {
                        count: 5,
                        source: slot(ContainerName::Hotbar, 0),
                        destination: slot(ContainerName::Hotbar, 2),
                    },
                    ItemStackAction::Destroy {
                        count: 1,
                        source: slot(ContainerName::Hotbar, 8),
                    },
                ],
            ),
            request(
                3,
                vec![ItemStackAction::Swap {
                    source: slot(ContainerName::Hotbar, 0),
                    destination: slot(ContainerName::Inventory, 30),
                }],
            ),
        ],
    )
    .expect("known player");

    let statuses: Vec<_> = responses.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ResponseStatus::Ok, ResponseStatus::Error, ResponseStatus::Ok]
    );
    // The failing request already applied its first action.
    assert_eq!(amount_at(&world, inventory, 1), Some(5));
    assert_eq!(amount_at(&world, inventory, 2), Some(5));
    assert_eq!(amount_at(&world, inventory, 0), None);
    assert_eq!(amount_at(&world, inventory, 30), Some(10));
}

#[test]
fn open_container_names_need_an_open_container() {
    let (mut world, alice) = setup();
    world
        .container_view(block_ref(CHEST_AT))
        .expect("chest")
        .set_item(4, stack("diamond", 3));
    let take = ItemStackAction::Take {
        count: 3,
        source: slot(ContainerName::LevelEntity, 4),
        destination: slot(ContainerName::Hotbar, 0),
    };

    let refused = handle_item_stack_request(&mut world, alice.id(), &[request(1, vec![take.clone()])])
        .expect("known player");
    assert_eq!(refused[0].status, ResponseStatus::Error);

    world
        .open_container(alice.id(), block_ref(CHEST_AT))
        .expect("open");
    let accepted = handle_item_stack_request(&mut world, alice.id(), &[request(2, vec![take])])
        .expect("known player");
    assert_eq!(accepted[0].status, ResponseStatus::Ok);
    assert_eq!(amount_at(&world, block_ref(CHEST_AT), 4), None);
    assert_eq!(
        amount_at(&world, owned(alice.id(), EntityContainerKind::Inventory), 0),
        Some(3)
    );
}

#[test]
fn creative_palette_requires_creative_mode() {
    let (mut world, alice) = setup();
    let builder = RecordingViewer::new(2);
    world.add_entity(player_with_mode(&builder, GameMode::Creative));
    let craft = ItemStackAction::CraftCreative {
        item: NetworkItemStackDescriptor::new(3, 5, 0),
        destination: slot(ContainerName::Hotbar, 0),
    };

    let refused = handle_item_stack_request(&mut world, alice.id(), &[request(1, vec![craft.clone()])])
        .expect("known player");
    assert_eq!(refused[0].status, ResponseStatus::Error);
    assert_eq!(
        amount_at(&world, owned(alice.id(), EntityContainerKind::Inventory), 0),
        None
    );

    let accepted = handle_item_stack_request(&mut world, builder.id(), &[request(1, vec![craft])])
        .expect("known player");
    assert_eq!(accepted[0].status, ResponseStatus::Ok);
    assert_eq!(
        amount_at(&world, owned(builder.id(), EntityContainerKind::Inventory), 0),
        Some(5)
    );
}

#[test]
fn unknown_player_is_an_error() {
    let (mut world, _alice) = setup();
    let result = handle_item_stack_request(&mut world, UniqueId(77), &[]);
    assert_eq!(result, Err(TransactionError::UnknownPlayer(UniqueId(77))));
}

fn drop_transaction(amount: u16) -> InventoryTransaction {
    InventoryTransaction::Normal {
        actions: vec![
            InventoryAction {
                source: InventorySource {
                    kind: InventorySourceType::Container,
                    container_id: ContainerId::INVENTORY,
                },
                slot: 0,
                old_item: NetworkItemStackDescriptor::new(3, 10, 0),
                new_item: NetworkItemStackDescriptor::new(3, 10 - amount, 0),
            },
            InventoryAction {
                source: InventorySource {
                    kind: InventorySourceType::WorldInteraction,
                    container_id: ContainerId::NONE,
                },
                slot: 0,
                old_item: NetworkItemStackDescriptor::air(),
                new_item: NetworkItemStackDescriptor::new(3, amount, 0),
            },
        ],
    }
}

#[test]
fn world_interaction_drops_from_the_selected_slot() {
    let (mut world, alice) = setup();
    let inventory = owned(alice.id(), EntityContainerKind::Inventory);
    world
        .container_view(inventory)
        .expect("inventory")
        .set_item(0, stack("dirt", 10));

    handle_inventory_transaction(&mut world, alice.id(), &drop_transaction(4)).expect("dropped");
    assert_eq!(amount_at(&world, inventory, 0), Some(6));
    assert_eq!(world.items().count(), 1);
    assert!(alice
        .drain()
        .iter()
        .any(|p| matches!(p, ServerPacket::AddItemActor { .. })));
}

#[test]
fn vetoed_drop_action_leaves_the_slot_intact() {
    let (mut world, alice) = setup();
    let inventory = owned(alice.id(), EntityContainerKind::Inventory);
    world
        .container_view(inventory)
        .expect("inventory")
        .set_item(0, stack("apple", 10));
    world.signals_mut().on_player_drop_item(|_| false);

    let responses = handle_item_stack_request(
        &mut world,
        alice.id(),
        &[request(
            9,
            vec![ItemStackAction::Drop {
                count: 4,
                source: slot(ContainerName::Hotbar, 0),
                randomly: false,
            }],
        )],
    )
    .expect("known player");
    assert_eq!(responses[0].status, ResponseStatus::Error);
    assert_eq!(amount_at(&world, inventory, 0), Some(10));
    assert_eq!(world.items().count(), 0);

    let result = handle_inventory_transaction(&mut world, alice.id(), &drop_transaction(0));
    assert_eq!(result, Err(TransactionError::DropCancelled));
    assert_eq!(amount_at(&world, inventory, 0), Some(10));
}

#[test]
fn using_a_container_block_opens_it_unless_sneaking() {
    let (mut world, alice) = setup();
    let sneaking = InventoryTransaction::ItemUseOnBlock {
        position: CHEST_AT,
        face: 1,
        sneaking: true,
    };
    handle_inventory_transaction(&mut world, alice.id(), &sneaking).expect("handled");
    assert_eq!(world.opened_container(alice.id()), None);

    let using = InventoryTransaction::ItemUseOnBlock {
        position: CHEST_AT,
        face: 1,
        sneaking: false,
    };
    handle_inventory_transaction(&mut world, alice.id(), &using).expect("handled");
    assert_eq!(world.opened_container(alice.id()), Some(block_ref(CHEST_AT)));
    assert!(alice
        .drain()
        .iter()
        .any(|p| matches!(p, ServerPacket::ContainerOpen { .. })));
}

#[test]
fn closing_the_open_container_releases_the_viewer() {
    let (mut world, alice) = setup();
    let id = world
        .open_container(alice.id(), block_ref(CHEST_AT))
        .expect("open");
    alice.drain();

    handle_container_close(&mut world, alice.id(), id).expect("closed");
    assert_eq!(world.opened_container(alice.id()), None);
    assert_eq!(
        world
            .container(block_ref(CHEST_AT))
            .map(|c| c.occupant_count()),
        Some(0)
    );
    assert!(alice.drain().iter().any(|p| matches!(
        p,
        ServerPacket::ContainerClose {
            server_initiated: false,
            ..
        }
    )));
}

#[test]
fn closing_an_unknown_container_is_answered_by_the_server() {
    let (mut world, alice) = setup();
    handle_container_close(&mut world, alice.id(), ContainerId(42)).expect("answered");
    assert_eq!(
        alice.drain(),
        vec![ServerPacket::ContainerClose {
            container_id: ContainerId(42),
            container_type: voxelhost_core::ContainerType::None,
            server_initiated: true,
        }]
    );
}
