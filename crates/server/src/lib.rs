#![warn(missing_docs)]
//! Authoritative container host: owns the world, admits players and routes
//! their container packets.

pub mod handlers;
pub mod resolver;

use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use voxelhost_core::{DimensionId, RegistryKey, RegistryKeyError, SimTick, UniqueId};
use voxelhost_net::{
    decode_client_packet, ClientPacket, ProtocolError, ResponseStatus, ServerPacket,
};
use voxelhost_world::{Entity, GameMode, Viewer, World};

pub use handlers::{handle_container_close, handle_inventory_transaction, handle_item_stack_request};
pub use resolver::{resolve_container, ResolvedSlot, TransactionError, TransactionResolver};

/// Identifier of player entities.
pub const PLAYER_IDENTIFIER: &str = "minecraft:player";

/// Tunables applied to joining players and inbound packets.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Outbound packet queue capacity per player.
    pub outbound_capacity: usize,
    /// Main inventory size of joining players.
    pub inventory_size: usize,
    /// Actions allowed in a single item stack request.
    pub max_request_actions: usize,
    /// Game mode of joining players.
    pub game_mode: GameMode,
    /// Where joining players appear.
    pub spawn_dimension: DimensionId,
    /// Spawn position, entity coordinates.
    pub spawn_position: [f32; 3],
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            inventory_size: 36,
            max_request_actions: voxelhost_net::MAX_REQUEST_ACTIONS,
            game_mode: GameMode::Survival,
            spawn_dimension: DimensionId::Overworld,
            spawn_position: [0.5, 65.0, 0.5],
        }
    }
}

/// Failures surfaced to the connection layer.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The packet broke a protocol limit and was not applied.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    /// The packet was understood but could not be applied.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// The packet came from a player that is not connected.
    #[error("player {0} is not connected")]
    NotConnected(UniqueId),
    /// A player identifier failed to parse.
    #[error(transparent)]
    Identifier(#[from] RegistryKeyError),
}

/// Per-connection bookkeeping.
#[derive(Debug)]
struct ConnectedPlayer {
    joined_at: SimTick,
    packets: u64,
}

/// Authoritative server state.
pub struct Server {
    world: World,
    settings: ServerSettings,
    players: BTreeMap<UniqueId, ConnectedPlayer>,
}

impl Server {
    /// Host `world` with `settings`.
    pub fn new(world: World, settings: ServerSettings) -> Self {
        Self {
            world,
            settings,
            players: BTreeMap::new(),
        }
    }

    /// Shared world state.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world state, for setup and administration.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Active settings.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Ids of connected players.
    pub fn players(&self) -> impl Iterator<Item = UniqueId> + '_ {
        self.players.keys().copied()
    }

    /// Admit a player. Returns its id and the receiving end of its
    /// outbound queue.
    pub fn join(&mut self) -> Result<(UniqueId, Receiver<ServerPacket>), ServerError> {
        let identifier = RegistryKey::parse(PLAYER_IDENTIFIER)?;
        let id = self.world.allocate_unique_id();
        let (viewer, rx) = Viewer::channel(id, self.settings.outbound_capacity);
        let entity = Entity::player(
            identifier,
            viewer,
            self.settings.spawn_dimension,
            self.settings.spawn_position,
            self.settings.game_mode,
        )
        .with_inventory_size(self.settings.inventory_size);
        self.world.add_entity(entity);
        self.players.insert(
            id,
            ConnectedPlayer {
                joined_at: self.world.tick_count(),
                packets: 0,
            },
        );
        info!(player = %id, "Player joined");
        Ok((id, rx))
    }

    /// Remove a player, closing whatever it had open.
    pub fn leave(&mut self, player: UniqueId) -> bool {
        let Some(connection) = self.players.remove(&player) else {
            return false;
        };
        self.world.remove_entity(player);
        info!(
            %player,
            joined_at = connection.joined_at.0,
            packets = connection.packets,
            "Player left"
        );
        true
    }

    /// Decode and handle one framed client packet.
    pub fn handle_frame(&mut self, player: UniqueId, frame: &[u8]) -> anyhow::Result<()> {
        let packet = decode_client_packet(frame)?;
        self.handle_packet(player, packet)?;
        Ok(())
    }

    /// Verify and apply one client packet.
    #[instrument(skip(self, packet), fields(player = %player))]
    pub fn handle_packet(&mut self, player: UniqueId, packet: ClientPacket) -> Result<(), ServerError> {
        let connection = self
            .players
            .get_mut(&player)
            .ok_or(ServerError::NotConnected(player))?;
        connection.packets += 1;

        if let Err(error) = packet.verify() {
            warn!(%error, "Rejected packet");
            return Err(error.into());
        }

        match packet {
            ClientPacket::ItemStackRequest { requests } => {
                let max = self.settings.max_request_actions;
                if let Some(request) = requests.iter().find(|r| r.actions.len() > max) {
                    let error = ProtocolError::TooManyActions {
                        count: request.actions.len(),
                        max,
                    };
                    warn!(%error, "Rejected packet");
                    return Err(error.into());
                }
                let responses = handle_item_stack_request(&mut self.world, player, &requests)?;
                debug!(
                    requests = responses.len(),
                    rejected = responses
                        .iter()
                        .filter(|r| r.status == ResponseStatus::Error)
                        .count(),
                    "Handled item stack requests"
                );
            }
            ClientPacket::InventoryTransaction { transaction } => {
                handle_inventory_transaction(&mut self.world, player, &transaction)?;
            }
            ClientPacket::ContainerClose { container_id, .. } => {
                handle_container_close(&mut self.world, player, container_id)?;
            }
        }
        Ok(())
    }

    /// Advance the simulation by one tick.
    #[instrument(skip(self), fields(tick = self.world.tick_count().0, players = self.players.len()))]
    pub fn tick(&mut self) {
        self.world.tick();
    }
}
