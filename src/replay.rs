use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fs, path::Path, sync::mpsc::Receiver};
use tracing::{debug, info, warn};
use voxelhost_core::{
    BlockPosition, ContainerRef, ContainerType, DimensionId, EntityContainerKind, ItemStack,
    RegistryKey, SimTick, UniqueId,
};
use voxelhost_net::{ClientPacket, ServerPacket};
use voxelhost_server::Server;
use voxelhost_world::{Block, InventoryPersistence};

#[derive(Debug, Deserialize)]
struct ReplayFile {
    #[serde(default = "default_players")]
    players: usize,
    #[serde(default)]
    blocks: Vec<BlockDef>,
    steps: Vec<ReplayStep>,
}

fn default_players() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct BlockDef {
    identifier: String,
    position: [i32; 3],
    size: usize,
    /// Keep contents in the block's properties across reloads.
    #[serde(default)]
    persistent: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ReplayStep {
    tick: u64,
    #[serde(flatten)]
    action: StepAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StepAction {
    /// Deliver a client packet from `player`.
    Packet { player: usize, packet: ClientPacket },
    /// Put items straight into a player's inventory.
    Give {
        player: usize,
        item: String,
        amount: u32,
    },
    /// Change the selected hotbar slot.
    Select { player: usize, slot: usize },
    /// Break a block, scattering its contents.
    Break { position: [i32; 3] },
}

impl StepAction {
    fn player(&self) -> Option<usize> {
        match self {
            StepAction::Packet { player, .. }
            | StepAction::Give { player, .. }
            | StepAction::Select { player, .. } => Some(*player),
            StepAction::Break { .. } => None,
        }
    }
}

/// Deterministic packet script.
///
/// A script names how many players join, which container blocks exist, and
/// a list of `{tick, kind, ...}` steps executed in file order.
#[derive(Debug)]
pub struct ReplayScript {
    players: usize,
    blocks: Vec<BlockDef>,
    pending: VecDeque<ReplayStep>,
}

impl ReplayScript {
    /// Load a script from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_str(&contents)
    }

    /// Load a script from an in-memory JSON string.
    pub fn from_str(contents: &str) -> Result<Self> {
        let file: ReplayFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            bail!("replay script contains no steps");
        }

        let mut last_tick: Option<u64> = None;
        for step in &file.steps {
            if last_tick.is_some_and(|prev| step.tick < prev) {
                bail!("replay script steps must be sorted by tick");
            }
            last_tick = Some(step.tick);
            if let Some(player) = step.action.player() {
                if player >= file.players {
                    bail!(
                        "step at tick {} names player {player} but only {} join",
                        step.tick,
                        file.players
                    );
                }
            }
        }

        Ok(Self {
            players: file.players,
            blocks: file.blocks,
            pending: file.steps.into(),
        })
    }

    fn drain_ready(&mut self, tick: SimTick) -> Vec<StepAction> {
        let mut ready = Vec::new();
        while self.pending.front().is_some_and(|step| step.tick <= tick.0) {
            if let Some(step) = self.pending.pop_front() {
                ready.push(step.action);
            }
        }
        ready
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Outcome of a replay, printed by the binary.
#[derive(Debug, Default, Serialize)]
pub struct ReplayReport {
    pub ticks: u64,
    pub simulated_seconds: f64,
    pub packets_applied: usize,
    pub packets_rejected: usize,
    /// Outbound packets per player, in join order.
    pub outbound: Vec<usize>,
    pub dropped_items: usize,
}

struct Connection {
    id: UniqueId,
    rx: Receiver<ServerPacket>,
    received: usize,
}

fn block_position([x, y, z]: [i32; 3]) -> BlockPosition {
    BlockPosition::new(x, y, z)
}

/// Run `script` against `server`, then keep ticking for `settle_ticks`.
pub fn run(
    server: &mut Server,
    mut script: ReplayScript,
    settle_ticks: u64,
    tick_rate: u32,
) -> Result<ReplayReport> {
    let mut connections = Vec::with_capacity(script.players);
    for _ in 0..script.players {
        let (id, rx) = server.join()?;
        connections.push(Connection {
            id,
            rx,
            received: 0,
        });
    }

    for def in &script.blocks {
        let identifier = RegistryKey::parse(&def.identifier)
            .with_context(|| format!("invalid block identifier {:?}", def.identifier))?;
        let mut block = Block::new(identifier, DimensionId::Overworld, block_position(def.position))
            .with_container(ContainerType::Container, def.size);
        if def.persistent {
            block
                .attach_trait(Box::new(InventoryPersistence::block()), server.world().registry())
                .with_context(|| format!("failed to attach persistence to {}", block.info()))?;
        }
        server.world_mut().add_block(block);
    }

    let mut report = ReplayReport::default();
    let mut settled = 0;
    while !script.is_finished() || settled < settle_ticks {
        if script.is_finished() {
            settled += 1;
        }
        let tick = server.world().tick_count();
        for action in script.drain_ready(tick) {
            execute(server, &connections, action, &mut report)?;
        }
        server.tick();
        for connection in &mut connections {
            connection.received += connection.rx.try_iter().count();
        }
    }

    report.ticks = server.world().tick_count().0;
    report.simulated_seconds = report.ticks as f64 / f64::from(tick_rate.max(1));
    report.outbound = connections.iter().map(|c| c.received).collect();
    report.dropped_items = server.world().items().count();
    info!(
        ticks = report.ticks,
        applied = report.packets_applied,
        rejected = report.packets_rejected,
        "Replay finished"
    );
    Ok(report)
}

fn execute(
    server: &mut Server,
    connections: &[Connection],
    action: StepAction,
    report: &mut ReplayReport,
) -> Result<()> {
    let player_id = |index: usize| connections[index].id;
    match action {
        StepAction::Packet { player, packet } => {
            match server.handle_packet(player_id(player), packet) {
                Ok(()) => report.packets_applied += 1,
                Err(err) => {
                    warn!(player, "Packet rejected: {err}");
                    report.packets_rejected += 1;
                }
            }
        }
        StepAction::Give {
            player,
            item,
            amount,
        } => {
            let item_type = server
                .world()
                .registry()
                .get(&item)
                .with_context(|| format!("cannot give {item}"))?
                .clone();
            let mut stack = ItemStack::new(item_type, amount);
            let inventory = ContainerRef::Entity {
                owner: player_id(player),
                kind: EntityContainerKind::Inventory,
            };
            let mut view = server
                .world_mut()
                .container_view(inventory)
                .context("player inventory missing")?;
            if !view.add_item(&mut stack) {
                warn!(player, %item, left = stack.amount(), "Inventory full");
            }
        }
        StepAction::Select { player, slot } => {
            if let Some(state) = server
                .world_mut()
                .entity_mut(player_id(player))
                .and_then(|e| e.player_state_mut())
            {
                debug!(player, slot, "Selected slot");
                state.selected_slot = slot;
            }
        }
        StepAction::Break { position } => {
            let position = block_position(position);
            if server
                .world_mut()
                .break_block(DimensionId::Overworld, position)
                .is_none()
            {
                warn!(%position, "No block to break");
            }
        }
    }
    Ok(())
}
