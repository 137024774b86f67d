use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use voxelhost_core::{DimensionId, ItemRegistry};
use voxelhost_server::ServerSettings;
use voxelhost_world::GameMode;

pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub seed: u64,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Outbound packets queued per player before new ones are dropped.
    pub outbound_capacity: usize,
    pub inventory_size: usize,
    pub max_request_actions: usize,
    pub game_mode: GameMode,
    pub spawn_position: [f32; 3],
    /// Extra item types (JSON palette) registered on top of the vanilla set.
    pub item_palette: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let settings = ServerSettings::default();
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            seed: 0,
            tick_rate: 20,
            outbound_capacity: settings.outbound_capacity,
            inventory_size: settings.inventory_size,
            max_request_actions: settings.max_request_actions,
            game_mode: settings.game_mode,
            spawn_position: settings.spawn_position,
            item_palette: None,
        }
    }
}

impl ServerConfig {
    /// Read and parse a config file, returning errors to the caller.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err:#}. Using defaults");
                Self::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn settings(&self) -> ServerSettings {
        ServerSettings {
            outbound_capacity: self.outbound_capacity.max(1),
            inventory_size: self.inventory_size,
            max_request_actions: self.max_request_actions,
            game_mode: self.game_mode,
            spawn_dimension: DimensionId::Overworld,
            spawn_position: self.spawn_position,
        }
    }

    /// Vanilla items plus the configured palette, if any.
    pub fn load_registry(&self) -> Result<ItemRegistry> {
        let mut registry = ItemRegistry::vanilla();
        if let Some(path) = &self.item_palette {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read item palette {}", path.display()))?;
            let added = registry
                .extend_from_json(&json)
                .with_context(|| format!("invalid item palette {}", path.display()))?;
            info!(added, palette = %path.display(), "Loaded item palette");
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("server.toml");
        fs::write(&path, "game_mode = \"creative\"\ninventory_size = 27\n").expect("write");

        let config = ServerConfig::load_from_path(&path);
        assert_eq!(config.game_mode, GameMode::Creative);
        assert_eq!(config.inventory_size, 27);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("server.toml");
        fs::write(&path, "inventory_size = \"lots\"").expect("write");

        assert!(ServerConfig::read(&path).is_err());
        assert_eq!(ServerConfig::load_from_path(&path), ServerConfig::default());
    }

    #[test]
    fn saved_config_reads_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("server.toml");
        let config = ServerConfig {
            seed: 99,
            max_request_actions: 8,
            ..ServerConfig::default()
        };
        config.save_to_path(&path).expect("save");
        assert_eq!(ServerConfig::read(&path).expect("read"), config);
    }

    #[test]
    fn palette_extends_the_registry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let palette = dir.path().join("items.json");
        fs::write(
            &palette,
            r#"[{"identifier": "custom:ruby", "network_id": 9001, "max_stack_size": 16}]"#,
        )
        .expect("write");
        let config = ServerConfig {
            item_palette: Some(palette),
            ..ServerConfig::default()
        };

        let registry = config.load_registry().expect("registry");
        assert_eq!(registry.get("custom:ruby").map(|t| t.max_stack_size).ok(), Some(16));
        assert!(registry.get("dirt").is_ok());
    }
}
