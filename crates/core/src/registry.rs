//! Namespaced registry keys and the item type registry.
//!
//! Registry keys are stable string identifiers (e.g. `minecraft:dirt`). They
//! are ordered and validated to support deterministic iteration and stable
//! persistence. The [`ItemRegistry`] maps keys and network ids to
//! [`ItemType`]s and holds the constructors for item traits restored from
//! persisted entries.

use crate::traits::{ItemTrait, TraitFault};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default namespace used when a key omits an explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Error returned when parsing an invalid [`RegistryKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RegistryKeyError {
    message: String,
}

impl RegistryKeyError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A namespaced key of the form `namespace:path`.
///
/// Ordering is lexical by `(namespace, path)` and is stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryKey {
    namespace: String,
    path: String,
}

impl RegistryKey {
    /// Parse a registry key.
    ///
    /// Accepts either:
    /// - `namespace:path`
    /// - `path` (uses [`DEFAULT_NAMESPACE`])
    pub fn parse(input: &str) -> Result<Self, RegistryKeyError> {
        Self::parse_with_default_namespace(input, DEFAULT_NAMESPACE)
    }

    /// Parse a registry key using a caller-provided default namespace.
    pub fn parse_with_default_namespace(
        input: &str,
        default_namespace: &str,
    ) -> Result<Self, RegistryKeyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(RegistryKeyError::new("RegistryKey cannot be empty"));
        }

        let (namespace, path) = match input.split_once(':') {
            Some((ns, p)) => (ns, p),
            None => (default_namespace, input),
        };

        let namespace = namespace.trim();
        let path = path.trim();

        validate_namespace(namespace)?;
        validate_path(path)?;

        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Registry key namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Registry key path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for RegistryKey {
    type Err = RegistryKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_namespace(ns: &str) -> Result<(), RegistryKeyError> {
    if ns.is_empty() {
        return Err(RegistryKeyError::new("RegistryKey namespace cannot be empty"));
    }
    if ns.len() > 64 {
        return Err(RegistryKeyError::new(
            "RegistryKey namespace too long (max 64)",
        ));
    }
    if !ns
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.'))
    {
        return Err(RegistryKeyError::new(
            "RegistryKey namespace has invalid characters (allowed: a-z0-9_.-)",
        ));
    }
    Ok(())
}

fn validate_path(path: &str) -> Result<(), RegistryKeyError> {
    if path.is_empty() {
        return Err(RegistryKeyError::new("RegistryKey path cannot be empty"));
    }
    if path.len() > 128 {
        return Err(RegistryKeyError::new("RegistryKey path too long (max 128)"));
    }
    if !path
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/'))
    {
        return Err(RegistryKeyError::new(
            "RegistryKey path has invalid characters (allowed: a-z0-9_./-)",
        ));
    }
    Ok(())
}

/// Item type identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemType {
    /// Namespaced identifier.
    pub key: RegistryKey,
    /// Id used in wire descriptors.
    pub network_id: i32,
    /// Maximum units per stack.
    pub max_stack_size: u32,
}

impl ItemType {
    /// Network id of the empty item.
    pub const AIR_NETWORK_ID: i32 = 0;

    /// Whether stacks of this type merge. Single-unit types never do.
    pub fn is_stackable(&self) -> bool {
        self.max_stack_size > 1
    }

    /// Whether this is the empty ("air") item.
    pub fn is_air(&self) -> bool {
        self.network_id == Self::AIR_NETWORK_ID
    }
}

/// Errors raised by [`ItemRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed identifier.
    #[error("invalid item identifier: {0}")]
    InvalidKey(#[from] RegistryKeyError),
    /// Identifier registered twice.
    #[error("item `{0}` is already registered")]
    DuplicateKey(RegistryKey),
    /// Network id registered twice.
    #[error("network id {0} is already registered")]
    DuplicateNetworkId(i32),
    /// Stack size of zero.
    #[error("item `{0}` has a max stack size of zero")]
    ZeroStackSize(RegistryKey),
    /// Unknown identifier.
    #[error("unknown item `{0}`")]
    UnknownItem(String),
    /// Unknown network id.
    #[error("unknown item network id {0}")]
    UnknownNetworkId(i32),
    /// Trait identifier without a registered constructor.
    #[error("unknown item trait `{0}`")]
    UnknownTrait(String),
    /// Trait constructor rejected the persisted state.
    #[error(transparent)]
    Trait(#[from] TraitFault),
    /// Palette file could not be parsed.
    #[error("invalid item palette: {0}")]
    Palette(#[from] serde_json::Error),
}

/// Builds an item trait from its persisted entry.
pub type TraitConstructor = fn(&Value) -> Result<Box<dyn ItemTrait>, TraitFault>;

#[derive(Debug, Deserialize)]
struct PaletteEntry {
    identifier: String,
    network_id: i32,
    #[serde(default = "default_max_stack_size")]
    max_stack_size: u32,
}

fn default_max_stack_size() -> u32 {
    64
}

const VANILLA_ITEMS: &[(&str, i32, u32)] = &[
    ("air", 0, 64),
    ("stone", 1, 64),
    ("grass_block", 2, 64),
    ("dirt", 3, 64),
    ("cobblestone", 4, 64),
    ("oak_planks", 5, 64),
    ("torch", 50, 64),
    ("chest", 54, 64),
    ("barrel", 458, 64),
    ("apple", 257, 64),
    ("diamond", 264, 64),
    ("iron_ingot", 265, 64),
    ("stick", 280, 64),
    ("diamond_sword", 276, 1),
    ("diamond_pickaxe", 278, 1),
    ("iron_helmet", 306, 1),
    ("iron_chestplate", 307, 1),
    ("iron_leggings", 308, 1),
    ("iron_boots", 309, 1),
    ("snowball", 332, 16),
    ("egg", 344, 16),
    ("ender_pearl", 368, 16),
];

/// Item type palette.
#[derive(Clone, Default)]
pub struct ItemRegistry {
    types: BTreeMap<RegistryKey, ItemType>,
    by_network_id: BTreeMap<i32, RegistryKey>,
    traits: BTreeMap<String, TraitConstructor>,
}

impl ItemRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in vanilla items.
    pub fn vanilla() -> Self {
        let mut registry = Self::new();
        for &(path, network_id, max_stack_size) in VANILLA_ITEMS {
            let key = RegistryKey {
                namespace: DEFAULT_NAMESPACE.to_string(),
                path: path.to_string(),
            };
            // The table has unique keys and ids, so registration cannot fail.
            let _ = registry.register(ItemType {
                key,
                network_id,
                max_stack_size,
            });
        }
        registry
    }

    /// Register a new item type.
    pub fn register(&mut self, item_type: ItemType) -> Result<(), RegistryError> {
        if item_type.max_stack_size == 0 {
            return Err(RegistryError::ZeroStackSize(item_type.key));
        }
        if self.types.contains_key(&item_type.key) {
            return Err(RegistryError::DuplicateKey(item_type.key));
        }
        if self.by_network_id.contains_key(&item_type.network_id) {
            return Err(RegistryError::DuplicateNetworkId(item_type.network_id));
        }
        self.by_network_id
            .insert(item_type.network_id, item_type.key.clone());
        self.types.insert(item_type.key.clone(), item_type);
        Ok(())
    }

    /// Register every entry of a JSON palette
    /// (`[{"identifier": "...", "network_id": 1, "max_stack_size": 64}]`).
    ///
    /// Returns the number of registered types.
    pub fn extend_from_json(&mut self, json: &str) -> Result<usize, RegistryError> {
        let entries: Vec<PaletteEntry> = serde_json::from_str(json)?;
        let count = entries.len();
        for entry in entries {
            self.register(ItemType {
                key: RegistryKey::parse(&entry.identifier)?,
                network_id: entry.network_id,
                max_stack_size: entry.max_stack_size,
            })?;
        }
        Ok(count)
    }

    /// Number of registered item types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a type by identifier (default namespace allowed).
    pub fn get(&self, identifier: &str) -> Result<&ItemType, RegistryError> {
        let key = RegistryKey::parse(identifier)?;
        self.types
            .get(&key)
            .ok_or_else(|| RegistryError::UnknownItem(key.to_string()))
    }

    /// Look up a type by network id.
    pub fn by_network_id(&self, network_id: i32) -> Result<&ItemType, RegistryError> {
        self.by_network_id
            .get(&network_id)
            .and_then(|key| self.types.get(key))
            .ok_or(RegistryError::UnknownNetworkId(network_id))
    }

    /// Register a trait constructor under its identifier.
    pub fn register_trait(&mut self, identifier: impl Into<String>, constructor: TraitConstructor) {
        self.traits.insert(identifier.into(), constructor);
    }

    /// Whether a constructor is registered for the trait identifier.
    pub fn has_trait(&self, identifier: &str) -> bool {
        self.traits.contains_key(identifier)
    }

    /// Rebuild a trait from its persisted state.
    pub fn construct_trait(
        &self,
        identifier: &str,
        state: &Value,
    ) -> Result<Box<dyn ItemTrait>, RegistryError> {
        let constructor = self
            .traits
            .get(identifier)
            .ok_or_else(|| RegistryError::UnknownTrait(identifier.to_string()))?;
        Ok(constructor(state)?)
    }
}

impl fmt::Debug for ItemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRegistry")
            .field("types", &self.types.len())
            .field("traits", &self.traits.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_key() {
        let key = RegistryKey::parse("minecraft:stone").unwrap();
        assert_eq!(key.namespace(), "minecraft");
        assert_eq!(key.path(), "stone");
        assert_eq!(key.to_string(), "minecraft:stone");
    }

    #[test]
    fn parses_with_default_namespace() {
        let key = RegistryKey::parse("stone").unwrap();
        assert_eq!(key.to_string(), "minecraft:stone");
    }

    #[test]
    fn rejects_empty() {
        assert!(RegistryKey::parse("").is_err());
        assert!(RegistryKey::parse("   ").is_err());
    }

    #[test]
    fn rejects_invalid_chars() {
        assert!(RegistryKey::parse("minecraft:Stone").is_err());
        assert!(RegistryKey::parse("MC:stone").is_err());
        assert!(RegistryKey::parse("minecraft:stone?").is_err());
        assert!(RegistryKey::parse("minecraft:").is_err());
        assert!(RegistryKey::parse(":stone").is_err());
    }

    #[test]
    fn vanilla_registry_resolves_by_key_and_network_id() {
        let registry = ItemRegistry::vanilla();
        let dirt = registry.get("dirt").unwrap();
        assert_eq!(dirt.max_stack_size, 64);
        assert!(dirt.is_stackable());
        assert_eq!(registry.by_network_id(dirt.network_id).unwrap(), dirt);

        let sword = registry.get("minecraft:diamond_sword").unwrap();
        assert!(!sword.is_stackable());
        assert!(registry.get("air").unwrap().is_air());
        assert!(matches!(
            registry.get("minecraft:unobtainium"),
            Err(RegistryError::UnknownItem(_))
        ));
    }

    #[test]
    fn palette_rejects_duplicates() {
        let mut registry = ItemRegistry::vanilla();
        let added = registry
            .extend_from_json(r#"[{"identifier": "custom:ruby", "network_id": 9001}]"#)
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(registry.get("custom:ruby").unwrap().max_stack_size, 64);

        let dup = registry.extend_from_json(r#"[{"identifier": "custom:gem", "network_id": 3}]"#);
        assert!(matches!(dup, Err(RegistryError::DuplicateNetworkId(3))));
    }

    #[test]
    fn unknown_trait_is_reported() {
        let registry = ItemRegistry::new();
        assert!(matches!(
            registry.construct_trait("minecraft:glint", &Value::Null),
            Err(RegistryError::UnknownTrait(_))
        ));
    }
}
