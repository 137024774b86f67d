//! Item stacks and their persisted form.

use crate::registry::{ItemRegistry, ItemType, RegistryError, RegistryKey};
use crate::traits::{ItemTrait, TraitSet};
use crate::{ContainerRef, DimensionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// A quantity of one item type, with custom properties, tag data and
/// attached behaviour traits.
#[derive(Debug, Clone)]
pub struct ItemStack {
    item_type: ItemType,
    amount: u32,
    metadata: u16,
    properties: BTreeMap<String, Value>,
    tags: BTreeMap<String, Value>,
    traits: TraitSet<dyn ItemTrait>,
    container: Option<ContainerRef>,
    dimension: Option<DimensionId>,
}

impl ItemStack {
    /// Create a new stack of `amount` units.
    pub fn new(item_type: ItemType, amount: u32) -> Self {
        Self {
            item_type,
            amount,
            metadata: 0,
            properties: BTreeMap::new(),
            tags: BTreeMap::new(),
            traits: TraitSet::new(),
            container: None,
            dimension: None,
        }
    }

    /// Builder-style metadata override.
    pub fn with_metadata(mut self, metadata: u16) -> Self {
        self.metadata = metadata;
        self
    }

    /// Item type.
    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    /// Item identifier.
    pub fn identifier(&self) -> &RegistryKey {
        &self.item_type.key
    }

    /// Units in the stack.
    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// Overwrite the unit count.
    pub fn set_amount(&mut self, amount: u32) {
        self.amount = amount;
    }

    /// Add units. Callers are responsible for respecting the max stack size.
    pub fn increment(&mut self, amount: u32) {
        self.amount = self.amount.saturating_add(amount);
    }

    /// Remove units, saturating at zero.
    pub fn decrement(&mut self, amount: u32) {
        self.amount = self.amount.saturating_sub(amount);
    }

    /// Metadata (aux) value.
    pub fn metadata(&self) -> u16 {
        self.metadata
    }

    /// Maximum units per stack of this type.
    pub fn max_stack_size(&self) -> u32 {
        self.item_type.max_stack_size
    }

    /// Whether stacks of this type merge.
    pub fn is_stackable(&self) -> bool {
        self.item_type.is_stackable()
    }

    /// Whether the stack holds the maximum number of units.
    pub fn is_full(&self) -> bool {
        self.amount >= self.max_stack_size()
    }

    /// Units that can still be merged into this stack.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_stack_size().saturating_sub(self.amount)
    }

    /// Whether the stack is the empty item identity.
    pub fn is_air(&self) -> bool {
        self.item_type.is_air()
    }

    /// Whether a slot holding this stack should collapse to absent.
    pub fn is_empty(&self) -> bool {
        self.amount == 0 || self.is_air()
    }

    /// Custom property by key.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a custom property.
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Remove a custom property.
    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// All custom properties.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Tag value by key.
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    /// Set a tag value.
    pub fn set_tag(&mut self, key: impl Into<String>, value: Value) {
        self.tags.insert(key.into(), value);
    }

    /// All tag data.
    pub fn tags(&self) -> &BTreeMap<String, Value> {
        &self.tags
    }

    /// Attach a trait, replacing one with the same identifier.
    pub fn add_trait(&mut self, value: Box<dyn ItemTrait>) {
        self.traits.insert(value);
    }

    /// Detach a trait by identifier.
    pub fn remove_trait(&mut self, identifier: &str) -> Option<Box<dyn ItemTrait>> {
        self.traits.remove(identifier)
    }

    /// Whether a trait is attached.
    pub fn has_trait(&self, identifier: &str) -> bool {
        self.traits.contains(identifier)
    }

    /// Attached traits.
    pub fn traits(&self) -> &TraitSet<dyn ItemTrait> {
        &self.traits
    }

    /// Attached traits, mutably (hook dispatch).
    pub fn traits_mut(&mut self) -> &mut TraitSet<dyn ItemTrait> {
        &mut self.traits
    }

    /// Container currently holding this stack.
    pub fn container(&self) -> Option<ContainerRef> {
        self.container
    }

    /// Stamp the owning container.
    pub fn set_container(&mut self, container: Option<ContainerRef>) {
        self.container = container;
    }

    /// Dimension the stack was placed in.
    pub fn dimension(&self) -> Option<DimensionId> {
        self.dimension
    }

    /// Stamp the dimension back-reference.
    pub fn set_dimension(&mut self, dimension: Option<DimensionId>) {
        self.dimension = dimension;
    }

    /// Mergeability test: same type, metadata, properties, tags and
    /// compatible traits. The amount is not compared.
    pub fn equals(&self, other: &ItemStack) -> bool {
        self.item_type.key == other.item_type.key
            && self.metadata == other.metadata
            && self.properties == other.properties
            && self.tags == other.tags
            && self.traits.compatible_with(&other.traits)
    }

    /// New independent stack of `amount` units carrying copies of every
    /// property, tag and trait. The copy is not owned by any container.
    pub fn split_copy(&self, amount: u32) -> ItemStack {
        ItemStack {
            item_type: self.item_type.clone(),
            amount,
            metadata: self.metadata,
            properties: self.properties.clone(),
            tags: self.tags.clone(),
            traits: self.traits.clone(),
            container: None,
            dimension: self.dimension,
        }
    }

    /// Persisted form of the stack.
    pub fn to_entry(&self) -> ItemStackEntry {
        ItemStackEntry {
            identifier: self.item_type.key.to_string(),
            amount: self.amount,
            metadata: self.metadata,
            properties: self.properties.clone(),
            tags: self.tags.clone(),
            traits: self
                .traits
                .iter()
                .map(|t| TraitEntry {
                    identifier: t.identifier().to_string(),
                    state: t.entry(),
                })
                .collect(),
        }
    }

    /// Restore a stack from its persisted form.
    ///
    /// Unknown traits are skipped with a warning so one stale trait does not
    /// lose the whole stack.
    pub fn from_entry(entry: &ItemStackEntry, registry: &ItemRegistry) -> Result<Self, RegistryError> {
        let item_type = registry.get(&entry.identifier)?.clone();
        let mut stack = ItemStack::new(item_type, entry.amount).with_metadata(entry.metadata);
        stack.properties = entry.properties.clone();
        stack.tags = entry.tags.clone();
        for trait_entry in &entry.traits {
            match registry.construct_trait(&trait_entry.identifier, &trait_entry.state) {
                Ok(value) => stack.add_trait(value),
                Err(err) => warn!(
                    item = %entry.identifier,
                    trait_id = %trait_entry.identifier,
                    %err,
                    "Skipping item trait while restoring stack"
                ),
            }
        }
        Ok(stack)
    }
}

impl PartialEq for ItemStack {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount && self.equals(other)
    }
}

/// Persisted state of one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitEntry {
    /// Trait identifier.
    pub identifier: String,
    /// Trait state.
    #[serde(default)]
    pub state: Value,
}

/// Persisted form of an [`ItemStack`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStackEntry {
    /// Item identifier.
    pub identifier: String,
    /// Units.
    pub amount: u32,
    /// Metadata value.
    #[serde(default)]
    pub metadata: u16,
    /// Custom properties.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Tag data.
    #[serde(default)]
    pub tags: BTreeMap<String, Value>,
    /// Attached traits.
    #[serde(default)]
    pub traits: Vec<TraitEntry>,
}

/// Persisted contents of a container: its size and the occupied slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStorage {
    /// Slot count.
    pub size: usize,
    /// `(slot, entry)` for every occupied slot.
    pub items: Vec<(usize, ItemStackEntry)>,
}
