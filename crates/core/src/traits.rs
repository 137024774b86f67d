//! Attachable behaviour traits and fault-isolated hook dispatch.
//!
//! Both item stacks and world anchors carry a [`TraitSet`]. Hooks are
//! optional capabilities: a trait that cares about container lifecycle
//! returns `Some` from [`ItemTrait::container_hooks`], everything else is
//! skipped. A hook that returns a [`TraitFault`] is detached from its owner
//! by [`TraitSet::dispatch`].

use crate::UniqueId;
use serde_json::Value;
use std::fmt;

/// Failure raised by a trait hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("trait `{identifier}` failed: {message}")]
pub struct TraitFault {
    /// Identifier of the failing trait.
    pub identifier: String,
    /// Human readable cause.
    pub message: String,
}

impl TraitFault {
    /// Create a new fault for the given trait.
    pub fn new(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            message: message.into(),
        }
    }
}

/// Anything that can live in a [`TraitSet`].
pub trait AttachedTrait {
    /// Stable identifier, unique within one owner.
    fn identifier(&self) -> &str;
}

/// Container lifecycle hooks.
pub trait ContainerHooks {
    /// A viewer opened the container holding the owner.
    fn on_container_open(&mut self, _viewer: UniqueId) -> Result<(), TraitFault> {
        Ok(())
    }

    /// A viewer closed the container holding the owner.
    fn on_container_close(&mut self, _viewer: UniqueId) -> Result<(), TraitFault> {
        Ok(())
    }
}

/// Behaviour attached to an item stack.
pub trait ItemTrait: AttachedTrait {
    /// Independent copy, used when a stack is split.
    fn clone_trait(&self) -> Box<dyn ItemTrait>;

    /// Persisted state of the trait. Two traits with the same identifier and
    /// entry are considered equal for stack merging.
    fn entry(&self) -> Value {
        Value::Null
    }

    /// Container lifecycle capability, if the trait has one.
    fn container_hooks(&mut self) -> Option<&mut dyn ContainerHooks> {
        None
    }
}

/// Ordered set of traits keyed by identifier.
pub struct TraitSet<T: ?Sized + AttachedTrait> {
    traits: Vec<Box<T>>,
}

impl<T: ?Sized + AttachedTrait> TraitSet<T> {
    /// Empty set.
    pub fn new() -> Self {
        Self { traits: Vec::new() }
    }

    /// Number of attached traits.
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    /// Whether no trait is attached.
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    /// Attach a trait, replacing any trait with the same identifier.
    /// Returns the replaced trait.
    pub fn insert(&mut self, value: Box<T>) -> Option<Box<T>> {
        let previous = self.remove(value.identifier());
        self.traits.push(value);
        previous
    }

    /// Detach a trait by identifier.
    pub fn remove(&mut self, identifier: &str) -> Option<Box<T>> {
        let index = self
            .traits
            .iter()
            .position(|t| t.identifier() == identifier)?;
        Some(self.traits.remove(index))
    }

    /// Whether a trait with the given identifier is attached.
    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    /// Look up a trait by identifier.
    pub fn get(&self, identifier: &str) -> Option<&T> {
        self.traits
            .iter()
            .find(|t| t.identifier() == identifier)
            .map(|t| t.as_ref())
    }

    /// Look up a trait mutably by identifier.
    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut T> {
        self.traits
            .iter_mut()
            .find(|t| t.identifier() == identifier)
            .map(|t| t.as_mut())
    }

    /// Iterate over the attached traits in attach order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.traits.iter().map(|t| t.as_ref())
    }

    /// Identifiers in attach order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.traits.iter().map(|t| t.identifier())
    }

    /// Run `call` on every trait. A trait whose call fails is reported to
    /// `on_fault` and detached; the remaining traits still run.
    ///
    /// Returns the number of detached traits.
    pub fn dispatch<F, R>(&mut self, mut call: F, mut on_fault: R) -> usize
    where
        F: FnMut(&mut T) -> Result<(), TraitFault>,
        R: FnMut(&T, &TraitFault),
    {
        let before = self.traits.len();
        self.traits.retain_mut(|t| match call(t.as_mut()) {
            Ok(()) => true,
            Err(fault) => {
                on_fault(t.as_ref(), &fault);
                false
            }
        });
        before - self.traits.len()
    }
}

impl<T: ?Sized + AttachedTrait> Default for TraitSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + AttachedTrait> fmt::Debug for TraitSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.identifiers()).finish()
    }
}

impl Clone for TraitSet<dyn ItemTrait> {
    fn clone(&self) -> Self {
        Self {
            traits: self.traits.iter().map(|t| t.clone_trait()).collect(),
        }
    }
}

impl TraitSet<dyn ItemTrait> {
    /// Whether both sets hold the same identifiers with equal entries.
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|t| {
                other
                    .get(t.identifier())
                    .is_some_and(|o| o.entry() == t.entry())
            })
    }
}
