//! Entity identifiers and the per-entity facade.
//!
//! An [`Entity`] is an opaque 64-bit id. Ids are dense: an entity's id is
//! also its row in the module's index table, which is what makes the
//! monotonic storage sort meaningful. Id `0` is reserved as the invalid
//! ("null") entity and is never handed out by
//! [`Module::create_entity`](crate::module::Module::create_entity).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::component::ComponentId;
use crate::module::Module;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A dense, recyclable entity identifier. The default value is
/// [`Entity::NULL`].
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// The reserved invalid entity (id `0`).
    pub const NULL: Entity = Entity(0);

    /// Construct an entity from a raw id.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// The entity's row in the module index table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is the reserved invalid entity.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WithEntity -- payload wrapper that remembers its owner
// ---------------------------------------------------------------------------

/// A component payload that carries its owning entity inline.
///
/// Both storage sorts move records between slots; a `WithEntity<T>` record
/// keeps the `(owner, value)` pairing intact through any permutation, which
/// is useful when iterating a column directly instead of going through the
/// index table. Ordering and equality consider only `value`, so
/// [`Module::sort_by_value`](crate::module::Module::sort_by_value) orders by
/// the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithEntity<T> {
    /// The entity this record belongs to.
    pub entity: Entity,
    /// The wrapped payload.
    pub value: T,
}

impl<T> WithEntity<T> {
    /// Pair a payload with its owner.
    pub fn new(entity: Entity, value: T) -> Self {
        Self { entity, value }
    }
}

impl<T: PartialEq> PartialEq for WithEntity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: PartialEq> PartialEq<T> for WithEntity<T> {
    fn eq(&self, other: &T) -> bool {
        self.value == *other
    }
}

impl<T: PartialOrd> PartialOrd for WithEntity<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<T> std::ops::Deref for WithEntity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for WithEntity<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

// ---------------------------------------------------------------------------
// EntityRef -- ergonomic read view over one entity
// ---------------------------------------------------------------------------

/// A borrowed view of a single entity's components.
///
/// Obtained from [`Module::entity`](crate::module::Module::entity). Purely a
/// convenience over the module accessors; holds the module shared-borrowed
/// for its lifetime.
#[derive(Clone, Copy)]
pub struct EntityRef<'m> {
    module: &'m Module,
    entity: Entity,
}

impl<'m> EntityRef<'m> {
    pub(crate) fn new(module: &'m Module, entity: Entity) -> Self {
        Self { module, entity }
    }

    /// The entity this view refers to.
    #[inline]
    pub fn id(&self) -> Entity {
        self.entity
    }

    /// The module this view reads from.
    #[inline]
    pub fn module(&self) -> &'m Module {
        self.module
    }

    /// Whether the entity currently owns a `T` component.
    pub fn has<T: 'static>(&self) -> bool {
        self.module.has_component::<T>(self.entity)
    }

    /// The entity's `T` component, if it owns one.
    pub fn get<T: 'static>(&self) -> Option<&'m T> {
        self.module.get_component::<T>(self.entity)
    }

    /// Tag-uniquified variant of [`get`](Self::get).
    pub fn get_tagged<T: 'static>(&self, unique: usize) -> Option<&'m T> {
        self.module.get_component_tagged::<T>(self.entity, unique)
    }

    /// The record index of the entity's `componentID` slot, or
    /// [`INVALID_INDEX`](crate::storage::INVALID_INDEX).
    pub fn record_index(&self, component: ComponentId) -> usize {
        self.module.record_index(self.entity, component)
    }
}

impl fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({})", self.entity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
