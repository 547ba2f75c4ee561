//! Component ids and the component-id registry.
//!
//! Every component type -- whether named by a compile-time Rust type or by a
//! runtime string -- is assigned a stable, dense [`ComponentId`] by a
//! [`ComponentRegistry`]. A process-wide registry instance is the convenience
//! default (see [`global`]); modules resolve their typed operations through
//! it, while embedders that need isolation can hold their own registry and
//! drive the untyped module API with explicit ids.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
#[cfg(feature = "string-lookup")]
use std::sync::Arc;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ComponentId
// ---------------------------------------------------------------------------

/// Opaque, dense identifier for a registered component type.
///
/// Ids count up from zero. The all-ones value is the "not found" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(usize);

impl ComponentId {
    /// The "not found" sentinel (all-ones).
    pub const INVALID: ComponentId = ComponentId(usize::MAX);

    /// Construct from a raw id.
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw representation.
    #[inline]
    pub const fn to_raw(self) -> usize {
        self.0
    }

    /// Index into id-keyed tables (module storages, index rows).
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Whether this is the "not found" sentinel.
    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.0 == usize::MAX
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "ComponentId(invalid)")
        } else {
            write!(f, "ComponentId({})", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Assigns [`ComponentId`]s to component types and names.
///
/// Three pieces of state: the id counter, a forward `name -> id` map, and a
/// reverse `id -> name` map. The string maps share ownership of each name
/// via `Arc<str>` and are compiled out entirely when the `string-lookup`
/// feature is disabled (ids are still assigned, just unnamed).
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    next: usize,
    /// `(type, unique tag) -> id` for compile-time registration.
    by_token: HashMap<(TypeId, usize), ComponentId>,
    #[cfg(feature = "string-lookup")]
    forward: HashMap<Arc<str>, ComponentId>,
    #[cfg(feature = "string-lookup")]
    reverse: HashMap<ComponentId, Arc<str>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next fresh id (post-increment).
    pub fn next_id(&mut self) -> ComponentId {
        let id = ComponentId(self.next);
        self.next += 1;
        id
    }

    /// Look up a component id by name.
    ///
    /// On a miss, either allocates a fresh id and registers it in both maps
    /// (`create_if_missing`) or returns [`ComponentId::INVALID`].
    #[cfg(feature = "string-lookup")]
    pub fn id_from_name(&mut self, name: &str, create_if_missing: bool) -> ComponentId {
        if let Some(&id) = self.forward.get(name) {
            return id;
        }
        if !create_if_missing {
            return ComponentId::INVALID;
        }
        let id = self.next_id();
        self.insert_name(name.into(), id);
        id
    }

    /// Reverse lookup: the name registered for `id`, if any.
    #[cfg(feature = "string-lookup")]
    pub fn name(&self, id: ComponentId) -> Option<Arc<str>> {
        self.reverse.get(&id).cloned()
    }

    /// Register a compile-time component type under a uniquifying tag.
    ///
    /// Exactly one id is assigned per `(type, unique)` pair; subsequent calls
    /// return the cached id. The captured name is the Rust type name with the
    /// tag appended in decimal when `unique > 0`.
    pub fn register_type<T: 'static>(&mut self, unique: usize) -> ComponentId {
        let token = (TypeId::of::<T>(), unique);
        if let Some(&id) = self.by_token.get(&token) {
            return id;
        }
        let id = self.next_id();
        self.by_token.insert(token, id);
        #[cfg(feature = "string-lookup")]
        {
            let mut name = std::any::type_name::<T>().to_owned();
            if unique > 0 {
                name.push_str(&unique.to_string());
            }
            self.insert_name(name.into(), id);
        }
        id
    }

    #[cfg(feature = "string-lookup")]
    fn insert_name(&mut self, name: Arc<str>, id: ComponentId) {
        self.reverse.insert(id, name.clone());
        self.forward.insert(name, id);
    }

    /// Drop both name maps. Ids remain assigned; names are gone.
    #[cfg(feature = "string-lookup")]
    pub fn free_maps(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

// ---------------------------------------------------------------------------
// Process-wide default registry
// ---------------------------------------------------------------------------

static GLOBAL: Lazy<Mutex<ComponentRegistry>> =
    Lazy::new(|| Mutex::new(ComponentRegistry::new()));

/// The process-wide default registry.
pub fn global() -> &'static Mutex<ComponentRegistry> {
    &GLOBAL
}

/// The id of compile-time component type `T` in the global registry,
/// assigned on first use.
pub fn component_id_of<T: 'static>() -> ComponentId {
    component_id_of_tagged::<T>(0)
}

/// Tag-uniquified variant of [`component_id_of`]: the same payload type can
/// appear as several logically distinct components.
pub fn component_id_of_tagged<T: 'static>(unique: usize) -> ComponentId {
    GLOBAL
        .lock()
        .expect("component registry poisoned")
        .register_type::<T>(unique)
}

/// Allocate the next fresh id from the global registry.
pub fn next_component_id() -> ComponentId {
    GLOBAL
        .lock()
        .expect("component registry poisoned")
        .next_id()
}

/// Name-based lookup against the global registry.
#[cfg(feature = "string-lookup")]
pub fn component_id_from_name(name: &str, create_if_missing: bool) -> ComponentId {
    GLOBAL
        .lock()
        .expect("component registry poisoned")
        .id_from_name(name, create_if_missing)
}

/// Reverse name lookup against the global registry.
#[cfg(feature = "string-lookup")]
pub fn component_id_name(id: ComponentId) -> Option<Arc<str>> {
    GLOBAL
        .lock()
        .expect("component registry poisoned")
        .name(id)
}

/// Free the global registry's name maps.
#[cfg(feature = "string-lookup")]
pub fn component_id_free_maps() {
    GLOBAL
        .lock()
        .expect("component registry poisoned")
        .free_maps();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_post_incremented() {
        let mut reg = ComponentRegistry::new();
        assert_eq!(reg.next_id(), ComponentId::from_raw(0));
        assert_eq!(reg.next_id(), ComponentId::from_raw(1));
        assert_eq!(reg.next_id(), ComponentId::from_raw(2));
    }

    #[test]
    fn register_type_is_stable() {
        let mut reg = ComponentRegistry::new();
        let first = reg.register_type::<f32>(0);
        let second = reg.register_type::<f32>(0);
        assert_eq!(first, second);
        assert_ne!(reg.register_type::<i32>(0), first);
    }

    #[test]
    fn unique_tags_make_distinct_ids() {
        let mut reg = ComponentRegistry::new();
        let plain = reg.register_type::<f32>(0);
        let tagged = reg.register_type::<f32>(1);
        assert_ne!(plain, tagged);
        // Same tag resolves to the same id again.
        assert_eq!(reg.register_type::<f32>(1), tagged);
    }

    #[cfg(feature = "string-lookup")]
    #[test]
    fn name_lookup_roundtrip() {
        let mut reg = ComponentRegistry::new();
        let id = reg.id_from_name("alice", true);
        assert_eq!(reg.id_from_name("alice", true), id);
        assert_eq!(reg.name(id).as_deref(), Some("alice"));
        assert_eq!(
            reg.id_from_name("bob", false),
            ComponentId::INVALID
        );
    }

    #[cfg(feature = "string-lookup")]
    #[test]
    fn type_names_carry_the_unique_suffix() {
        let mut reg = ComponentRegistry::new();
        let plain = reg.register_type::<f32>(0);
        let tagged = reg.register_type::<f32>(1);
        let plain_name = reg.name(plain).unwrap();
        let tagged_name = reg.name(tagged).unwrap();
        assert_eq!(format!("{plain_name}1"), tagged_name.as_ref());
        // The forward map agrees with the reverse map.
        assert_eq!(reg.id_from_name(&tagged_name, false), tagged);
    }

    #[cfg(feature = "string-lookup")]
    #[test]
    fn free_maps_drops_names_but_not_ids() {
        let mut reg = ComponentRegistry::new();
        let id = reg.id_from_name("carol", true);
        reg.free_maps();
        assert_eq!(reg.name(id), None);
        // A fresh allocation continues the counter instead of reusing ids.
        assert!(reg.next_id() > id);
    }

    struct MarkerA;
    struct MarkerB;

    #[test]
    fn global_ids_are_stable_across_calls() {
        let a = component_id_of::<MarkerA>();
        let b = component_id_of::<MarkerB>();
        assert_eq!(component_id_of::<MarkerA>(), a);
        assert_eq!(component_id_of::<MarkerB>(), b);
        assert_ne!(a, b);
    }
}
