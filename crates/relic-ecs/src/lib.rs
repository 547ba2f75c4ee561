//! Relic ECS -- an archetype-free, column-store entity engine.
//!
//! Entities are dense recyclable ids; each component type lives in one
//! dense, type-erased column ([`storage::Storage`]); a ragged per-entity
//! index table maps `(entity, component id)` to a record. There is no
//! archetype chunking: sparse component sets, O(1) access, and in-place
//! column sorts (with synchronized index patch-up) fall out of the one
//! representation.
//!
//! # Quick Start
//!
//! ```
//! use relic_ecs::prelude::*;
//!
//! let mut module = Module::new();
//! let e = module.create_entity();
//! module.add_component(e, 5.0f32);
//!
//! assert_eq!(module.get_component::<f32>(e), Some(&5.0));
//! assert!(!module.has_component::<i32>(e));
//! ```
//!
//! The relational query layer lives in the `relic-kanren` crate and reads a
//! [`module::Module`] as its facts database.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod adapter;
pub mod component;
pub mod entity;
#[allow(unsafe_code)]
pub mod module;
pub mod snapshot;
#[allow(unsafe_code)]
pub mod storage;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by snapshot restore.
///
/// Everyday misses (absent components, unknown names) are `Option`/`bool`
/// returns or the id sentinel, not errors; out-of-bounds record access is a
/// programming error and panics.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The snapshot body does not hash to its recorded digest.
    #[error("snapshot digest mismatch (expected {expected}, computed {actual})")]
    SnapshotDigestMismatch {
        expected: String,
        actual: String,
    },

    /// A column image disagrees with its own header.
    #[error("snapshot column {component:?} is malformed: {details}")]
    MalformedColumn {
        component: component::ComponentId,
        details: String,
    },

    /// An index row references a component with no captured column.
    #[error("snapshot row {entity} references component {component:?} with no captured column")]
    DanglingIndex {
        entity: u64,
        component: component::ComponentId,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::adapter::{Entry, HashStorage, TypedStorage};
    pub use crate::component::{
        component_id_of, component_id_of_tagged, ComponentId, ComponentRegistry,
    };
    #[cfg(feature = "string-lookup")]
    pub use crate::component::{
        component_id_free_maps, component_id_from_name, component_id_name,
    };
    pub use crate::entity::{Entity, EntityRef, WithEntity};
    pub use crate::module::Module;
    pub use crate::snapshot::ModuleSnapshot;
    pub use crate::storage::{Storage, INVALID_INDEX};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
