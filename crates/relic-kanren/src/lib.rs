//! Relic Kanren -- a miniKanren-style relational query engine over the
//! `relic-ecs` component store.
//!
//! Queries are [`Goal`](goal::Goal)s: pure functions from a query
//! [`State`](goal::State) to a lazy stream of states. Unification, fair
//! (interleaving) disjunction, and conjunction are the core; list goals and
//! ECS-aware goals ([`has_component`](relational::has_component),
//! [`related_entities`](relational::related_entities)) sit on top and read
//! the module as their facts database.
//!
//! # Quick Start
//!
//! ```
//! use relic_ecs::prelude::*;
//! use relic_kanren::prelude::*;
//!
//! relic_kanren::relation! {
//!     struct ParentOf(Vec<Entity>);
//! }
//!
//! let mut module = Module::new();
//! let child = module.create_entity();
//! let parent = module.create_entity();
//! module.add_component(child, ParentOf(vec![parent]));
//!
//! let who = module.next_logic_variable();
//! let goal = related_entities::<ParentOf>(child, who);
//! let parents: Vec<Term> =
//!     solutions_for(&goal, module.logic_state(), who).collect();
//! assert_eq!(parents, vec![Term::Entity(parent)]);
//! ```

#![deny(unsafe_code)]

pub mod goal;
pub mod list;
pub mod query;
pub mod relation;
pub mod relational;
pub mod term;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::goal::{
        condition, conjunction, disjunction, eq, fail, fresh, fresh2, fresh3, fresh4,
        succeed, Goal, ModuleExt, State, StateStream,
    };
    pub use crate::list::{
        append, element_of, map, split_head, split_head_and_tail, split_tail,
        split_tail_ensure_list, wrap_list,
    };
    pub use crate::query::{all_substitutions, solutions_for, unique_substitutions};
    pub use crate::relation::{EntityRelations, RelatedItems, Relation};
    pub use crate::relational::{
        has_component, has_component_id, related_entities, related_entities_list,
        stream_of_all_entities,
    };
    pub use crate::term::{
        assoc, extend_substitutions, find, occurs, unify, Substitution, Substitutions,
        Term, Variable,
    };
    pub use crate::{conj, disj};
}
