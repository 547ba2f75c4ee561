//! Relation components.
//!
//! A relation is an ordinary component whose payload is an ordered sequence
//! of related entity ids -- or of whole [`Term`]s, for relations that need
//! to hold logic variables (a "can-be-term" relation). Position carries
//! meaning: a function-type relation can put the return type at index 0 and
//! parameters after it.
//!
//! User relation types are newtypes over a payload implementing
//! [`RelatedItems`]; the [`relation!`] macro writes the boilerplate:
//!
//! ```
//! use relic_kanren::relation;
//! use relic_ecs::entity::Entity;
//!
//! relation! {
//!     /// `parent_of(child) = [parents...]`
//!     pub struct ParentOf(Vec<Entity>);
//! }
//! ```

use relic_ecs::entity::EntityRef;
use relic_ecs::entity::Entity;

use crate::term::Term;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A relation payload: something that renders as an ordered term sequence.
///
/// Fixed-extent payloads are arrays, dynamic-extent payloads are vectors;
/// term payloads mark the relation as term-capable.
pub trait RelatedItems {
    /// Whether entries may be arbitrary terms rather than entity ids.
    const CAN_BE_TERM: bool;

    /// The entries, in positional order.
    fn to_terms(&self) -> Vec<Term>;
}

impl RelatedItems for Vec<Entity> {
    const CAN_BE_TERM: bool = false;

    fn to_terms(&self) -> Vec<Term> {
        self.iter().copied().map(Term::Entity).collect()
    }
}

impl<const N: usize> RelatedItems for [Entity; N] {
    const CAN_BE_TERM: bool = false;

    fn to_terms(&self) -> Vec<Term> {
        self.iter().copied().map(Term::Entity).collect()
    }
}

impl RelatedItems for Vec<Term> {
    const CAN_BE_TERM: bool = true;

    fn to_terms(&self) -> Vec<Term> {
        self.clone()
    }
}

impl<const N: usize> RelatedItems for [Term; N] {
    const CAN_BE_TERM: bool = true;

    fn to_terms(&self) -> Vec<Term> {
        self.to_vec()
    }
}

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// A component type whose payload is an ordered related-entity sequence.
pub trait Relation: 'static {
    /// Whether entries may be arbitrary terms rather than entity ids.
    const CAN_BE_TERM: bool = false;

    /// The related entries, in positional order.
    fn related(&self) -> Vec<Term>;
}

/// Define a relation component as a newtype over a payload type.
#[macro_export]
macro_rules! relation {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($payload:ty);) => {
        $(#[$meta])*
        $vis struct $name(pub $payload);

        impl $crate::relation::Relation for $name {
            const CAN_BE_TERM: bool =
                <$payload as $crate::relation::RelatedItems>::CAN_BE_TERM;

            fn related(&self) -> ::std::vec::Vec<$crate::term::Term> {
                $crate::relation::RelatedItems::to_terms(&self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Entity facade extension
// ---------------------------------------------------------------------------

/// Relation access on the per-entity facade.
pub trait EntityRelations {
    /// The entity's `R` entries, or empty when it has no `R` component.
    fn related<R: Relation>(&self) -> Vec<Term>;
}

impl EntityRelations for EntityRef<'_> {
    fn related<R: Relation>(&self) -> Vec<Term> {
        self.get::<R>().map(|r| r.related()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
