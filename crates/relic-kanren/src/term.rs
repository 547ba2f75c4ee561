//! The logic-level data model: terms, substitutions, and unification.
//!
//! A [`Term`] is a small closed union -- a logic variable, an entity id, or
//! a list of terms. A [`Substitutions`] is an ordered association list of
//! `(term, term)` bindings; looking a variable up walks binding chains until
//! a non-variable or an unbound variable is reached. Append-only within a
//! branch: backtracking is implicit in the stream consumer abandoning a
//! branch, so no undo machinery is needed.

use std::fmt;

use relic_ecs::entity::Entity;

// ---------------------------------------------------------------------------
// Variable
// ---------------------------------------------------------------------------

/// A logic variable, identified by the counter that created it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable {
    pub id: u64,
}

impl Variable {
    /// Construct a variable with an explicit id.
    pub const fn new(id: u64) -> Self {
        Self { id }
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.id)
    }
}

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// The unit of logic-level data.
///
/// Lists are ordinary vectors; homogeneity is not required.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(Variable),
    Entity(Entity),
    List(Vec<Term>),
}

impl Term {
    /// The empty list.
    pub fn empty_list() -> Term {
        Term::List(Vec::new())
    }

    /// A list built from anything convertible to terms.
    pub fn list<I>(items: I) -> Term
    where
        I: IntoIterator,
        I::Item: Into<Term>,
    {
        Term::List(items.into_iter().map(Into::into).collect())
    }

    /// Whether this term is a variable.
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    /// Whether this term is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Term::List(_))
    }

    /// The entity inside, if this term is one.
    pub fn as_entity(&self) -> Option<Entity> {
        match self {
            Term::Entity(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<Variable> for Term {
    fn from(var: Variable) -> Self {
        Term::Var(var)
    }
}

impl From<Entity> for Term {
    fn from(entity: Entity) -> Self {
        Term::Entity(entity)
    }
}

impl From<Vec<Term>> for Term {
    fn from(items: Vec<Term>) -> Self {
        Term::List(items)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{v:?}"),
            Term::Entity(e) => write!(f, "{e:?}"),
            Term::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Substitutions
// ---------------------------------------------------------------------------

/// One binding.
pub type Substitution = (Term, Term);

/// An ordered association list of bindings. O(n) lookup is adequate at the
/// scales this engine targets and keeps cloning across stream yields cheap
/// to reason about.
pub type Substitutions = Vec<Substitution>;

/// The binding for `key`, if the list holds one.
pub fn assoc<'s>(key: &Term, subs: &'s Substitutions) -> Option<&'s Term> {
    subs.iter()
        .find(|(bound, _)| bound == key)
        .map(|(_, value)| value)
}

/// Resolve `u` through the substitution: variables are followed until a
/// non-variable or an unbound variable is reached.
pub fn find(u: &Term, subs: &Substitutions) -> Term {
    if u.is_var() {
        if let Some(next) = assoc(u, subs) {
            return find(next, subs);
        }
    }
    u.clone()
}

/// Occurs check: whether variable `x` occurs in `u` under `subs`. Recurses
/// into list elements; the empty list is not an occurrence.
pub fn occurs(x: &Term, u: &Term, subs: &Substitutions) -> bool {
    let u = find(u, subs);
    match u {
        Term::Var(_) => x == &u,
        Term::List(items) => items.iter().any(|item| occurs(x, item, subs)),
        Term::Entity(_) => false,
    }
}

/// Extend the substitution with `x -> v`, unless doing so would bind `x`
/// into itself.
pub fn extend_substitutions(
    x: &Term,
    v: &Term,
    subs: &Substitutions,
) -> Option<Substitutions> {
    if occurs(x, v, subs) {
        return None;
    }
    let mut extended = subs.clone();
    extended.push((x.clone(), v.clone()));
    Some(extended)
}

/// Unify `u` and `v` under `subs`, producing the extended substitution on
/// success.
///
/// Both sides are resolved first. Equal terms unify as-is; a variable side
/// extends (after the occurs check); lists unify element-wise and must have
/// equal length, threading the substitution left to right. Everything else
/// fails.
pub fn unify(u: &Term, v: &Term, subs: &Substitutions) -> Option<Substitutions> {
    let u = find(u, subs);
    let v = find(v, subs);
    if u == v {
        return Some(subs.clone());
    }
    if u.is_var() {
        return extend_substitutions(&u, &v, subs);
    }
    if v.is_var() {
        return extend_substitutions(&v, &u, subs);
    }
    if let (Term::List(us), Term::List(vs)) = (&u, &v) {
        if us.len() != vs.len() {
            return None;
        }
        let mut subs = subs.clone();
        for (u, v) in us.iter().zip(vs) {
            subs = unify(u, v, &subs)?;
        }
        return Some(subs);
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ent(raw: u64) -> Term {
        Term::Entity(Entity::from_raw(raw))
    }

    fn var(id: u64) -> Term {
        Term::Var(Variable::new(id))
    }

    #[test]
    fn unify_identical_terms_is_a_noop() {
        let subs = Substitutions::new();
        assert_eq!(unify(&ent(1), &ent(1), &subs), Some(Vec::new()));
        assert_eq!(
            unify(&Term::list([ent(1), ent(2)]), &Term::list([ent(1), ent(2)]), &subs),
            Some(Vec::new())
        );
        assert_eq!(unify(&ent(1), &ent(2), &subs), None);
    }

    #[test]
    fn unify_fresh_variable_extends() {
        let subs = Substitutions::new();
        let extended = unify(&var(0), &ent(7), &subs).unwrap();
        assert_eq!(find(&var(0), &extended), ent(7));
    }

    #[test]
    fn find_follows_chains() {
        let subs = vec![(var(0), var(1)), (var(1), ent(3))];
        assert_eq!(find(&var(0), &subs), ent(3));
        // Unbound variables resolve to themselves.
        assert_eq!(find(&var(9), &subs), var(9));
    }

    #[test]
    fn occurs_check_blocks_self_reference() {
        let subs = Substitutions::new();
        assert_eq!(unify(&var(0), &Term::list([var(0)]), &subs), None);
        // The empty list is not an occurrence.
        assert!(unify(&var(0), &Term::empty_list(), &subs).is_some());
    }

    #[test]
    fn occurs_check_sees_through_bindings() {
        // x -> [y]; unifying y with [x] would tie the knot.
        let subs = vec![(var(0), Term::list([var(1)]))];
        assert_eq!(unify(&var(1), &Term::list([var(0)]), &subs), None);
    }

    #[test]
    fn lists_unify_elementwise() {
        let subs = Substitutions::new();
        let out = unify(
            &Term::list([var(0), ent(2)]),
            &Term::list([ent(1), var(1)]),
            &subs,
        )
        .unwrap();
        assert_eq!(find(&var(0), &out), ent(1));
        assert_eq!(find(&var(1), &out), ent(2));
        // Length mismatch fails.
        assert_eq!(
            unify(&Term::list([ent(1)]), &Term::list([ent(1), ent(2)]), &subs),
            None
        );
    }

    #[test]
    fn shared_variable_threads_through_list_unification() {
        let subs = Substitutions::new();
        let out = unify(
            &Term::list([var(0), var(0)]),
            &Term::list([ent(1), var(1)]),
            &subs,
        )
        .unwrap();
        assert_eq!(find(&var(1), &out), ent(1));
        assert_eq!(
            unify(
                &Term::list([var(0), var(0)]),
                &Term::list([ent(1), ent(2)]),
                &subs
            ),
            None
        );
    }
}
