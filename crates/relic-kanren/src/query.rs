//! Surface query API: iterate a goal's stream and harvest bindings.
//!
//! A goal yields states; each state is a substitution snapshot. These
//! helpers flatten that into `(variable, value)` pairs -- every pair, or
//! deduplicated across the whole stream -- and resolve single variables.
//! All of them are lazy: dropping the iterator cancels the goal tree.

use std::collections::HashSet;

use crate::goal::{Goal, State};
use crate::term::{find, Substitution, Term, Variable};

/// Every binding pair from every state the goal yields, in stream order.
pub fn all_substitutions<'m>(
    goal: &Goal<'m>,
    state: State<'m>,
) -> impl Iterator<Item = Substitution> + 'm {
    goal.call(state).flat_map(|state| state.subst.into_iter())
}

/// Binding pairs deduplicated across the whole stream, in first-seen order.
pub fn unique_substitutions<'m>(
    goal: &Goal<'m>,
    state: State<'m>,
) -> impl Iterator<Item = Substitution> + 'm {
    let mut seen: HashSet<Substitution> = HashSet::new();
    goal.call(state)
        .flat_map(|state| state.subst.into_iter())
        .filter(move |pair| seen.insert(pair.clone()))
}

/// The resolved value of `var` in each yielded state, deduplicated.
///
/// States where `var` is still unbound are skipped.
pub fn solutions_for<'m>(
    goal: &Goal<'m>,
    state: State<'m>,
    var: Variable,
) -> impl Iterator<Item = Term> + 'm {
    let mut seen: HashSet<Term> = HashSet::new();
    goal.call(state).filter_map(move |state| {
        let value = find(&Term::Var(var), &state.subst);
        if value == Term::Var(var) {
            return None;
        }
        seen.insert(value.clone()).then_some(value)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{disjunction, eq, ModuleExt};
    use relic_ecs::entity::Entity;
    use relic_ecs::module::Module;

    fn ent(raw: u64) -> Term {
        Term::Entity(Entity::from_raw(raw))
    }

    #[test]
    fn unique_substitutions_deduplicate_across_states() {
        let module = Module::new();
        let x = module.next_logic_variable();
        // Both branches produce the same binding.
        let goal = disjunction(eq(x, ent(1)), eq(x, ent(1)));
        assert_eq!(all_substitutions(&goal, module.logic_state()).count(), 2);
        assert_eq!(
            unique_substitutions(&goal, module.logic_state()).count(),
            1
        );
    }

    #[test]
    fn solutions_resolve_and_deduplicate() {
        let module = Module::new();
        let x = module.next_logic_variable();
        let goal = disjunction(
            eq(x, ent(1)),
            disjunction(eq(x, ent(2)), eq(x, ent(1))),
        );
        let solutions: Vec<Term> =
            solutions_for(&goal, module.logic_state(), x).collect();
        assert_eq!(solutions, vec![ent(1), ent(2)]);
    }
}
