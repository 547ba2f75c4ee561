//! Goals and the lazy state stream.
//!
//! A [`Goal`] is a pure function from a [`State`] to a lazy stream of
//! states. The stream model carries the whole search strategy:
//! [`disjunction`] merges its two streams in strict round-robin so an
//! infinite left stream cannot starve the right, and [`fresh`] defers its
//! body until the stream is first pulled, which is the lazy point that
//! keeps recursively defined goals productive. Dropping a stream cancels
//! the entire tree; goals hold nothing but terms across yields.

use std::rc::Rc;

use relic_ecs::module::Module;

use crate::term::{unify, Substitutions, Term, Variable};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// One point in the search: the module under query, a substitution
/// snapshot, and the fresh-variable counter.
#[derive(Clone)]
pub struct State<'m> {
    /// The facts database. Shared-borrowed for the life of the query, which
    /// statically rules out mutation while a stream is alive.
    pub module: &'m Module,
    /// Bindings accumulated on this branch.
    pub subst: Substitutions,
    /// Fresh-variable generator.
    pub counter: u64,
}

impl<'m> State<'m> {
    /// A fresh state over `module`. The counter starts at the module's
    /// variable watermark so pre-reserved variables are never recycled.
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            subst: Substitutions::new(),
            counter: module.variable_id_watermark(),
        }
    }

    /// Allocate the next fresh variable on this branch.
    pub fn fresh_variable(&mut self) -> Variable {
        let var = Variable::new(self.counter);
        self.counter += 1;
        var
    }

    /// The same branch with a different substitution.
    pub fn with_subst(&self, subst: Substitutions) -> State<'m> {
        State {
            module: self.module,
            subst,
            counter: self.counter,
        }
    }
}

/// Extra module surface used by the query layer.
pub trait ModuleExt {
    /// Reserve a logic variable tied to this module's counter, usable in
    /// goals evaluated against any [`State`] created later.
    fn next_logic_variable(&self) -> Variable;

    /// A fresh query state over this module.
    fn logic_state(&self) -> State<'_>;
}

impl ModuleExt for Module {
    fn next_logic_variable(&self) -> Variable {
        Variable::new(self.next_variable_id())
    }

    fn logic_state(&self) -> State<'_> {
        State::new(self)
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// A lazy stream of states.
pub type StateStream<'m> = Box<dyn Iterator<Item = State<'m>> + 'm>;

/// An empty stream.
pub fn empty_stream<'m>() -> StateStream<'m> {
    Box::new(std::iter::empty())
}

/// A one-state stream.
pub fn single_stream(state: State<'_>) -> StateStream<'_> {
    Box::new(std::iter::once(state))
}

/// A stream whose construction is postponed until the first pull.
///
/// This is what makes recursion through [`fresh`] productive: building the
/// goal tree for the next level costs nothing until the consumer actually
/// asks for a state from it.
pub fn deferred_stream<'m>(thunk: impl FnOnce() -> StateStream<'m> + 'm) -> StateStream<'m> {
    Box::new(Deferred {
        thunk: Some(Box::new(thunk)),
        stream: None,
    })
}

struct Deferred<'m> {
    thunk: Option<Box<dyn FnOnce() -> StateStream<'m> + 'm>>,
    stream: Option<StateStream<'m>>,
}

impl<'m> Iterator for Deferred<'m> {
    type Item = State<'m>;

    fn next(&mut self) -> Option<State<'m>> {
        if self.stream.is_none() {
            let thunk = self.thunk.take()?;
            self.stream = Some(thunk());
        }
        self.stream.as_mut()?.next()
    }
}

/// Round-robin merge of two streams: one element from each live side per
/// cycle, degenerating to pass-through once a side is exhausted.
struct Interleave<'m> {
    left: Option<StateStream<'m>>,
    right: Option<StateStream<'m>>,
    take_left: bool,
}

impl<'m> Iterator for Interleave<'m> {
    type Item = State<'m>;

    fn next(&mut self) -> Option<State<'m>> {
        loop {
            let pick_left = match (self.left.is_some(), self.right.is_some()) {
                (false, false) => return None,
                (true, false) => true,
                (false, true) => false,
                (true, true) => self.take_left,
            };
            if self.left.is_some() && self.right.is_some() {
                self.take_left = !pick_left;
            }
            let side = if pick_left {
                &mut self.left
            } else {
                &mut self.right
            };
            match side.as_mut().expect("side picked above").next() {
                Some(state) => return Some(state),
                None => *side = None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// A pure function from state to lazy state stream.
///
/// Cheaply cloneable: goals are shared across branches (conjunction calls
/// its right operand once per state of the left).
#[derive(Clone)]
pub struct Goal<'m> {
    run: Rc<dyn Fn(State<'m>) -> StateStream<'m> + 'm>,
}

impl<'m> Goal<'m> {
    /// Wrap a stream function as a goal.
    pub fn new(run: impl Fn(State<'m>) -> StateStream<'m> + 'm) -> Self {
        Self { run: Rc::new(run) }
    }

    /// A goal that yields at most one state.
    pub fn from_option(run: impl Fn(State<'m>) -> Option<State<'m>> + 'm) -> Self {
        Self::new(move |state| match run(state) {
            Some(state) => single_stream(state),
            None => empty_stream(),
        })
    }

    /// Evaluate the goal against a state.
    pub fn call(&self, state: State<'m>) -> StateStream<'m> {
        (self.run)(state)
    }
}

impl std::fmt::Debug for Goal<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Goal")
    }
}

// ---------------------------------------------------------------------------
// Micro combinators
// ---------------------------------------------------------------------------

/// The goal that yields its state once.
pub fn succeed<'m>() -> Goal<'m> {
    Goal::new(single_stream)
}

/// The goal that yields nothing.
pub fn fail<'m>() -> Goal<'m> {
    Goal::new(|_| empty_stream())
}

/// Unify two terms; yield the extended state on success.
pub fn eq<'m>(u: impl Into<Term>, v: impl Into<Term>) -> Goal<'m> {
    let (u, v) = (u.into(), v.into());
    Goal::from_option(move |state| {
        unify(&u, &v, &state.subst).map(|subst| state.with_subst(subst))
    })
}

/// Yield the state unchanged iff `condition` holds.
pub fn condition<'m>(condition: bool) -> Goal<'m> {
    Goal::from_option(move |state| condition.then_some(state))
}

/// Allocate a fresh variable and delegate to the goal `body` builds for it.
///
/// The body runs lazily, on first pull of the resulting stream.
pub fn fresh<'m>(body: impl Fn(Variable) -> Goal<'m> + 'm) -> Goal<'m> {
    let body = Rc::new(body);
    Goal::new(move |state| {
        let body = body.clone();
        deferred_stream(move || {
            let mut state = state;
            let var = state.fresh_variable();
            body(var).call(state)
        })
    })
}

/// Two fresh variables.
pub fn fresh2<'m>(body: impl Fn(Variable, Variable) -> Goal<'m> + 'm) -> Goal<'m> {
    let body = Rc::new(body);
    fresh(move |a| {
        let body = body.clone();
        fresh(move |b| body(a, b))
    })
}

/// Three fresh variables.
pub fn fresh3<'m>(body: impl Fn(Variable, Variable, Variable) -> Goal<'m> + 'm) -> Goal<'m> {
    let body = Rc::new(body);
    fresh2(move |a, b| {
        let body = body.clone();
        fresh(move |c| body(a, b, c))
    })
}

/// Four fresh variables.
pub fn fresh4<'m>(
    body: impl Fn(Variable, Variable, Variable, Variable) -> Goal<'m> + 'm,
) -> Goal<'m> {
    let body = Rc::new(body);
    fresh3(move |a, b, c| {
        let body = body.clone();
        fresh(move |d| body(a, b, c, d))
    })
}

/// Interleaving disjunction: round-robin over both streams so an infinite
/// left operand cannot starve the right. This is what keeps recursive
/// relations productive.
pub fn disjunction<'m>(g1: Goal<'m>, g2: Goal<'m>) -> Goal<'m> {
    Goal::new(move |state| {
        Box::new(Interleave {
            left: Some(g1.call(state.clone())),
            right: Some(g2.call(state)),
            take_left: true,
        })
    })
}

/// Conjunction: stream `g2` over every state `g1` yields. Order follows the
/// left operand, nested by the right.
pub fn conjunction<'m>(g1: Goal<'m>, g2: Goal<'m>) -> Goal<'m> {
    Goal::new(move |state| {
        let g2 = g2.clone();
        Box::new(g1.call(state).flat_map(move |s| g2.call(s)))
    })
}

/// Variadic [`disjunction`], folded right.
#[macro_export]
macro_rules! disj {
    ($goal:expr $(,)?) => { $goal };
    ($goal:expr, $($rest:expr),+ $(,)?) => {
        $crate::goal::disjunction($goal, $crate::disj!($($rest),+))
    };
}

/// Variadic [`conjunction`], folded right.
#[macro_export]
macro_rules! conj {
    ($goal:expr $(,)?) => { $goal };
    ($goal:expr, $($rest:expr),+ $(,)?) => {
        $crate::goal::conjunction($goal, $crate::conj!($($rest),+))
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::find;
    use relic_ecs::entity::Entity;

    fn ent(raw: u64) -> Term {
        Term::Entity(Entity::from_raw(raw))
    }

    #[test]
    fn succeed_yields_once_fail_yields_nothing() {
        let module = Module::new();
        assert_eq!(succeed().call(State::new(&module)).count(), 1);
        assert_eq!(fail().call(State::new(&module)).count(), 0);
    }

    #[test]
    fn eq_extends_the_substitution() {
        let module = Module::new();
        let x = Variable::new(100);
        let states: Vec<_> = eq(x, ent(3)).call(State::new(&module)).collect();
        assert_eq!(states.len(), 1);
        assert_eq!(find(&Term::Var(x), &states[0].subst), ent(3));
        assert_eq!(eq(ent(1), ent(2)).call(State::new(&module)).count(), 0);
    }

    #[test]
    fn fresh_allocates_distinct_variables() {
        let module = Module::new();
        let goal = fresh2(|a, b| conj!(condition(a != b), eq(a, ent(1)), eq(b, ent(2))));
        assert_eq!(goal.call(State::new(&module)).count(), 1);
    }

    #[test]
    fn fresh_respects_the_module_watermark() {
        let module = Module::new();
        let reserved = module.next_logic_variable();
        let goal = fresh(move |fresh_var| condition(fresh_var != reserved));
        assert_eq!(goal.call(module.logic_state()).count(), 1);
    }

    #[test]
    fn conjunction_threads_states() {
        let module = Module::new();
        let x = Variable::new(200);
        let y = Variable::new(201);
        let goal = conj!(eq(x, ent(1)), eq(y, ent(2)));
        let states: Vec<_> = goal.call(State::new(&module)).collect();
        assert_eq!(states.len(), 1);
        assert_eq!(find(&Term::Var(x), &states[0].subst), ent(1));
        assert_eq!(find(&Term::Var(y), &states[0].subst), ent(2));
        // A failing right operand empties the stream.
        assert_eq!(
            conj!(eq(x, ent(1)), eq(x, ent(2)))
                .call(State::new(&module))
                .count(),
            0
        );
    }

    #[test]
    fn disjunction_interleaves_round_robin() {
        let module = Module::new();
        let x = Variable::new(300);
        let left = disj!(eq(x, ent(1)), eq(x, ent(2)));
        let right = disj!(eq(x, ent(3)), eq(x, ent(4)));
        let order: Vec<Term> = disjunction(left, right)
            .call(State::new(&module))
            .map(|s| find(&Term::Var(x), &s.subst))
            .collect();
        // Outer alternation first, nested alternation below it.
        assert_eq!(order, vec![ent(1), ent(3), ent(2), ent(4)]);
    }

    /// An infinite stream: yields its state, then recurses.
    fn forever<'m>(x: Term) -> Goal<'m> {
        fresh(move |_| disjunction(eq(x.clone(), x.clone()), forever(x.clone())))
    }

    #[test]
    fn infinite_left_stream_does_not_starve_the_right() {
        let module = Module::new();
        let x = Variable::new(400);
        let goal = disjunction(forever(Term::Var(x)), eq(x, ent(42)));
        let found = goal
            .call(State::new(&module))
            .take(4)
            .any(|s| find(&Term::Var(x), &s.subst) == ent(42));
        assert!(found, "one-shot result must surface within a bounded prefix");
    }

    #[test]
    fn dropping_the_stream_cancels_evaluation() {
        let module = Module::new();
        let x = Variable::new(500);
        let mut stream = forever(Term::Var(x)).call(State::new(&module));
        assert!(stream.next().is_some());
        drop(stream);
    }
}
