//! List goals.
//!
//! Each goal resolves its arguments through the current substitution and
//! branches on the variant tag: variable-plus-concrete cases unify against a
//! list built from the concrete side, list-plus-list cases split or unify
//! structurally, and a bare entity is treated as a singleton list wherever
//! the context demands a list.

use std::rc::Rc;

use crate::goal::{empty_stream, fresh, fresh4, single_stream, Goal, State, StateStream};
use crate::term::{find, unify, Substitutions, Term};
use crate::{conj, disj};

fn unified<'m>(state: &State<'m>, subst: Option<Substitutions>) -> StateStream<'m> {
    match subst {
        Some(subst) => single_stream(state.with_subst(subst)),
        None => empty_stream(),
    }
}

/// `out` is the first element of `list`.
pub fn split_head<'m>(list: impl Into<Term>, out: impl Into<Term>) -> Goal<'m> {
    let (list, out) = (list.into(), out.into());
    Goal::new(move |state| {
        let out_w = find(&out, &state.subst);
        let list_w = find(&list, &state.subst);
        let subst = match &list_w {
            Term::Var(_) => unify(&Term::List(vec![out_w]), &list_w, &state.subst),
            Term::Entity(_) => unify(&out, &list_w, &state.subst),
            Term::List(items) => items
                .first()
                .and_then(|head| unify(&out_w, head, &state.subst)),
        };
        unified(&state, subst)
    })
}

/// `out` is `list` without its first element.
///
/// For a two-element list and a non-list `out`, the tail unifies as the
/// bare last element; [`wrap_list`] turns that back into a singleton list
/// where one is required (see [`split_tail_ensure_list`]).
pub fn split_tail<'m>(list: impl Into<Term>, out: impl Into<Term>) -> Goal<'m> {
    let (list, out) = (list.into(), out.into());
    Goal::new(move |state| {
        let out_w = find(&out, &state.subst);
        let list_w = find(&list, &state.subst);
        let subst = match &list_w {
            Term::Var(_) => unify(&out_w, &list_w, &state.subst),
            Term::Entity(_) => unify(
                &out_w,
                &Term::List(vec![list_w.clone()]),
                &state.subst,
            ),
            Term::List(items) => {
                if items.len() <= 1 {
                    unify(&out_w, &Term::empty_list(), &state.subst)
                } else if items.len() == 2 && !out.is_list() {
                    unify(&out_w, &items[1], &state.subst)
                } else {
                    unify(&out_w, &Term::List(items[1..].to_vec()), &state.subst)
                }
            }
        };
        unified(&state, subst)
    })
}

/// `list` is `var` boxed into a singleton list when `var` is not already a
/// list, and `var` itself otherwise.
pub fn wrap_list<'m>(var: impl Into<Term>, list: impl Into<Term>) -> Goal<'m> {
    let (var, list) = (var.into(), list.into());
    Goal::new(move |state| {
        let var_w = find(&var, &state.subst);
        let list_w = find(&list, &state.subst);
        let subst = match &var_w {
            Term::Var(_) | Term::Entity(_) => unify(
                &list_w,
                &Term::List(vec![var_w.clone()]),
                &state.subst,
            ),
            Term::List(_) => unify(&list_w, &var_w, &state.subst),
        };
        unified(&state, subst)
    })
}

/// [`split_tail`] whose output is always a proper list.
pub fn split_tail_ensure_list<'m>(list: impl Into<Term>, out: impl Into<Term>) -> Goal<'m> {
    let (list, out) = (list.into(), out.into());
    fresh(move |tmp| conj!(split_tail(list.clone(), tmp), wrap_list(tmp, out.clone())))
}

/// `head` and `tail` split `list` at its first element.
pub fn split_head_and_tail<'m>(
    list: impl Into<Term>,
    head: impl Into<Term>,
    tail: impl Into<Term>,
) -> Goal<'m> {
    let (list, head, tail) = (list.into(), head.into(), tail.into());
    Goal::new(move |state| {
        let list_w = find(&list, &state.subst);
        let head_w = find(&head, &state.subst);
        let tail_w = find(&tail, &state.subst);

        match (&list_w, &tail_w) {
            // Known tail, unknown list: build the list from the pieces.
            (Term::Var(_), Term::List(items)) => {
                let mut full = Vec::with_capacity(items.len() + 1);
                full.push(head_w);
                full.extend(items.iter().cloned());
                unified(&state, unify(&Term::List(full), &list_w, &state.subst))
            }
            // Both unknown: the only consistent split is a singleton list.
            (Term::Var(_), Term::Var(_)) => {
                match unify(&Term::empty_list(), &tail_w, &state.subst) {
                    Some(subst) => split_head(list_w.clone(), head_w).call(state.with_subst(subst)),
                    None => empty_stream(),
                }
            }
            _ => conj!(
                split_head(list_w.clone(), head_w),
                split_tail_ensure_list(list_w.clone(), tail_w.clone())
            )
            .call(state),
        }
    })
}

/// `out` is the concatenation of `a` and `b`.
///
/// Invertible: with `a` and `b` both fresh and `out` known, every split of
/// `out` into a prefix and a suffix is enumerated, empty ends included.
pub fn append<'m>(
    a: impl Into<Term>,
    b: impl Into<Term>,
    out: impl Into<Term>,
) -> Goal<'m> {
    let (a, b, out) = (a.into(), b.into(), out.into());
    Goal::new(move |state| {
        let promote = |term: Term| {
            if term.as_entity().is_some() {
                Term::List(vec![term])
            } else {
                term
            }
        };
        let a_w = promote(find(&a, &state.subst));
        let b_w = promote(find(&b, &state.subst));
        let out_w = promote(find(&out, &state.subst));

        if let (Term::List(al), Term::List(bl)) = (&a_w, &b_w) {
            let mut joined = al.clone();
            joined.extend(bl.iter().cloned());
            return unified(&state, unify(&Term::List(joined), &out, &state.subst));
        }

        if a_w.is_var() && b_w.is_var() {
            if let Term::List(full) = &out_w {
                let mut states = Vec::new();
                for split in 0..=full.len() {
                    let prefix = Term::List(full[..split].to_vec());
                    let suffix = Term::List(full[split..].to_vec());
                    if let Some(subst) = unify(&a, &prefix, &state.subst) {
                        if let Some(subst) = unify(&b, &suffix, &subst) {
                            states.push(state.with_subst(subst));
                        }
                    }
                }
                return Box::new(states.into_iter());
            }
        }

        if let (Term::List(al), Term::List(full)) = (&a_w, &out_w) {
            if al.len() > full.len() {
                return empty_stream();
            }
            let prefix = Term::List(full[..al.len()].to_vec());
            let suffix = Term::List(full[al.len()..].to_vec());
            let subst = unify(&a, &prefix, &state.subst)
                .and_then(|subst| unify(&b, &suffix, &subst));
            return unified(&state, subst);
        }

        if let (Term::List(bl), Term::List(full)) = (&b_w, &out_w) {
            if bl.len() > full.len() {
                return empty_stream();
            }
            let split = full.len() - bl.len();
            let prefix = Term::List(full[..split].to_vec());
            let suffix = Term::List(full[split..].to_vec());
            let subst = unify(&a, &prefix, &state.subst)
                .and_then(|subst| unify(&b, &suffix, &subst));
            return unified(&state, subst);
        }

        empty_stream()
    })
}

/// `element` is a member of `list`.
///
/// A concrete element may also unify into an unbound variable slot of the
/// list, which is how polymorphic positions get resolved.
pub fn element_of<'m>(list: impl Into<Term>, element: impl Into<Term>) -> Goal<'m> {
    let (list, element) = (list.into(), element.into());
    Goal::new(move |state| {
        let list_w = find(&list, &state.subst);
        let element_w = find(&element, &state.subst);
        match &list_w {
            Term::Var(_) | Term::Entity(_) => {
                unified(&state, unify(&list_w, &element_w, &state.subst))
            }
            Term::List(items) => {
                let element_is_var = element_w.is_var();
                let mut states = Vec::new();
                for item in items {
                    if element_is_var || *item == element_w {
                        let mut subst = state.subst.clone();
                        subst.push((element_w.clone(), item.clone()));
                        states.push(state.with_subst(subst));
                    } else if item.is_var() {
                        let mut subst = state.subst.clone();
                        subst.push((item.clone(), element_w.clone()));
                        states.push(state.with_subst(subst));
                    }
                }
                Box::new(states.into_iter())
            }
        }
    })
}

/// Element-wise relational map: `b[i]` relates to `a[i]` through `relate`
/// for every position, and the lists have equal length.
pub fn map<'m>(
    a: impl Into<Term>,
    b: impl Into<Term>,
    relate: impl Fn(Term, Term) -> Goal<'m> + 'm,
) -> Goal<'m> {
    map_shared(a.into(), b.into(), Rc::new(relate))
}

fn map_shared<'m>(
    a: Term,
    b: Term,
    relate: Rc<dyn Fn(Term, Term) -> Goal<'m> + 'm>,
) -> Goal<'m> {
    fresh4(move |a_head, a_tail, b_head, b_tail| {
        let relate = relate.clone();
        disj!(
            conj!(
                eq_empty(a.clone()),
                eq_empty(b.clone())
            ),
            conj!(
                split_head(a.clone(), a_head),
                split_tail_ensure_list(a.clone(), a_tail),
                relate(Term::Var(a_head), Term::Var(b_head)),
                map_shared(Term::Var(a_tail), Term::Var(b_tail), relate.clone()),
                append(b_head, b_tail, b.clone())
            )
        )
    })
}

fn eq_empty<'m>(term: Term) -> Goal<'m> {
    crate::goal::eq(term, Term::empty_list())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
