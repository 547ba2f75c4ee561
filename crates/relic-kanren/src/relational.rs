//! ECS-aware goals: the module as a facts database.
//!
//! These goals read the module a [`State`] carries -- never mutate it -- and
//! enumerate in ascending entity-id order. Each dispatches on the
//! concreteness of its already-resolved arguments: a concrete side is a
//! membership test, a fresh side enumerates.

use relic_ecs::component::{self, ComponentId};
use relic_ecs::entity::Entity;
use relic_ecs::module::Module;

use crate::goal::{empty_stream, single_stream, Goal, State};
use crate::relation::Relation;
use crate::term::{find, unify, Term, Variable};

/// One state per non-freed entity, binding `var` to it. The reserved
/// invalid entity is included only on request.
pub fn stream_of_all_entities<'m>(var: Variable, include_error: bool) -> Goal<'m> {
    Goal::new(move |state| {
        let State {
            module,
            subst,
            counter,
        } = state;
        let start = usize::from(!include_error);
        Box::new((start..module.entity_count()).filter_map(move |raw| {
            let entity = Entity::from_raw(raw as u64);
            if module.is_free(entity) {
                return None;
            }
            let mut subst = subst.clone();
            subst.push((Term::Var(var), Term::Entity(entity)));
            Some(State {
                module,
                subst,
                counter,
            })
        }))
    })
}

/// The entity bound to `var` owns `component`; with `var` fresh, enumerate
/// every owner instead.
pub fn has_component_id<'m>(var: impl Into<Term>, component: ComponentId) -> Goal<'m> {
    let var = var.into();
    Goal::new(move |state| {
        let walked = find(&var, &state.subst);
        match walked {
            Term::Entity(entity) => {
                if state.module.has_component_id(entity, component) {
                    single_stream(state)
                } else {
                    empty_stream()
                }
            }
            Term::Var(v) => {
                let State {
                    module,
                    subst,
                    counter,
                } = state;
                Box::new(module.owners_of(component).map(move |entity| {
                    let mut subst = subst.clone();
                    subst.push((Term::Var(v), Term::Entity(entity)));
                    State {
                        module,
                        subst,
                        counter,
                    }
                }))
            }
            Term::List(_) => empty_stream(),
        }
    })
}

/// Typed convenience over [`has_component_id`].
pub fn has_component<'m, T: 'static>(var: impl Into<Term>) -> Goal<'m> {
    has_component_id(var, component::component_id_of::<T>())
}

fn related_of<R: Relation>(module: &Module, entity: Entity) -> Option<Vec<Term>> {
    module.get_component::<R>(entity).map(Relation::related)
}

/// `relate` is one of the entries of `base`'s `R` relation.
///
/// Four-way dispatch on concreteness: both fresh enumerates every
/// `(owner, entry)` pair; a fresh base enumerates owners whose entries
/// contain the concrete `relate`; a fresh `relate` enumerates the concrete
/// base's entries; both concrete is a membership test.
pub fn related_entities<'m, R: Relation>(
    base: impl Into<Term>,
    relate: impl Into<Term>,
) -> Goal<'m> {
    let (base, relate) = (base.into(), relate.into());
    Goal::new(move |state| {
        let base_w = find(&base, &state.subst);
        let relate_w = find(&relate, &state.subst);
        match (base_w, relate_w) {
            (Term::Var(base_var), Term::Var(relate_var)) => {
                let State {
                    module,
                    subst,
                    counter,
                } = state;
                Box::new((0..module.entity_count()).flat_map(move |raw| {
                    let entity = Entity::from_raw(raw as u64);
                    let mut states = Vec::new();
                    if let Some(related) = related_of::<R>(module, entity) {
                        for entry in related {
                            let mut subst = subst.clone();
                            subst.push((Term::Var(base_var), Term::Entity(entity)));
                            subst.push((Term::Var(relate_var), entry));
                            states.push(State {
                                module,
                                subst,
                                counter,
                            });
                        }
                    }
                    states.into_iter()
                }))
            }
            (Term::Var(base_var), relate_w @ (Term::Entity(_) | Term::List(_))) => {
                let State {
                    module,
                    subst,
                    counter,
                } = state;
                Box::new((0..module.entity_count()).flat_map(move |raw| {
                    let entity = Entity::from_raw(raw as u64);
                    let mut states = Vec::new();
                    if let Some(related) = related_of::<R>(module, entity) {
                        for entry in related {
                            if entry == relate_w {
                                let mut subst = subst.clone();
                                subst.push((Term::Var(base_var), Term::Entity(entity)));
                                states.push(State {
                                    module,
                                    subst,
                                    counter,
                                });
                            }
                        }
                    }
                    states.into_iter()
                }))
            }
            (Term::Entity(entity), Term::Var(relate_var)) => {
                let Some(related) = related_of::<R>(state.module, entity) else {
                    return empty_stream();
                };
                let State {
                    module,
                    subst,
                    counter,
                } = state;
                Box::new(related.into_iter().map(move |entry| {
                    let mut subst = subst.clone();
                    subst.push((Term::Var(relate_var), entry));
                    State {
                        module,
                        subst,
                        counter,
                    }
                }))
            }
            (Term::Entity(entity), relate_w) => {
                match related_of::<R>(state.module, entity) {
                    Some(related) if related.contains(&relate_w) => single_stream(state),
                    _ => empty_stream(),
                }
            }
            (Term::List(_), _) => empty_stream(),
        }
    })
}

/// Reduce a term to a list of entity terms, resolving each element through
/// the substitution. Fails when any element is not (bound to) an entity.
fn materialize_list(term: &Term, state: &State<'_>) -> Option<Vec<Term>> {
    match term {
        Term::Var(_) => None,
        Term::Entity(e) => Some(vec![Term::Entity(*e)]),
        Term::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match find(item, &state.subst) {
                    Term::Entity(e) => out.push(Term::Entity(e)),
                    _ => return None,
                }
            }
            Some(out)
        }
    }
}

/// `relate` unifies against the *entire* `R` entry list of `base`.
///
/// With both sides fresh, every owner yields its whole list; with a
/// concrete list, owners whose list unifies are enumerated (for non-term
/// relations the list must first reduce to entities); with a concrete base,
/// the list is produced or matched directly.
pub fn related_entities_list<'m, R: Relation>(
    base: impl Into<Term>,
    relate: impl Into<Term>,
) -> Goal<'m> {
    let (base, relate) = (base.into(), relate.into());
    Goal::new(move |state| {
        let base_w = find(&base, &state.subst);
        let relate_w = find(&relate, &state.subst);
        match (base_w, relate_w) {
            (Term::Var(base_var), Term::Var(relate_var)) => {
                let State {
                    module,
                    subst,
                    counter,
                } = state;
                Box::new((0..module.entity_count()).filter_map(move |raw| {
                    let entity = Entity::from_raw(raw as u64);
                    let related = related_of::<R>(module, entity)?;
                    if related.is_empty() {
                        return None;
                    }
                    let mut subst = subst.clone();
                    subst.push((Term::Var(base_var), Term::Entity(entity)));
                    subst.push((Term::Var(relate_var), Term::List(related)));
                    Some(State {
                        module,
                        subst,
                        counter,
                    })
                }))
            }
            (Term::Var(base_var), Term::List(items)) => {
                let target = if R::CAN_BE_TERM {
                    items
                } else {
                    // A list the engine cannot reduce to entities matches
                    // nothing in the component store.
                    match materialize_list(&Term::List(items), &state) {
                        Some(target) => target,
                        None => return empty_stream(),
                    }
                };
                let State {
                    module,
                    subst,
                    counter,
                } = state;
                Box::new((0..module.entity_count()).filter_map(move |raw| {
                    let entity = Entity::from_raw(raw as u64);
                    let related = related_of::<R>(module, entity)?;
                    let mut subst =
                        unify(&Term::List(target.clone()), &Term::List(related), &subst)?;
                    subst.push((Term::Var(base_var), Term::Entity(entity)));
                    Some(State {
                        module,
                        subst,
                        counter,
                    })
                }))
            }
            (Term::Entity(entity), Term::Var(relate_var)) => {
                match related_of::<R>(state.module, entity) {
                    Some(related) if !related.is_empty() => {
                        let mut subst = state.subst.clone();
                        subst.push((Term::Var(relate_var), Term::List(related)));
                        single_stream(state.with_subst(subst))
                    }
                    _ => empty_stream(),
                }
            }
            (Term::Entity(entity), Term::List(items)) => {
                let Some(related) = related_of::<R>(state.module, entity) else {
                    return empty_stream();
                };
                match unify(
                    &Term::List(items),
                    &Term::List(related),
                    &state.subst,
                ) {
                    Some(subst) => single_stream(state.with_subst(subst)),
                    None => empty_stream(),
                }
            }
            _ => empty_stream(),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
