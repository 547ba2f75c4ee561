//! A little polymorphic typechecker driven entirely by relational goals.
//!
//! Types, values, functions, and call sites are all entities; the typing
//! rules are relation components over them. Solving the goal unifies the
//! function's type variables with the argument types.

use relic_ecs::prelude::*;
use relic_kanren::prelude::*;
use relic_kanren::{conj, relation};

relation! {
    /// Index 0 is the return type; the rest are parameter types. Entries
    /// are terms so a signature can carry type variables.
    struct FunctionTypes(Vec<Term>);
}

relation! {
    /// Call-site arguments, in positional order.
    struct Arguments(Vec<Entity>);
}

relation! {
    /// The function a call site targets.
    struct CallTarget([Entity; 1]);
}

relation! {
    /// A value's type. Term-capable so polymorphic values stay open.
    struct TypeOf([Term; 1]);
}

/// The call's argument types unify position-wise with the function's
/// parameter types.
fn typecheck_call<'m>(function: Entity, call: Entity) -> Goal<'m> {
    fresh4(move |func_type, param_types, args, arg_types| {
        conj!(
            related_entities_list::<FunctionTypes>(function, func_type),
            split_tail_ensure_list(Term::Var(func_type), param_types),
            related_entities_list::<Arguments>(call, args),
            map(Term::Var(args), Term::Var(arg_types), |value, ty| {
                related_entities::<TypeOf>(value, ty)
            }),
            eq(param_types, arg_types)
        )
    })
}

#[test]
fn calling_a_polymorphic_function_binds_its_type_variable() {
    let mut module = Module::new();
    let i32_type = module.create_entity();

    let a = module.create_entity();
    module.add_component(a, TypeOf([Term::Entity(i32_type)]));
    let b = module.create_entity();
    module.add_component(b, TypeOf([Term::Entity(i32_type)]));

    // add : (T, T) -> T
    let t = module.next_logic_variable();
    let add = module.create_entity();
    module.add_component(
        add,
        FunctionTypes(vec![Term::Var(t), Term::Var(t), Term::Var(t)]),
    );

    // call = add(a, b)
    let call = module.create_entity();
    module.add_component(call, CallTarget([add]));
    module.add_component(call, Arguments(vec![a, b]));

    let goal = typecheck_call(add, call);
    let solutions: Vec<Term> =
        solutions_for(&goal, module.logic_state(), t).collect();
    assert_eq!(solutions, vec![Term::Entity(i32_type)]);
}

#[test]
fn mismatched_argument_types_fail_to_check() {
    let mut module = Module::new();
    let i32_type = module.create_entity();
    let u8_type = module.create_entity();

    let a = module.create_entity();
    module.add_component(a, TypeOf([Term::Entity(i32_type)]));
    let b = module.create_entity();
    module.add_component(b, TypeOf([Term::Entity(u8_type)]));

    // add : (T, T) -> T demands both arguments share a type.
    let t = module.next_logic_variable();
    let add = module.create_entity();
    module.add_component(
        add,
        FunctionTypes(vec![Term::Var(t), Term::Var(t), Term::Var(t)]),
    );

    let call = module.create_entity();
    module.add_component(call, CallTarget([add]));
    module.add_component(call, Arguments(vec![a, b]));

    let goal = typecheck_call(add, call);
    assert_eq!(goal.call(module.logic_state()).count(), 0);
}

#[test]
fn monomorphic_signatures_check_against_exact_types() {
    let mut module = Module::new();
    let i32_type = module.create_entity();
    let bool_type = module.create_entity();

    let a = module.create_entity();
    module.add_component(a, TypeOf([Term::Entity(i32_type)]));
    let b = module.create_entity();
    module.add_component(b, TypeOf([Term::Entity(i32_type)]));

    // less_than : (i32, i32) -> bool
    let less_than = module.create_entity();
    module.add_component(
        less_than,
        FunctionTypes(vec![
            Term::Entity(bool_type),
            Term::Entity(i32_type),
            Term::Entity(i32_type),
        ]),
    );

    let call = module.create_entity();
    module.add_component(call, CallTarget([less_than]));
    module.add_component(call, Arguments(vec![a, b]));

    assert_eq!(
        typecheck_call(less_than, call)
            .call(module.logic_state())
            .count(),
        1
    );
}

#[test]
fn the_call_target_relation_resolves_the_function() {
    let mut module = Module::new();
    let i32_type = module.create_entity();
    let a = module.create_entity();
    module.add_component(a, TypeOf([Term::Entity(i32_type)]));

    let t = module.next_logic_variable();
    let id = module.create_entity();
    module.add_component(id, FunctionTypes(vec![Term::Var(t), Term::Var(t)]));

    let call = module.create_entity();
    module.add_component(call, CallTarget([id]));
    module.add_component(call, Arguments(vec![a]));

    // Resolve the target through the relation instead of naming it.
    let target = module.next_logic_variable();
    let goal = conj!(
        related_entities::<CallTarget>(call, target),
        eq(target, Term::Entity(id))
    );
    assert_eq!(goal.call(module.logic_state()).count(), 1);

    let solutions: Vec<Term> =
        solutions_for(&typecheck_call(id, call), module.logic_state(), t).collect();
    assert_eq!(solutions, vec![Term::Entity(i32_type)]);
}
