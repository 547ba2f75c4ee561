//! Property tests for the storage engine.
//!
//! Random sequences of module operations are generated with `proptest` and
//! checked against a simple model: per-entity component values must survive
//! every combination of add/remove/release/sort, and both sorts must keep
//! the index table and the column in agreement.

use std::collections::HashMap;

use proptest::prelude::*;
use relic_ecs::prelude::*;

#[derive(Debug, Clone)]
enum ModuleOp {
    Create,
    Release(usize),
    SetFloat(usize, f32),
    RemoveFloat(usize),
    SortByValue,
    SortMonotonic,
}

/// Finite (non-NaN, non-Inf) f32 values.
fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn module_op_strategy() -> impl Strategy<Value = ModuleOp> {
    prop_oneof![
        3 => Just(ModuleOp::Create),
        1 => (0..100usize).prop_map(ModuleOp::Release),
        4 => (0..100usize, finite_f32()).prop_map(|(i, v)| ModuleOp::SetFloat(i, v)),
        1 => (0..100usize).prop_map(ModuleOp::RemoveFloat),
        1 => Just(ModuleOp::SortByValue),
        1 => Just(ModuleOp::SortMonotonic),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn module_random_ops_preserve_invariants(ops in prop::collection::vec(module_op_strategy(), 1..60)) {
        let mut module = Module::new();
        let mut alive: Vec<Entity> = Vec::new();
        let mut floats: HashMap<Entity, f32> = HashMap::new();

        for op in ops {
            match op {
                ModuleOp::Create => {
                    let e = module.create_entity();
                    prop_assert!(!e.is_null());
                    prop_assert!(!alive.contains(&e), "live id handed out twice");
                    alive.push(e);
                }
                ModuleOp::Release(idx) => {
                    if !alive.is_empty() {
                        let e = alive.remove(idx % alive.len());
                        prop_assert!(module.release_entity(e, true));
                        prop_assert!(!module.release_entity(e, true));
                        floats.remove(&e);
                    }
                }
                ModuleOp::SetFloat(idx, v) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        // Adding over an existing component strands the old
                        // record; remove first, as the contract asks.
                        if module.has_component::<f32>(e) {
                            module.remove_component::<f32>(e);
                        }
                        module.add_component(e, v);
                        floats.insert(e, v);
                    }
                }
                ModuleOp::RemoveFloat(idx) => {
                    if !alive.is_empty() {
                        let e = alive[idx % alive.len()];
                        let removed = module.remove_component::<f32>(e);
                        prop_assert_eq!(removed, floats.remove(&e).is_some());
                    }
                }
                ModuleOp::SortByValue => {
                    module.sort_by_value::<f32>();
                    if let Some(typed) = module.typed_storage::<f32>() {
                        let column = typed.as_slice();
                        for window in column.windows(2) {
                            prop_assert!(window[0] <= window[1], "column not ascending");
                        }
                    }
                }
                ModuleOp::SortMonotonic => {
                    module.sort_monotonic::<f32>();
                    let id = component_id_of::<f32>();
                    for (&e, _) in &floats {
                        prop_assert_eq!(module.record_index(e, id), e.index());
                    }
                }
            }

            // The model agrees with the module after every operation.
            for (&e, &v) in &floats {
                prop_assert_eq!(module.get_component::<f32>(e), Some(&v));
            }
            for &e in &alive {
                prop_assert_eq!(module.has_component::<f32>(e), floats.contains_key(&e));
            }
        }
    }

    #[test]
    fn snapshot_roundtrip_preserves_pod_columns(values in prop::collection::vec(finite_f32(), 1..40)) {
        let mut module = Module::new();
        let mut entities = Vec::new();
        for &v in &values {
            let e = module.create_entity();
            module.add_component(e, v);
            entities.push(e);
        }

        let snapshot = ModuleSnapshot::capture(&module);
        let restored = snapshot.restore().unwrap();
        for (e, &v) in entities.iter().zip(&values) {
            prop_assert_eq!(restored.get_component::<f32>(*e), Some(&v));
        }
    }
}
