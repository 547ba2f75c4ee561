//! C-ABI surface for embedders.
//!
//! A thin wrapper over the `relic-ecs` module API: modules are heap-owned
//! and passed as opaque pointers, entities are `u64`, component ids are
//! `size_t` with all-ones as the "not found" sentinel, and component
//! records are raw byte pointers of a caller-declared element size.
//! Columns created through this surface treat records as plain bytes --
//! the embedder owns their meaning.
//!
//! Name strings returned by [`component_id_name`] stay valid until
//! [`component_id_free_maps`] is called.

use std::collections::HashMap;
use std::ffi::{c_char, CStr, CString};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use relic_ecs::component::{self, ComponentId};
use relic_ecs::entity::Entity;
use relic_ecs::module::Module;

/// C copies of registered names, keyed by component id. Kept alive here so
/// the returned pointers outlive the call.
static NAME_CACHE: Lazy<Mutex<HashMap<usize, CString>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Create a module. Free it with [`module_free`].
#[no_mangle]
pub extern "C" fn module_initialize() -> *mut Module {
    Box::into_raw(Box::new(Module::new()))
}

/// Destroy a module created by [`module_initialize`]. Null is a no-op.
///
/// # Safety
///
/// `module` must be null or a pointer returned by [`module_initialize`]
/// that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn module_free(module: *mut Module) {
    if module.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(module) });
}

/// # Safety
///
/// `module` must be a live pointer returned by [`module_initialize`].
#[no_mangle]
pub unsafe extern "C" fn module_create_entity(module: *mut Module) -> u64 {
    let module = unsafe { module.as_mut() }.expect("null module");
    module.create_entity().to_raw()
}

/// # Safety
///
/// `module` must be a live pointer returned by [`module_initialize`].
#[no_mangle]
pub unsafe extern "C" fn module_release_entity(
    module: *mut Module,
    entity: u64,
    clear_memory: bool,
) -> bool {
    let module = unsafe { module.as_mut() }.expect("null module");
    module.release_entity(Entity::from_raw(entity), clear_memory)
}

/// Append a zero-initialized record of `element_size` bytes for
/// `(entity, component_id)` and return a pointer to it.
///
/// The pointer is invalidated by any later mutation of the same column.
///
/// # Safety
///
/// `module` must be a live pointer returned by [`module_initialize`];
/// `element_size` must match any earlier use of `component_id`.
#[no_mangle]
pub unsafe extern "C" fn module_add_component(
    module: *mut Module,
    entity: u64,
    component_id: usize,
    element_size: usize,
) -> *mut u8 {
    let module = unsafe { module.as_mut() }.expect("null module");
    module.add_component_raw(
        Entity::from_raw(entity),
        ComponentId::from_raw(component_id),
        element_size,
    )
}

/// # Safety
///
/// `module` must be a live pointer returned by [`module_initialize`].
#[no_mangle]
pub unsafe extern "C" fn module_remove_component(
    module: *mut Module,
    entity: u64,
    component_id: usize,
) -> bool {
    let module = unsafe { module.as_mut() }.expect("null module");
    module.remove_component_id(Entity::from_raw(entity), ComponentId::from_raw(component_id))
}

/// The entity's record for `component_id`, or null when it owns none.
///
/// # Safety
///
/// `module` must be a live pointer returned by [`module_initialize`].
#[no_mangle]
pub unsafe extern "C" fn module_get_component(
    module: *mut Module,
    entity: u64,
    component_id: usize,
) -> *mut u8 {
    let module = unsafe { module.as_mut() }.expect("null module");
    module
        .component_ptr_mut(Entity::from_raw(entity), ComponentId::from_raw(component_id))
        .unwrap_or(std::ptr::null_mut())
}

/// # Safety
///
/// `module` must be a live pointer returned by [`module_initialize`].
#[no_mangle]
pub unsafe extern "C" fn module_has_component(
    module: *mut Module,
    entity: u64,
    component_id: usize,
) -> bool {
    let module = unsafe { module.as_ref() }.expect("null module");
    module.has_component_id(Entity::from_raw(entity), ComponentId::from_raw(component_id))
}

/// Allocate the next fresh component id from the process-wide registry.
#[no_mangle]
pub extern "C" fn get_next_component_id() -> usize {
    component::next_component_id().to_raw()
}

/// Look a component id up by name, optionally creating it. Returns the
/// all-ones sentinel on a miss without `create_if_missing`.
///
/// # Safety
///
/// `name` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn component_id_from_name(
    name: *const c_char,
    create_if_missing: bool,
) -> usize {
    if name.is_null() {
        return ComponentId::INVALID.to_raw();
    }
    let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
        return ComponentId::INVALID.to_raw();
    };
    component::component_id_from_name(name, create_if_missing).to_raw()
}

/// The registered name for a component id, or null. The pointer stays
/// valid until [`component_id_free_maps`].
#[no_mangle]
pub extern "C" fn component_id_name(component_id: usize) -> *const c_char {
    let Some(name) = component::component_id_name(ComponentId::from_raw(component_id)) else {
        return std::ptr::null();
    };
    let mut cache = NAME_CACHE.lock().expect("name cache poisoned");
    let entry = cache.entry(component_id).or_insert_with(|| {
        CString::new(name.as_ref().to_owned()).expect("registered names contain no NUL")
    });
    entry.as_ptr()
}

/// Free the registry's name maps and every string handed out by
/// [`component_id_name`].
#[no_mangle]
pub extern "C" fn component_id_free_maps() {
    component::component_id_free_maps();
    NAME_CACHE.lock().expect("name cache poisoned").clear();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
