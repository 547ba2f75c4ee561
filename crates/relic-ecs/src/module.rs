//! The [`Module`] owns the per-entity index rows, one [`Storage`] per
//! component id, and the entity freelist.
//!
//! The index table is ragged: `entity_component_indices[e][c]` is the record
//! index of entity `e`'s component `c` in `storages[c]`, or
//! [`INVALID_INDEX`]. Rows grow on demand to cover the largest component id
//! an entity has touched. This is the representation that gives sparse
//! component sets, O(1) access, and in-place column sorting through
//! permutation patch-up all at once.

use std::cell::Cell;

use crate::component::{self, ComponentId};
use crate::entity::{Entity, EntityRef, WithEntity};
use crate::storage::{Storage, INVALID_INDEX};

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// The top-level container of the storage engine.
pub struct Module {
    /// `[entity][component] -> record index`, ragged, `INVALID_INDEX` = absent.
    entity_component_indices: Vec<Vec<usize>>,
    /// One column per component id, created lazily.
    storages: Vec<Option<Storage>>,
    /// Released entity ids available for reuse.
    freelist: Vec<Entity>,
    /// Teardown hint: skip per-record finalization on drop. Legitimate when
    /// the process is about to exit and the OS reclaims everything anyway.
    pub should_leak: bool,
    /// Fresh-variable watermark handed to the query layer.
    variable_counter: Cell<u64>,
}

impl Module {
    /// Create an empty module. Row 0 belongs to the reserved invalid entity.
    pub fn new() -> Self {
        Self {
            entity_component_indices: vec![Vec::new()],
            storages: Vec::new(),
            freelist: Vec::new(),
            should_leak: false,
            variable_counter: Cell::new(0),
        }
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity, preferring the freelist over growing the id space.
    ///
    /// Never returns [`Entity::NULL`].
    pub fn create_entity(&mut self) -> Entity {
        if let Some(entity) = self.freelist.pop() {
            return entity;
        }
        let entity = Entity::from_raw(self.entity_component_indices.len() as u64);
        self.entity_component_indices.push(Vec::new());
        entity
    }

    /// Release an entity: remove all of its components, clear its row, and
    /// add its id to the freelist.
    ///
    /// Returns `false` for [`Entity::NULL`], an id that was never created,
    /// or an id that is already free. With `clear_memory`, the released
    /// records' bytes are zeroed in their columns (plain-old-data columns
    /// only; records with finalizers stay put until column teardown).
    pub fn release_entity(&mut self, entity: Entity, clear_memory: bool) -> bool {
        if entity.is_null()
            || entity.index() >= self.entity_component_indices.len()
            || self.is_free(entity)
        {
            return false;
        }
        let row = std::mem::take(&mut self.entity_component_indices[entity.index()]);
        if clear_memory {
            for (c, &record) in row.iter().enumerate() {
                if record == INVALID_INDEX {
                    continue;
                }
                if let Some(storage) = self.storages.get_mut(c).and_then(Option::as_mut) {
                    storage.zero_record(record);
                }
            }
        }
        self.freelist.push(entity);
        true
    }

    /// Whether `entity` is currently on the freelist.
    pub fn is_free(&self, entity: Entity) -> bool {
        self.freelist.contains(&entity)
    }

    /// Number of entity rows, including the reserved row 0.
    pub fn entity_count(&self) -> usize {
        self.entity_component_indices.len()
    }

    /// All live entities in ascending id order (the reserved entity and
    /// freed ids are skipped).
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        (1..self.entity_component_indices.len())
            .map(|e| Entity::from_raw(e as u64))
            .filter(move |e| !self.is_free(*e))
    }

    /// Ergonomic read view of one entity.
    pub fn entity(&self, entity: Entity) -> EntityRef<'_> {
        EntityRef::new(self, entity)
    }

    // -- component access ---------------------------------------------------

    /// Attach a `T` component to `entity`, returning a reference to the
    /// stored value.
    ///
    /// Precondition: the entity must not already own this component. If it
    /// does, the row is repointed at the fresh record and the old record is
    /// stranded in the column until teardown (stale storage, not leaked
    /// memory); remove first to avoid that.
    pub fn add_component<T: 'static>(&mut self, entity: Entity, value: T) -> &mut T {
        self.add_component_tagged(entity, 0, value)
    }

    /// Tag-uniquified variant of [`add_component`](Self::add_component).
    pub fn add_component_tagged<T: 'static>(
        &mut self,
        entity: Entity,
        unique: usize,
        value: T,
    ) -> &mut T {
        let id = component::component_id_of_tagged::<T>(unique);
        assert!(
            entity.index() < self.entity_component_indices.len(),
            "unknown entity {entity}"
        );
        debug_assert!(!self.is_free(entity), "component added to a freed entity");
        let record = self.ensure_storage::<T>(id).push(value);
        self.set_record_index(entity, id, record);
        #[allow(unsafe_code)]
        unsafe {
            self.storages[id.index()]
                .as_mut()
                .expect("storage just ensured")
                .get_mut::<T>(record)
        }
    }

    /// Attach a [`WithEntity`] payload, filling in the owner automatically.
    pub fn add_component_with_entity<T: 'static>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> &mut WithEntity<T> {
        self.add_component(entity, WithEntity::new(entity, value))
    }

    /// Untyped append for embedders: a zero-initialized record of
    /// `element_size` bytes in the column for `component`.
    ///
    /// The column is created on first use and treats records as plain bytes.
    pub fn add_component_raw(
        &mut self,
        entity: Entity,
        component: ComponentId,
        element_size: usize,
    ) -> *mut u8 {
        assert!(
            entity.index() < self.entity_component_indices.len(),
            "unknown entity {entity}"
        );
        let storage = self.ensure_storage_raw(component, element_size);
        let record = storage.add();
        let ptr = storage.record_ptr_mut(record);
        self.set_record_index(entity, component, record);
        ptr
    }

    /// The entity's `T` component, if it owns one.
    pub fn get_component<T: 'static>(&self, entity: Entity) -> Option<&T> {
        self.get_component_tagged(entity, 0)
    }

    /// Tag-uniquified variant of [`get_component`](Self::get_component).
    pub fn get_component_tagged<T: 'static>(&self, entity: Entity, unique: usize) -> Option<&T> {
        let id = component::component_id_of_tagged::<T>(unique);
        let record = self.record_index(entity, id);
        if record == INVALID_INDEX {
            return None;
        }
        let storage = self.storage(id)?;
        #[allow(unsafe_code)]
        Some(unsafe { storage.get::<T>(record) })
    }

    /// Mutable access to the entity's `T` component.
    pub fn get_component_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        self.get_component_mut_tagged(entity, 0)
    }

    /// Tag-uniquified variant of [`get_component_mut`](Self::get_component_mut).
    pub fn get_component_mut_tagged<T: 'static>(
        &mut self,
        entity: Entity,
        unique: usize,
    ) -> Option<&mut T> {
        let id = component::component_id_of_tagged::<T>(unique);
        let record = self.record_index(entity, id);
        if record == INVALID_INDEX {
            return None;
        }
        let storage = self.storage_mut(id)?;
        #[allow(unsafe_code)]
        Some(unsafe { storage.get_mut::<T>(record) })
    }

    /// Raw pointer to the entity's record for `component`, if present.
    pub fn component_ptr(&self, entity: Entity, component: ComponentId) -> Option<*const u8> {
        let record = self.record_index(entity, component);
        if record == INVALID_INDEX {
            return None;
        }
        Some(self.storage(component)?.record_ptr(record))
    }

    /// Mutable raw pointer to the entity's record for `component`.
    pub fn component_ptr_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Option<*mut u8> {
        let record = self.record_index(entity, component);
        if record == INVALID_INDEX {
            return None;
        }
        Some(self.storage_mut(component)?.record_ptr_mut(record))
    }

    /// Whether the entity owns a `T` component.
    pub fn has_component<T: 'static>(&self, entity: Entity) -> bool {
        self.has_component_tagged::<T>(entity, 0)
    }

    /// Tag-uniquified variant of [`has_component`](Self::has_component).
    pub fn has_component_tagged<T: 'static>(&self, entity: Entity, unique: usize) -> bool {
        self.has_component_id(entity, component::component_id_of_tagged::<T>(unique))
    }

    /// Whether the entity owns the component with the given id.
    pub fn has_component_id(&self, entity: Entity, component: ComponentId) -> bool {
        self.record_index(entity, component) != INVALID_INDEX
    }

    /// Detach the entity's `T` component. The record itself stays in the
    /// column (compaction is a separate concern); only the row slot is
    /// invalidated.
    pub fn remove_component<T: 'static>(&mut self, entity: Entity) -> bool {
        self.remove_component_tagged::<T>(entity, 0)
    }

    /// Tag-uniquified variant of [`remove_component`](Self::remove_component).
    pub fn remove_component_tagged<T: 'static>(&mut self, entity: Entity, unique: usize) -> bool {
        self.remove_component_id(entity, component::component_id_of_tagged::<T>(unique))
    }

    /// Id-keyed variant of [`remove_component`](Self::remove_component).
    pub fn remove_component_id(&mut self, entity: Entity, component: ComponentId) -> bool {
        let Some(row) = self.entity_component_indices.get_mut(entity.index()) else {
            return false;
        };
        let Some(slot) = row.get_mut(component.index()) else {
            return false;
        };
        if *slot == INVALID_INDEX {
            return false;
        }
        *slot = INVALID_INDEX;
        true
    }

    /// The record index of `(entity, component)`, or [`INVALID_INDEX`].
    pub fn record_index(&self, entity: Entity, component: ComponentId) -> usize {
        self.entity_component_indices
            .get(entity.index())
            .and_then(|row| row.get(component.index()))
            .copied()
            .unwrap_or(INVALID_INDEX)
    }

    /// All entities owning `component`, in ascending id order.
    pub fn owners_of(&self, component: ComponentId) -> impl Iterator<Item = Entity> + '_ {
        let c = component.index();
        self.entity_component_indices
            .iter()
            .enumerate()
            .filter(move |(_, row)| row.get(c).is_some_and(|&r| r != INVALID_INDEX))
            .map(|(e, _)| Entity::from_raw(e as u64))
    }

    // -- storages -----------------------------------------------------------

    /// The column for `component`, if one has been created.
    pub fn storage(&self, component: ComponentId) -> Option<&Storage> {
        self.storages.get(component.index()).and_then(Option::as_ref)
    }

    /// Mutable access to the column for `component`.
    pub fn storage_mut(&mut self, component: ComponentId) -> Option<&mut Storage> {
        self.storages.get_mut(component.index()).and_then(Option::as_mut)
    }

    /// The column for `T`, created lazily.
    pub fn get_storage<T: 'static>(&mut self) -> &mut Storage {
        self.get_storage_tagged::<T>(0)
    }

    /// Tag-uniquified variant of [`get_storage`](Self::get_storage).
    pub fn get_storage_tagged<T: 'static>(&mut self, unique: usize) -> &mut Storage {
        let id = component::component_id_of_tagged::<T>(unique);
        self.ensure_storage::<T>(id)
    }

    fn ensure_storage<T: 'static>(&mut self, id: ComponentId) -> &mut Storage {
        self.grow_storages(id);
        let slot = &mut self.storages[id.index()];
        let storage = slot.get_or_insert_with(Storage::for_type::<T>);
        debug_assert_eq!(storage.element_size(), std::mem::size_of::<T>());
        storage
    }

    fn ensure_storage_raw(&mut self, id: ComponentId, element_size: usize) -> &mut Storage {
        self.grow_storages(id);
        let slot = &mut self.storages[id.index()];
        let storage = slot.get_or_insert_with(|| Storage::with_element_size(element_size));
        assert_eq!(
            storage.element_size(),
            element_size,
            "element size disagrees with the existing column"
        );
        storage
    }

    fn grow_storages(&mut self, id: ComponentId) {
        assert!(!id.is_invalid(), "invalid component id");
        if id.index() >= self.storages.len() {
            self.storages.resize_with(id.index() + 1, || None);
        }
    }

    fn set_record_index(&mut self, entity: Entity, component: ComponentId, record: usize) {
        let row = &mut self.entity_component_indices[entity.index()];
        if component.index() >= row.len() {
            row.resize(component.index() + 1, INVALID_INDEX);
        }
        row[component.index()] = record;
    }

    // -- sorting ------------------------------------------------------------

    /// Sort the `T` column ascending by value, patching every entity row.
    pub fn sort_by_value<T: PartialOrd + 'static>(&mut self) {
        self.sort_by_value_tagged::<T>(0)
    }

    /// Tag-uniquified variant of [`sort_by_value`](Self::sort_by_value).
    pub fn sort_by_value_tagged<T: PartialOrd + 'static>(&mut self, unique: usize) {
        let id = component::component_id_of_tagged::<T>(unique);
        self.ensure_storage::<T>(id);
        let Self {
            entity_component_indices,
            storages,
            ..
        } = self;
        let storage = storages[id.index()].as_mut().expect("storage just ensured");
        storage.sort_by_value::<T>(id, entity_component_indices);
    }

    /// Reorder the `T` column so record position equals owning entity id.
    pub fn sort_monotonic<T: Default + 'static>(&mut self) {
        self.sort_monotonic_tagged::<T>(0)
    }

    /// Tag-uniquified variant of [`sort_monotonic`](Self::sort_monotonic).
    pub fn sort_monotonic_tagged<T: Default + 'static>(&mut self, unique: usize) {
        let id = component::component_id_of_tagged::<T>(unique);
        self.ensure_storage::<T>(id);
        let Self {
            entity_component_indices,
            storages,
            ..
        } = self;
        let storage = storages[id.index()].as_mut().expect("storage just ensured");
        storage.sort_monotonic::<T>(id, entity_component_indices);
    }

    /// Rewrite every row's record index for `component` through a
    /// permutation produced by a column reorder.
    pub(crate) fn patch_record_indices(&mut self, component: ComponentId, new_position: &[usize]) {
        crate::storage::patch_rows(&mut self.entity_component_indices, component, new_position);
    }

    // -- query-layer hooks --------------------------------------------------

    /// Hand out the next fresh logic-variable id.
    ///
    /// Interior mutability so variables can be reserved while the module is
    /// shared-borrowed by a query.
    pub fn next_variable_id(&self) -> u64 {
        let id = self.variable_counter.get();
        self.variable_counter.set(id + 1);
        id
    }

    /// The first variable id not yet handed out.
    pub fn variable_id_watermark(&self) -> u64 {
        self.variable_counter.get()
    }

    // -- snapshot hooks -----------------------------------------------------

    pub(crate) fn rows(&self) -> &[Vec<usize>] {
        &self.entity_component_indices
    }

    pub(crate) fn restore_parts(
        rows: Vec<Vec<usize>>,
        storages: Vec<Option<Storage>>,
        freelist: Vec<Entity>,
    ) -> Self {
        Self {
            entity_component_indices: rows,
            storages,
            freelist,
            should_leak: false,
            variable_counter: Cell::new(0),
        }
    }

    pub(crate) fn freelist(&self) -> &[Entity] {
        &self.freelist
    }

    pub(crate) fn columns(&self) -> impl Iterator<Item = (ComponentId, &Storage)> + '_ {
        self.storages
            .iter()
            .enumerate()
            .filter_map(|(c, slot)| slot.as_ref().map(|s| (ComponentId::from_raw(c), s)))
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        if self.should_leak {
            for storage in self.storages.iter_mut().flatten() {
                storage.leak_records();
            }
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("entity_count", &self.entity_count())
            .field("free", &self.freelist.len())
            .field(
                "storages",
                &self.storages.iter().filter(|s| s.is_some()).count(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_entity_never_returns_null() {
        let mut module = Module::new();
        let first = module.create_entity();
        assert!(!first.is_null());
        assert_eq!(first, Entity::from_raw(1));
        assert_eq!(module.create_entity(), Entity::from_raw(2));
    }

    #[test]
    fn component_roundtrip_and_overwrite() {
        let mut module = Module::new();
        let e = module.create_entity();
        assert_eq!(*module.add_component(e, 5.0f32), 5.0);
        assert_eq!(module.get_component::<f32>(e), Some(&5.0));
        *module.get_component_mut::<f32>(e).unwrap() = 6.0;
        assert_eq!(module.get_component::<f32>(e), Some(&6.0));
        assert!(!module.has_component::<i32>(e));
    }

    #[test]
    fn components_are_per_entity() {
        let mut module = Module::new();
        let e = module.create_entity();
        let e2 = module.create_entity();
        module.add_component(e, 6.0f32);
        module.add_component(e2, 5.0f32);
        assert_eq!(module.get_component::<f32>(e), Some(&6.0));
        assert_eq!(module.get_component::<f32>(e2), Some(&5.0));
    }

    #[test]
    fn released_entities_are_recycled_without_components() {
        let mut module = Module::new();
        let e = module.create_entity();
        module.add_component(e, 1.0f32);
        assert!(module.release_entity(e, true));
        assert!(module.is_free(e));

        let again = module.create_entity();
        assert_eq!(again, e);
        assert!(!module.has_component::<f32>(again));
    }

    #[test]
    fn release_rejects_null_and_double_free() {
        let mut module = Module::new();
        assert!(!module.release_entity(Entity::NULL, true));
        let e = module.create_entity();
        assert!(module.release_entity(e, true));
        assert!(!module.release_entity(e, true));
        assert!(!module.release_entity(Entity::from_raw(99), true));
    }

    #[test]
    fn remove_component_leaves_others_alone() {
        let mut module = Module::new();
        let e = module.create_entity();
        let e2 = module.create_entity();
        let e3 = module.create_entity();
        module.add_component(e, 1.0f32);
        module.add_component(e2, 2.0f32);
        module.add_component(e3, 3.0f32);

        assert!(module.remove_component::<f32>(e2));
        assert!(!module.remove_component::<f32>(e2));
        assert_eq!(module.get_component::<f32>(e), Some(&1.0));
        assert!(!module.has_component::<f32>(e2));
        assert_eq!(module.get_component::<f32>(e3), Some(&3.0));
    }

    #[test]
    fn unique_tags_are_independent_columns() {
        let mut module = Module::new();
        let e = module.create_entity();
        module.add_component(e, 5.0f32);
        module.add_component_tagged(e, 1, 7.0f32);
        assert_eq!(module.get_component::<f32>(e), Some(&5.0));
        assert_eq!(module.get_component_tagged::<f32>(e, 1), Some(&7.0));
        assert!(module.remove_component::<f32>(e));
        assert_eq!(module.get_component_tagged::<f32>(e, 1), Some(&7.0));
    }

    #[test]
    fn raw_components_are_zeroed_bytes() {
        let mut module = Module::new();
        let e = module.create_entity();
        let id = component::next_component_id();
        let ptr = module.add_component_raw(e, id, 8);
        assert!(!ptr.is_null());
        assert!(module.has_component_id(e, id));
        #[allow(unsafe_code)]
        unsafe {
            assert_eq!(*(ptr as *const u64), 0);
            *(ptr as *mut u64) = 77;
        }
        let read = module.component_ptr(e, id).unwrap();
        #[allow(unsafe_code)]
        unsafe {
            assert_eq!(*(read as *const u64), 77);
        }
    }

    #[test]
    fn owners_iterate_in_ascending_order() {
        let mut module = Module::new();
        let a = module.create_entity();
        let b = module.create_entity();
        let c = module.create_entity();
        module.add_component(c, 3u32);
        module.add_component(a, 1u32);
        let id = component::component_id_of::<u32>();
        let owners: Vec<Entity> = module.owners_of(id).collect();
        assert_eq!(owners, vec![a, c]);
        assert!(!owners.contains(&b));
    }

    #[test]
    fn entities_skip_freed_and_null() {
        let mut module = Module::new();
        let a = module.create_entity();
        let b = module.create_entity();
        let c = module.create_entity();
        module.release_entity(b, true);
        let live: Vec<Entity> = module.entities().collect();
        assert_eq!(live, vec![a, c]);
    }

    #[test]
    fn with_entity_payload_records_its_owner() {
        let mut module = Module::new();
        let e = module.create_entity();
        module.add_component_with_entity(e, 5.0f32);
        let stored = module.get_component::<WithEntity<f32>>(e).unwrap();
        assert_eq!(stored.entity, e);
        assert_eq!(**stored, 5.0);
    }
}
