//! Adapted storages: typed and hashtable views over a raw column.
//!
//! Adapters are constructed over an existing [`Storage`] plus the component
//! id; they add no state of their own. The typed view is safe by
//! construction because it resolves the column through the same
//! `(type, unique)` registration the module writes through.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::component::{self, ComponentId};
use crate::module::Module;
use crate::storage::{Storage, INVALID_INDEX};

// ---------------------------------------------------------------------------
// TypedStorage
// ---------------------------------------------------------------------------

/// A typed read view over one component column.
pub struct TypedStorage<'s, T> {
    storage: &'s Storage,
    component: ComponentId,
    _marker: PhantomData<&'s T>,
}

impl<'s, T: 'static> TypedStorage<'s, T> {
    fn new(storage: &'s Storage, component: ComponentId) -> Self {
        debug_assert_eq!(storage.element_size(), std::mem::size_of::<T>());
        Self {
            storage,
            component,
            _marker: PhantomData,
        }
    }

    /// The component id this view resolves through.
    #[inline]
    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// Number of records in the column.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// The record at `index`.
    pub fn get(&self, index: usize) -> &'s T {
        #[allow(unsafe_code)]
        unsafe {
            self.storage.get::<T>(index)
        }
    }

    /// The whole column as a slice.
    pub fn as_slice(&self) -> &'s [T] {
        #[allow(unsafe_code)]
        unsafe {
            self.storage.data::<T>()
        }
    }
}

// ---------------------------------------------------------------------------
// Hashtable storage
// ---------------------------------------------------------------------------

/// Component payload for hashtable columns: a key and an occupancy flag
/// inline with the user value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry<K, V = ()> {
    /// Probe key.
    pub key: K,
    /// User payload.
    pub value: V,
    /// Whether this slot holds a live entry.
    pub occupied: bool,
}

impl<K> Entry<K> {
    /// An occupied entry with no payload.
    pub fn new(key: K) -> Self {
        Self {
            key,
            value: (),
            occupied: true,
        }
    }
}

impl<K, V> Entry<K, V> {
    /// An occupied entry carrying a payload.
    pub fn with_value(key: K, value: V) -> Self {
        Self {
            key,
            value,
            occupied: true,
        }
    }
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Linear-probing hashtable view over an [`Entry`] column.
///
/// The handle carries only the component id, so lookups borrow the module
/// per call and `rehash` can take it mutably for the index patch-up.
pub struct HashStorage<K, V = ()> {
    component: ComponentId,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> HashStorage<K, V>
where
    K: Hash + Eq + Default + 'static,
    V: Default + 'static,
{
    /// A handle over the `Entry<K, V>` column.
    pub fn new() -> Self {
        Self {
            component: component::component_id_of::<Entry<K, V>>(),
            _marker: PhantomData,
        }
    }

    /// The component id of the underlying `Entry` column.
    #[inline]
    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// Probe for `key`: start at `hash(key) % capacity`, stop at the first
    /// unoccupied slot. Returns the record index whose key compares equal.
    pub fn find(&self, module: &Module, key: &K) -> Option<usize> {
        let storage = module.storage(self.component)?;
        let capacity = storage.len();
        if capacity == 0 {
            return None;
        }
        let start = hash_of(key) as usize % capacity;
        for probe in 0..capacity {
            let index = (start + probe) % capacity;
            #[allow(unsafe_code)]
            let entry = unsafe { storage.get::<Entry<K, V>>(index) };
            if !entry.occupied {
                return None;
            }
            if entry.key == *key {
                return Some(index);
            }
        }
        None
    }

    /// Whether the column has crossed the 0.75 load factor.
    pub fn needs_rehash(&self, module: &Module) -> bool {
        let Some(storage) = module.storage(self.component) else {
            return false;
        };
        let capacity = storage.len();
        if capacity == 0 {
            return false;
        }
        let used = self.used(storage);
        used * 4 > capacity * 3
    }

    fn used(&self, storage: &Storage) -> usize {
        (0..storage.len())
            .filter(|&index| {
                #[allow(unsafe_code)]
                let entry = unsafe { storage.get::<Entry<K, V>>(index) };
                entry.occupied
            })
            .count()
    }

    /// Resize the column to the next power of two that holds at least twice
    /// the occupied count, re-inserting every occupied record at its new
    /// probe position and patching the module's index rows through the
    /// resulting permutation.
    pub fn rehash(&self, module: &mut Module) -> bool {
        let old = {
            let Some(storage) = module.storage_mut(self.component) else {
                return false;
            };
            #[allow(unsafe_code)]
            unsafe {
                storage.drain::<Entry<K, V>>()
            }
        };

        let used = old.iter().filter(|entry| entry.occupied).count();
        let capacity = (used * 2).next_power_of_two().max(1);
        let mut slots: Vec<Option<Entry<K, V>>> = (0..capacity).map(|_| None).collect();
        let mut new_position = vec![INVALID_INDEX; old.len()];
        for (old_index, entry) in old.into_iter().enumerate() {
            if !entry.occupied {
                continue;
            }
            let mut index = hash_of(&entry.key) as usize % capacity;
            while slots[index].is_some() {
                index = (index + 1) % capacity;
            }
            new_position[old_index] = index;
            slots[index] = Some(entry);
        }

        {
            let storage = module
                .storage_mut(self.component)
                .expect("column present above");
            for slot in slots {
                storage.push(slot.unwrap_or_default());
            }
        }
        module.patch_record_indices(self.component, &new_position);
        true
    }

    /// Rehash only when the load factor demands it.
    pub fn rehash_if_needed(&self, module: &mut Module) -> bool {
        if self.needs_rehash(module) {
            self.rehash(module)
        } else {
            false
        }
    }
}

impl<K, V> Default for HashStorage<K, V>
where
    K: Hash + Eq + Default + 'static,
    V: Default + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Module constructors for adapted storages
// ---------------------------------------------------------------------------

impl Module {
    /// Typed view over the `T` column, if it exists.
    pub fn typed_storage<T: 'static>(&self) -> Option<TypedStorage<'_, T>> {
        self.typed_storage_tagged::<T>(0)
    }

    /// Tag-uniquified variant of [`typed_storage`](Self::typed_storage).
    pub fn typed_storage_tagged<T: 'static>(&self, unique: usize) -> Option<TypedStorage<'_, T>> {
        let id = component::component_id_of_tagged::<T>(unique);
        Some(TypedStorage::new(self.storage(id)?, id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    #[test]
    fn typed_view_reads_records_by_index() {
        let mut module = Module::new();
        let e = module.create_entity();
        module.add_component(e, 5.0f32);
        let id = component::component_id_of::<f32>();

        let typed = module.typed_storage::<f32>().unwrap();
        assert_eq!(*typed.get(module.record_index(e, id)), 5.0);
    }

    #[test]
    fn hashtable_find_after_rehash() {
        let mut module = Module::new();
        let mut entities = Vec::new();
        for _ in 0..100 {
            let e = module.create_entity();
            module.add_component(e, Entry::new(e));
            entities.push(e);
        }

        let table: HashStorage<Entity> = HashStorage::new();
        assert!(table.rehash(&mut module));

        for &e in &entities {
            let index = table.find(&module, &e).expect("key present");
            // The probed record is the same record the entity row points at.
            assert_eq!(module.record_index(e, table.component_id()), index);
            let typed = module.typed_storage::<Entry<Entity>>().unwrap();
            assert_eq!(typed.get(index).key, e);
        }
    }

    #[test]
    fn hashtable_miss_stops_on_unoccupied() {
        let mut module = Module::new();
        let e = module.create_entity();
        module.add_component(e, Entry::new(e));

        let table: HashStorage<Entity> = HashStorage::new();
        table.rehash(&mut module);
        assert_eq!(table.find(&module, &Entity::from_raw(999)), None);
    }

    #[test]
    fn load_factor_policy() {
        let mut module = Module::new();
        let table: HashStorage<Entity> = HashStorage::new();
        assert!(!table.needs_rehash(&module));

        // A densely appended column is at load factor 1.0.
        for _ in 0..4 {
            let e = module.create_entity();
            module.add_component(e, Entry::new(e));
        }
        assert!(table.needs_rehash(&module));
        assert!(table.rehash_if_needed(&mut module));
        assert!(!table.needs_rehash(&module));
    }
}
