//! Module snapshot and restore support.
//!
//! A [`ModuleSnapshot`] is a serializable image of a module: the per-entity
//! index rows exactly as stored, each plain-old-data column as its densely
//! packed record bytes, and the freelist. Those are the two layout
//! guarantees the format leans on -- index rows are stable arrays and every
//! column is dense -- so capture is a straight copy and restore is a straight
//! load. A `blake3` digest over the body catches corrupted or hand-edited
//! images.
//!
//! Columns whose records need finalization (anything non-POD) cannot be
//! captured as bytes; they are skipped with a warning and their index
//! entries are cleared in the captured rows.

use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::entity::Entity;
use crate::module::Module;
use crate::storage::{Storage, INVALID_INDEX};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Serialized image of one plain-old-data column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    /// Component id the column belongs to.
    pub component: ComponentId,
    /// Registered name at capture time, when the registry knows one.
    pub name: Option<String>,
    /// Size of one record in bytes.
    pub element_size: usize,
    /// Number of records.
    pub records: usize,
    /// Densely packed record bytes (`records * element_size`).
    pub bytes: Vec<u8>,
}

/// A complete serializable image of a [`Module`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    /// Per-entity index rows, ragged, `usize::MAX` = absent.
    pub entity_component_indices: Vec<Vec<usize>>,
    /// Released entity ids.
    pub freelist: Vec<Entity>,
    /// Captured columns.
    pub columns: Vec<ColumnSnapshot>,
    /// `blake3` hex digest over rows, freelist, and columns.
    pub digest: String,
}

fn digest_of(
    rows: &[Vec<usize>],
    freelist: &[Entity],
    columns: &[ColumnSnapshot],
) -> String {
    let body =
        serde_json::to_vec(&(rows, freelist, columns)).expect("snapshot body serializes");
    blake3::hash(&body).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Capture / restore
// ---------------------------------------------------------------------------

impl ModuleSnapshot {
    /// Capture a snapshot of `module`.
    pub fn capture(module: &Module) -> Self {
        let mut rows = module.rows().to_vec();
        let freelist = module.freelist().to_vec();

        let mut columns = Vec::new();
        for (component, storage) in module.columns() {
            if !storage.is_pod() {
                tracing::warn!(
                    component = component.to_raw(),
                    "column records need finalization -- skipping in snapshot"
                );
                for row in &mut rows {
                    if let Some(slot) = row.get_mut(component.index()) {
                        *slot = INVALID_INDEX;
                    }
                }
                continue;
            }
            columns.push(ColumnSnapshot {
                component,
                name: registered_name(component),
                element_size: storage.element_size(),
                records: storage.len(),
                bytes: storage.as_bytes().to_vec(),
            });
        }

        let digest = digest_of(&rows, &freelist, &columns);
        Self {
            entity_component_indices: rows,
            freelist,
            columns,
            digest,
        }
    }

    /// Rebuild a module from this snapshot.
    ///
    /// # Errors
    ///
    /// Fails when the digest does not match the body, a column's byte length
    /// disagrees with its record count, or an index row references a record
    /// that was not captured.
    pub fn restore(&self) -> Result<Module, EcsError> {
        let actual = digest_of(&self.entity_component_indices, &self.freelist, &self.columns);
        if actual != self.digest {
            return Err(EcsError::SnapshotDigestMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }

        let slots = self
            .columns
            .iter()
            .map(|c| c.component.index() + 1)
            .max()
            .unwrap_or(0);
        let mut storages: Vec<Option<Storage>> = Vec::new();
        storages.resize_with(slots, || None);

        for column in &self.columns {
            if column.element_size != 0
                && column.bytes.len() != column.element_size * column.records
            {
                return Err(EcsError::MalformedColumn {
                    component: column.component,
                    details: format!(
                        "{} bytes for {} records of size {}",
                        column.bytes.len(),
                        column.records,
                        column.element_size
                    ),
                });
            }
            let mut storage = Storage::with_element_size(column.element_size);
            if column.element_size == 0 {
                storage.allocate(column.records);
            } else {
                storage.load_bytes(&column.bytes);
            }
            storages[column.component.index()] = Some(storage);
        }

        for (entity, row) in self.entity_component_indices.iter().enumerate() {
            for (c, &record) in row.iter().enumerate() {
                if record == INVALID_INDEX {
                    continue;
                }
                let component = ComponentId::from_raw(c);
                let Some(storage) = storages.get(c).and_then(Option::as_ref) else {
                    return Err(EcsError::DanglingIndex {
                        entity: entity as u64,
                        component,
                    });
                };
                if record >= storage.len() {
                    return Err(EcsError::MalformedColumn {
                        component,
                        details: format!(
                            "row {entity} references record {record} of {}",
                            storage.len()
                        ),
                    });
                }
            }
        }

        Ok(Module::restore_parts(
            self.entity_component_indices.clone(),
            storages,
            self.freelist.clone(),
        ))
    }
}

#[cfg(feature = "string-lookup")]
fn registered_name(component: ComponentId) -> Option<String> {
    crate::component::component_id_name(component).map(|name| name.to_string())
}

#[cfg(not(feature = "string-lookup"))]
fn registered_name(_component: ComponentId) -> Option<String> {
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
