//! Shared part catalog with atomic point-in-time snapshots.
//!
//! Writers (inserts, merges, drops) apply batches of [`CatalogEdit`]s that
//! build a new immutable [`CatalogVersion`] and swap it in under the write
//! lock. Readers only clone the current version's active list under the read
//! lock, so every snapshot is one consistent view of the active set.

mod edit;

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use thiserror::Error;

pub use self::edit::CatalogEdit;
use crate::part::{DataPart, PartName, PartState, PartitionId};

/// Errors raised by the part catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A writer panicked while holding the catalog lock.
    #[error("catalog lock is poisoned")]
    Poisoned,
    /// The table was detached or dropped.
    #[error("catalog of table `{0}` is closed")]
    Closed(String),
    /// A part with the same name is already registered.
    #[error("part `{0}` already exists")]
    DuplicatePart(String),
    /// No part with that name is registered.
    #[error("part `{0}` does not exist")]
    UnknownPart(String),
    /// Two active parts of one partition would intersect in block space.
    #[error("active parts `{0}` and `{1}` overlap")]
    Overlap(String, String),
}

impl CatalogError {
    /// Whether retrying on a later tick may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Poisoned | Self::Closed(_))
    }
}

type PartKey = (PartitionId, i64, i64, u32);

fn part_key(part: &DataPart) -> PartKey {
    let (partition_id, min_block, max_block) = part.sort_key();
    (partition_id.clone(), min_block, max_block, part.level)
}

fn name_key(name: &PartName) -> PartKey {
    (
        name.partition_id.clone(),
        name.min_block,
        name.max_block,
        name.level,
    )
}

/// Immutable state of the catalog at one generation.
#[derive(Debug)]
pub struct CatalogVersion {
    generation: u64,
    parts: BTreeMap<PartKey, Arc<DataPart>>,
    active: Arc<[Arc<DataPart>]>,
}

impl Default for CatalogVersion {
    fn default() -> Self {
        Self {
            generation: 0,
            parts: BTreeMap::new(),
            active: Arc::from(Vec::new()),
        }
    }
}

impl CatalogVersion {
    fn apply(&self, edits: Vec<CatalogEdit>) -> Result<Self, CatalogError> {
        let mut parts = self.parts.clone();
        for edit in edits {
            match edit {
                CatalogEdit::Add(part) => {
                    let key = part_key(&part);
                    if parts.contains_key(&key) {
                        return Err(CatalogError::DuplicatePart(part.name().to_string()));
                    }
                    parts.insert(key, Arc::new(part));
                }
                CatalogEdit::SetState { name, state } => {
                    let part = lookup(&mut parts, &name)?;
                    Arc::make_mut(part).state = state;
                }
                CatalogEdit::SetRemoval { name, txn } => {
                    let part = lookup(&mut parts, &name)?;
                    Arc::make_mut(part).version.removal_txn = txn;
                }
                CatalogEdit::Remove { name } => {
                    parts
                        .remove(&name_key(&name))
                        .ok_or_else(|| CatalogError::UnknownPart(name.to_string()))?;
                }
            }
        }
        let active = active_parts(&parts)?;
        Ok(Self {
            generation: self.generation + 1,
            parts,
            active,
        })
    }

    /// Monotonic counter bumped by every applied batch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All registered parts regardless of state, ordered by partition then block range.
    pub fn parts(&self) -> impl Iterator<Item = &Arc<DataPart>> {
        self.parts.values()
    }
}

fn lookup<'a>(
    parts: &'a mut BTreeMap<PartKey, Arc<DataPart>>,
    name: &PartName,
) -> Result<&'a mut Arc<DataPart>, CatalogError> {
    parts
        .get_mut(&name_key(name))
        .ok_or_else(|| CatalogError::UnknownPart(name.to_string()))
}

fn active_parts(
    parts: &BTreeMap<PartKey, Arc<DataPart>>,
) -> Result<Arc<[Arc<DataPart>]>, CatalogError> {
    let mut active: Vec<Arc<DataPart>> = Vec::new();
    for part in parts.values().filter(|p| p.state == PartState::Active) {
        if let Some(prev) = active.last() {
            if prev.partition_id == part.partition_id && prev.max_block >= part.min_block {
                return Err(CatalogError::Overlap(
                    prev.name().to_string(),
                    part.name().to_string(),
                ));
            }
        }
        active.push(Arc::clone(part));
    }
    Ok(active.into())
}

/// Point-in-time list of a table's active parts.
///
/// Ordered by partition, then by `(min_block, max_block)`; never changes
/// after it was taken.
#[derive(Clone, Debug)]
pub struct CatalogSnapshot {
    table: Arc<str>,
    generation: u64,
    parts: Arc<[Arc<DataPart>]>,
}

impl CatalogSnapshot {
    /// Table the snapshot belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Catalog generation the snapshot was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Active parts in catalog order.
    pub fn parts(&self) -> &[Arc<DataPart>] {
        &self.parts
    }

    /// Number of active parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` when the table has no active parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[derive(Debug)]
struct CatalogInner {
    current: Arc<CatalogVersion>,
    closed: bool,
}

/// Synchronized catalog of one table's parts.
#[derive(Debug)]
pub struct PartCatalog {
    table: Arc<str>,
    inner: RwLock<CatalogInner>,
}

impl PartCatalog {
    /// Empty catalog for `table`.
    pub fn new(table: impl AsRef<str>) -> Self {
        Self {
            table: Arc::from(table.as_ref()),
            inner: RwLock::new(CatalogInner {
                current: Arc::new(CatalogVersion::default()),
                closed: false,
            }),
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Atomically read the current active set.
    ///
    /// The read lock is held only to clone the version handle.
    pub fn active_snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        let current = self.current()?;
        Ok(CatalogSnapshot {
            table: Arc::clone(&self.table),
            generation: current.generation,
            parts: Arc::clone(&current.active),
        })
    }

    /// Current catalog version, including non-active parts.
    pub fn current(&self) -> Result<Arc<CatalogVersion>, CatalogError> {
        let guard = self.inner.read().map_err(|_| CatalogError::Poisoned)?;
        if guard.closed {
            return Err(CatalogError::Closed(self.table.to_string()));
        }
        Ok(Arc::clone(&guard.current))
    }

    /// Apply `edits` as one atomic batch; on error nothing is applied.
    pub fn apply_edits(&self, edits: Vec<CatalogEdit>) -> Result<u64, CatalogError> {
        let mut guard = self.inner.write().map_err(|_| CatalogError::Poisoned)?;
        if guard.closed {
            return Err(CatalogError::Closed(self.table.to_string()));
        }
        let next = guard.current.apply(edits)?;
        let generation = next.generation;
        guard.current = Arc::new(next);
        Ok(generation)
    }

    /// Register a single part.
    pub fn insert(&self, part: DataPart) -> Result<u64, CatalogError> {
        self.apply_edits(vec![CatalogEdit::Add(part)])
    }

    /// Detach the table; later reads and writes fail with [`CatalogError::Closed`].
    pub fn close(&self) -> Result<(), CatalogError> {
        let mut guard = self.inner.write().map_err(|_| CatalogError::Poisoned)?;
        guard.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::TxnId;

    fn name(s: &str) -> PartName {
        PartName::parse(s).expect("name")
    }

    #[test]
    fn snapshot_lists_active_parts_in_block_order() {
        let catalog = PartCatalog::new("t");
        catalog
            .apply_edits(vec![
                CatalogEdit::Add(DataPart::new("p2", 1, 1, "d0")),
                CatalogEdit::Add(DataPart::new("p1", 3, 3, "d0")),
                CatalogEdit::Add(DataPart::new("p1", 1, 1, "d0")),
                CatalogEdit::Add(DataPart::new("p1", 2, 2, "d0").with_state(PartState::PreActive)),
            ])
            .expect("apply");
        let snapshot = catalog.active_snapshot().expect("snapshot");
        let names: Vec<String> = snapshot
            .parts()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, ["p1_1_1_0", "p1_3_3_0", "p2_1_1_0"]);
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(catalog.current().expect("current").parts().count(), 4);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_edits() {
        let catalog = PartCatalog::new("t");
        catalog.insert(DataPart::new("p1", 1, 1, "d0")).expect("insert");
        let before = catalog.active_snapshot().expect("snapshot");
        catalog
            .apply_edits(vec![CatalogEdit::SetState {
                name: name("p1_1_1_0"),
                state: PartState::Outdated,
            }])
            .expect("apply");
        assert_eq!(before.len(), 1);
        assert!(catalog.active_snapshot().expect("snapshot").is_empty());
    }

    #[test]
    fn merge_replaces_inputs_atomically() {
        let catalog = PartCatalog::new("t");
        catalog.insert(DataPart::new("p1", 1, 1, "d0")).expect("insert");
        catalog.insert(DataPart::new("p1", 2, 2, "d0")).expect("insert");
        let merged = DataPart::new("p1", 1, 2, "d0").with_level(1);
        catalog
            .apply_edits(vec![
                CatalogEdit::SetState {
                    name: name("p1_1_1_0"),
                    state: PartState::Outdated,
                },
                CatalogEdit::SetState {
                    name: name("p1_2_2_0"),
                    state: PartState::Outdated,
                },
                CatalogEdit::Add(merged.clone()),
            ])
            .expect("apply");
        let snapshot = catalog.active_snapshot().expect("snapshot");
        assert_eq!(snapshot.parts().len(), 1);
        assert_eq!(*snapshot.parts()[0], merged);
    }

    #[test]
    fn overlapping_active_parts_are_rejected() {
        let catalog = PartCatalog::new("t");
        catalog.insert(DataPart::new("p1", 1, 1, "d0")).expect("insert");
        catalog.insert(DataPart::new("p1", 2, 2, "d0")).expect("insert");
        let err = catalog
            .insert(DataPart::new("p1", 1, 2, "d0").with_level(1))
            .expect_err("overlap");
        assert_eq!(
            err,
            CatalogError::Overlap("p1_1_1_0".into(), "p1_1_2_1".into())
        );
        assert_eq!(catalog.active_snapshot().expect("snapshot").len(), 2);
    }

    #[test]
    fn edits_against_unknown_parts_fail() {
        let catalog = PartCatalog::new("t");
        catalog.insert(DataPart::new("p1", 1, 1, "d0")).expect("insert");
        assert_eq!(
            catalog.insert(DataPart::new("p1", 1, 1, "d1")),
            Err(CatalogError::DuplicatePart("p1_1_1_0".into()))
        );
        assert_eq!(
            catalog.apply_edits(vec![CatalogEdit::SetRemoval {
                name: name("p1_5_5_0"),
                txn: Some(TxnId::new(3)),
            }]),
            Err(CatalogError::UnknownPart("p1_5_5_0".into()))
        );
        catalog
            .apply_edits(vec![CatalogEdit::Remove {
                name: name("p1_1_1_0"),
            }])
            .expect("remove");
        assert!(catalog.active_snapshot().expect("snapshot").is_empty());
    }

    #[test]
    fn closed_catalog_is_unavailable() {
        let catalog = PartCatalog::new("t");
        catalog.close().expect("close");
        let err = catalog.active_snapshot().expect_err("closed");
        assert_eq!(err, CatalogError::Closed("t".into()));
        assert!(err.is_retryable());
    }
}
