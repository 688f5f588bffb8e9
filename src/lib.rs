#![deny(missing_docs)]
//! Part selection for background compaction.
//!
//! Given a table's part catalog, a transaction context and a placement
//! policy, a [`PartsCollector`] produces the ranges of parts that a merge
//! scheduler is allowed to combine. Collectors never mutate anything; the
//! scheduler picks which range to merge and re-validates it before merging.
//!
//! ```
//! use std::time::SystemTime;
//!
//! use compaction_parts::{
//!     DataPart, PartCatalog, PartsCollector, StorageMetadata, StoragePolicy, TransactionLog,
//!     TxnContext, VisiblePartsCollector,
//! };
//!
//! let catalog = PartCatalog::new("hits");
//! for block in 1..=3 {
//!     catalog.insert(DataPart::new("202401", block, block, "ssd"))?;
//! }
//! let log = TransactionLog::new();
//! let ranges = VisiblePartsCollector::new(&catalog, TxnContext::NonTransactional(&log)).collect(
//!     &StorageMetadata::new("hits").partition_by(["toYYYYMM(date)"]),
//!     &StoragePolicy::single_volume("default", ["ssd"]),
//!     SystemTime::now(),
//!     None,
//! )?;
//! assert_eq!(ranges.len(), 1);
//! assert_eq!(ranges.part_count(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Shared part catalog and its snapshots.
pub mod catalog;
/// Collector interface and strategies.
pub mod collector;
mod error;
mod logging;
/// Table schema and partitioning context.
pub mod metadata;
/// MVCC primitives: transaction ids, snapshots, visibility.
pub mod mvcc;
/// Data part descriptors.
pub mod part;
/// Disk placement policies.
pub mod placement;

pub use crate::{
    catalog::{CatalogEdit, CatalogError, CatalogSnapshot, PartCatalog},
    collector::{
        ActivePartsCollector, CollectorKind, CollectorStrategy, PartRange, PartRanges,
        PartitionScope, PartsCollector, TxnContext, VisiblePartsCollector,
    },
    error::CollectError,
    metadata::StorageMetadata,
    mvcc::{is_visible, TransactionLog, TxnError, TxnId, TxnSnapshot, TxnStatus},
    part::{DataPart, DiskId, PartName, PartNameError, PartState, PartitionId, VersionMetadata},
    placement::{Disk, PlacementError, PlacementPolicy, StoragePolicy, Volume},
};
