//! Part collectors turning a catalog snapshot into mergeable part ranges.
//!
//! A collector takes one atomic snapshot of the active parts, narrows it to
//! the requested partitions and then walks each partition in block order,
//! cutting ranges wherever a part cannot take part in a merge.

/// Non-transactional strategy: every active part is a candidate.
mod active;
/// Output ranges and the builder assembling them.
mod range;
/// MVCC-aware strategy.
mod visible;

use std::{collections::HashSet, sync::Arc, time::SystemTime};

pub use self::{
    active::ActivePartsCollector,
    range::{PartRange, PartRanges},
    visible::VisiblePartsCollector,
};
use self::range::RangeBuilder;
use crate::{
    catalog::{CatalogSnapshot, PartCatalog},
    error::CollectError,
    logging::{parts_log, LogContext},
    metadata::StorageMetadata,
    mvcc::{TransactionLog, TxnSnapshot},
    part::{DataPart, PartitionId},
    placement::PlacementPolicy,
};

/// Partitions a collection is restricted to; `None` at call sites means all.
pub type PartitionScope = HashSet<PartitionId>;

/// Strategy interface for producing merge candidates.
///
/// Implementations never mutate the catalog or the transaction, return the
/// same ranges for the same catalog/transaction/policy state, and can be
/// called concurrently from independent callers.
pub trait PartsCollector {
    /// Collect the ranges of parts that may legally be merged together.
    fn collect(
        &self,
        metadata: &StorageMetadata,
        policy: &dyn PlacementPolicy,
        now: SystemTime,
        scope: Option<&PartitionScope>,
    ) -> Result<PartRanges, CollectError>;
}

/// Transaction context a collector evaluates visibility in.
#[derive(Clone, Copy, Debug)]
pub enum TxnContext<'a> {
    /// Inside a transaction with a snapshot frozen at its start.
    Transaction(&'a TxnSnapshot),
    /// Outside any transaction; a read view of what has committed is captured
    /// at call entry.
    NonTransactional(&'a TransactionLog),
}

impl TxnContext<'_> {
    /// Freeze the snapshot used for one call.
    pub(crate) fn freeze(&self) -> Result<TxnSnapshot, CollectError> {
        match self {
            Self::Transaction(snapshot) => Ok((*snapshot).clone()),
            Self::NonTransactional(log) => Ok(log.committed_snapshot()?),
        }
    }
}

/// Available collection strategies selectable via configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollectorStrategy {
    /// Honour MVCC visibility and placement.
    #[default]
    Visible,
    /// Take every active part, honouring placement only.
    Active,
}

impl CollectorStrategy {
    /// Build a concrete collector for the selected strategy.
    pub fn build<'a>(self, catalog: &'a PartCatalog, txn: TxnContext<'a>) -> CollectorKind<'a> {
        match self {
            Self::Visible => CollectorKind::Visible(VisiblePartsCollector::new(catalog, txn)),
            Self::Active => CollectorKind::Active(ActivePartsCollector::new(catalog)),
        }
    }
}

/// Collector enum keeping a concrete instance behind a selectable strategy.
#[derive(Clone, Copy, Debug)]
pub enum CollectorKind<'a> {
    /// MVCC-aware collector.
    Visible(VisiblePartsCollector<'a>),
    /// Non-transactional collector.
    Active(ActivePartsCollector<'a>),
}

impl PartsCollector for CollectorKind<'_> {
    fn collect(
        &self,
        metadata: &StorageMetadata,
        policy: &dyn PlacementPolicy,
        now: SystemTime,
        scope: Option<&PartitionScope>,
    ) -> Result<PartRanges, CollectError> {
        match self {
            Self::Visible(collector) => collector.collect(metadata, policy, now, scope),
            Self::Active(collector) => collector.collect(metadata, policy, now, scope),
        }
    }
}

/// What the scan does with one part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Visible and on a merge-eligible disk; extends the open range.
    Usable,
    /// Hidden from the reader; closes the open range and is dropped.
    Invisible,
    /// Visible but on an ineligible disk; closes the open range and is dropped.
    Unreachable,
}

/// Take the active-set snapshot for `metadata`'s table.
pub(crate) fn collect_initial(
    catalog: &PartCatalog,
    metadata: &StorageMetadata,
) -> Result<CatalogSnapshot, CollectError> {
    if metadata.table() != catalog.table() {
        return Err(CollectError::TableMismatch {
            expected: metadata.table().to_owned(),
            found: catalog.table().to_owned(),
        });
    }
    catalog
        .active_snapshot()
        .map_err(|source| CollectError::CatalogUnavailable {
            table: catalog.table().to_owned(),
            source,
        })
}

/// Keep only parts of partitions in `scope`, preserving order.
pub(crate) fn filter_by_partitions(
    snapshot: &CatalogSnapshot,
    metadata: &StorageMetadata,
    scope: Option<&PartitionScope>,
    ctx: &LogContext,
) -> Vec<Arc<DataPart>> {
    let Some(scope) = scope else {
        return snapshot.parts().to_vec();
    };
    for id in scope.iter().filter(|id| !metadata.accepts_partition(id)) {
        parts_log!(
            log::Level::Trace,
            ctx: ctx,
            "scope_partition_not_in_table",
            "partition={}",
            id
        );
    }
    snapshot
        .parts()
        .iter()
        .filter(|part| scope.contains(&part.partition_id))
        .cloned()
        .collect()
}

/// Walk `parts` in order and assemble ranges according to `classify`.
pub(crate) fn assemble_ranges<F>(
    parts: Vec<Arc<DataPart>>,
    ctx: &LogContext,
    mut classify: F,
) -> Result<PartRanges, CollectError>
where
    F: FnMut(&DataPart) -> Result<Disposition, CollectError>,
{
    let mut builder = RangeBuilder::default();
    for part in parts {
        match classify(&part)? {
            Disposition::Usable => builder.push(part),
            Disposition::Invisible => {
                parts_log!(
                    log::Level::Trace,
                    ctx: ctx,
                    "part_invisible",
                    "part={} creation_txn={} removal_txn={:?}",
                    part.name(),
                    part.version.creation_txn,
                    part.version.removal_txn
                );
                builder.split();
            }
            Disposition::Unreachable => {
                parts_log!(
                    log::Level::Trace,
                    ctx: ctx,
                    "part_disk_ineligible",
                    "part={} disk={}",
                    part.name(),
                    part.disk
                );
                builder.split();
            }
        }
    }
    Ok(builder.finish())
}

/// Placement half of the classification shared by every strategy.
pub(crate) fn placement_disposition(
    part: &DataPart,
    policy: &dyn PlacementPolicy,
    now: SystemTime,
) -> Result<Disposition, CollectError> {
    if policy.is_eligible(&part.disk, now)? {
        Ok(Disposition::Usable)
    } else {
        Ok(Disposition::Unreachable)
    }
}
