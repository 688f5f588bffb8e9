use std::time::SystemTime;

use super::{
    assemble_ranges, collect_initial, filter_by_partitions, placement_disposition, Disposition,
    PartRanges, PartitionScope, PartsCollector, TxnContext,
};
use crate::{
    catalog::PartCatalog,
    error::CollectError,
    logging::{parts_log, LogContext},
    metadata::StorageMetadata,
    mvcc::is_visible,
    placement::PlacementPolicy,
};

/// Collector honouring MVCC visibility and disk placement.
///
/// Holds only borrowed views; every call works on its own frozen
/// transaction snapshot and catalog snapshot.
#[derive(Clone, Copy, Debug)]
pub struct VisiblePartsCollector<'a> {
    catalog: &'a PartCatalog,
    txn: TxnContext<'a>,
}

impl<'a> VisiblePartsCollector<'a> {
    /// Collector over `catalog` evaluating visibility in `txn`.
    pub fn new(catalog: &'a PartCatalog, txn: TxnContext<'a>) -> Self {
        Self { catalog, txn }
    }
}

impl PartsCollector for VisiblePartsCollector<'_> {
    fn collect(
        &self,
        metadata: &StorageMetadata,
        policy: &dyn PlacementPolicy,
        now: SystemTime,
        scope: Option<&PartitionScope>,
    ) -> Result<PartRanges, CollectError> {
        let ctx = LogContext::for_table(self.catalog.table());
        let txn = self.txn.freeze()?;
        let snapshot = collect_initial(self.catalog, metadata)?;
        let parts = filter_by_partitions(&snapshot, metadata, scope, &ctx);
        let candidates = parts.len();

        let ranges = assemble_ranges(parts, &ctx, |part| {
            if !is_visible(&part.version, &txn) {
                return Ok(Disposition::Invisible);
            }
            placement_disposition(part, policy, now)
        })?;

        parts_log!(
            log::Level::Debug,
            ctx: ctx,
            "parts_collected",
            "strategy=visible txn={:?} generation={} candidates={} ranges={} parts={}",
            txn.owner(),
            snapshot.generation(),
            candidates,
            ranges.len(),
            ranges.part_count()
        );
        Ok(ranges)
    }
}
