use std::time::SystemTime;

use super::{
    assemble_ranges, collect_initial, filter_by_partitions, placement_disposition, PartRanges,
    PartitionScope, PartsCollector,
};
use crate::{
    catalog::PartCatalog,
    error::CollectError,
    logging::{parts_log, LogContext},
    metadata::StorageMetadata,
    placement::PlacementPolicy,
};

/// Collector treating every active part as visible.
///
/// Meant for tables without transactional writes, where the catalog's
/// active set already is the committed state.
#[derive(Clone, Copy, Debug)]
pub struct ActivePartsCollector<'a> {
    catalog: &'a PartCatalog,
}

impl<'a> ActivePartsCollector<'a> {
    /// Collector over `catalog`.
    pub fn new(catalog: &'a PartCatalog) -> Self {
        Self { catalog }
    }
}

impl PartsCollector for ActivePartsCollector<'_> {
    fn collect(
        &self,
        metadata: &StorageMetadata,
        policy: &dyn PlacementPolicy,
        now: SystemTime,
        scope: Option<&PartitionScope>,
    ) -> Result<PartRanges, CollectError> {
        let ctx = LogContext::for_table(self.catalog.table());
        let snapshot = collect_initial(self.catalog, metadata)?;
        let parts = filter_by_partitions(&snapshot, metadata, scope, &ctx);
        let ranges = assemble_ranges(parts, &ctx, |part| {
            placement_disposition(part, policy, now)
        })?;
        parts_log!(
            log::Level::Debug,
            ctx: ctx,
            "parts_collected",
            "strategy=active generation={} ranges={} parts={}",
            snapshot.generation(),
            ranges.len(),
            ranges.part_count()
        );
        Ok(ranges)
    }
}
