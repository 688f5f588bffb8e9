use std::{slice, sync::Arc};

use crate::part::{DataPart, PartitionId};

/// Contiguous run of parts from one partition that may be merged together.
///
/// Members are in ascending block order and never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartRange {
    partition_id: PartitionId,
    parts: Vec<Arc<DataPart>>,
}

impl PartRange {
    /// Partition every member belongs to.
    pub fn partition_id(&self) -> &PartitionId {
        &self.partition_id
    }

    /// Members in ascending block order.
    pub fn parts(&self) -> &[Arc<DataPart>] {
        &self.parts
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Always `false`; empty runs are never emitted.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// `(min_block, max_block)` covered by the whole run.
    pub fn block_span(&self) -> (i64, i64) {
        let min = self.parts.first().map_or(0, |p| p.min_block);
        let max = self.parts.last().map_or(0, |p| p.max_block);
        (min, max)
    }

    /// Sum of the members' on-disk sizes.
    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.bytes_on_disk).sum()
    }

    /// Sum of the members' row counts.
    pub fn total_rows(&self) -> u64 {
        self.parts.iter().map(|p| p.rows).sum()
    }

    /// Block ranges of the members, mostly for diagnostics and tests.
    pub fn blocks(&self) -> Vec<(i64, i64)> {
        self.parts
            .iter()
            .map(|p| (p.min_block, p.max_block))
            .collect()
    }
}

impl<'a> IntoIterator for &'a PartRange {
    type Item = &'a Arc<DataPart>;
    type IntoIter = slice::Iter<'a, Arc<DataPart>>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}

/// Merge candidates of a table, ordered by partition then block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartRanges {
    ranges: Vec<PartRange>,
}

impl PartRanges {
    /// All ranges in order.
    pub fn iter(&self) -> slice::Iter<'_, PartRange> {
        self.ranges.iter()
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` when nothing can be merged.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of parts across all ranges.
    pub fn part_count(&self) -> usize {
        self.ranges.iter().map(PartRange::len).sum()
    }

    /// Ranges of a single partition.
    pub fn for_partition<'a>(
        &'a self,
        partition_id: &'a PartitionId,
    ) -> impl Iterator<Item = &'a PartRange> + 'a {
        self.ranges
            .iter()
            .filter(move |range| &range.partition_id == partition_id)
    }

    /// Consume into the underlying ranges.
    pub fn into_vec(self) -> Vec<PartRange> {
        self.ranges
    }
}

impl<'a> IntoIterator for &'a PartRanges {
    type Item = &'a PartRange;
    type IntoIter = slice::Iter<'a, PartRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl IntoIterator for PartRanges {
    type Item = PartRange;
    type IntoIter = std::vec::IntoIter<PartRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.into_iter()
    }
}

/// Accumulates ranges while scanning parts grouped by partition.
///
/// Parts must arrive grouped by partition and, within a partition, in
/// ascending `(min_block, max_block)` order.
#[derive(Debug, Default)]
pub(crate) struct RangeBuilder {
    ranges: Vec<PartRange>,
    open: Vec<Arc<DataPart>>,
}

impl RangeBuilder {
    /// Append `part` to the open range, closing it first on a partition change.
    pub(crate) fn push(&mut self, part: Arc<DataPart>) {
        if let Some(last) = self.open.last() {
            if last.partition_id != part.partition_id {
                self.split();
            } else {
                debug_assert!(
                    (last.min_block, last.max_block) < (part.min_block, part.max_block),
                    "parts out of block order"
                );
            }
        }
        self.open.push(part);
    }

    /// Close the open range, if any.
    pub(crate) fn split(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let parts = std::mem::take(&mut self.open);
        let partition_id = parts[0].partition_id.clone();
        self.ranges.push(PartRange {
            partition_id,
            parts,
        });
    }

    /// Close the open range and return everything collected.
    pub(crate) fn finish(mut self) -> PartRanges {
        self.split();
        PartRanges {
            ranges: self.ranges,
        }
    }
}
