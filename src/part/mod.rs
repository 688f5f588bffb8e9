//! Data part descriptors as published by the part catalog.

mod name;

use std::{borrow::Borrow, fmt, sync::Arc};

pub use self::name::{PartName, PartNameError};
use crate::mvcc::TxnId;

/// Identifier of the partition a part belongs to.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(Arc<str>);

impl PartitionId {
    /// Partition id used by tables without a partition key.
    pub const UNPARTITIONED: &'static str = "all";

    /// Construct a partition id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PartitionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PartitionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PartitionId").field(&&*self.0).finish()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the disk a part is stored on.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskId(Arc<str>);

impl DiskId {
    /// Construct a disk id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DiskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DiskId").field(&&*self.0).finish()
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog state of a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartState {
    /// Written, but the creating transaction has not committed yet.
    PreActive,
    /// Committed and serving reads.
    Active,
    /// Superseded by a visible merge; awaiting cleanup.
    Outdated,
    /// Being destroyed by the cleanup process.
    Deleting,
}

/// Creation/removal transactions recorded on a part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionMetadata {
    /// Transaction that produced the part.
    pub creation_txn: TxnId,
    /// Transaction that superseded or dropped the part, if any.
    pub removal_txn: Option<TxnId>,
}

impl VersionMetadata {
    /// Metadata for a part written outside any transaction.
    pub const fn prehistoric() -> Self {
        Self {
            creation_txn: TxnId::PREHISTORIC,
            removal_txn: None,
        }
    }

    /// Metadata for a part created by `txn`.
    pub const fn created_by(txn: TxnId) -> Self {
        Self {
            creation_txn: txn,
            removal_txn: None,
        }
    }
}

/// Immutable descriptor of one physically stored part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPart {
    /// Partition owning the part.
    pub partition_id: PartitionId,
    /// Lowest block number covered by the part.
    pub min_block: i64,
    /// Highest block number covered by the part.
    pub max_block: i64,
    /// Merge depth; zero for freshly inserted parts.
    pub level: u32,
    /// Disk holding the part's files.
    pub disk: DiskId,
    /// Catalog state.
    pub state: PartState,
    /// MVCC creation/removal metadata.
    pub version: VersionMetadata,
    /// Compressed size on disk.
    pub bytes_on_disk: u64,
    /// Row count.
    pub rows: u64,
}

impl DataPart {
    /// Build an active, prehistoric level-0 part covering `[min_block, max_block]`.
    pub fn new(
        partition_id: impl Into<PartitionId>,
        min_block: i64,
        max_block: i64,
        disk: impl Into<DiskId>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            min_block,
            max_block,
            level: 0,
            disk: disk.into(),
            state: PartState::Active,
            version: VersionMetadata::prehistoric(),
            bytes_on_disk: 0,
            rows: 0,
        }
    }

    /// Build a part from its canonical name.
    pub fn from_name(name: &str, disk: impl Into<DiskId>) -> Result<Self, PartNameError> {
        let parsed = PartName::parse(name)?;
        Ok(Self {
            level: parsed.level,
            ..Self::new(parsed.partition_id, parsed.min_block, parsed.max_block, disk)
        })
    }

    /// Set the merge level.
    pub fn with_level(self, level: u32) -> Self {
        Self { level, ..self }
    }

    /// Set the catalog state.
    pub fn with_state(self, state: PartState) -> Self {
        Self { state, ..self }
    }

    /// Set the MVCC metadata.
    pub fn with_version(self, version: VersionMetadata) -> Self {
        Self { version, ..self }
    }

    /// Set size statistics.
    pub fn with_stats(self, bytes_on_disk: u64, rows: u64) -> Self {
        Self {
            bytes_on_disk,
            rows,
            ..self
        }
    }

    /// Canonical `<partition>_<min>_<max>_<level>` name.
    pub fn name(&self) -> PartName {
        PartName {
            partition_id: self.partition_id.clone(),
            min_block: self.min_block,
            max_block: self.max_block,
            level: self.level,
        }
    }

    /// Ordering key within the catalog: partition, then block range.
    pub(crate) fn sort_key(&self) -> (&PartitionId, i64, i64) {
        (&self.partition_id, self.min_block, self.max_block)
    }
}
