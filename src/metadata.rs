//! Schema and partitioning context of a table.

use crate::part::PartitionId;

/// Read-only description of the table whose parts are being collected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageMetadata {
    table: String,
    partition_key: Vec<String>,
}

impl StorageMetadata {
    /// Metadata of an unpartitioned table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            partition_key: Vec::new(),
        }
    }

    /// Set the columns forming the partition key.
    pub fn partition_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            partition_key: columns.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Partition key columns; empty for unpartitioned tables.
    pub fn partition_key(&self) -> &[String] {
        &self.partition_key
    }

    /// Returns `true` when the table has a partition key.
    pub fn is_partitioned(&self) -> bool {
        !self.partition_key.is_empty()
    }

    /// Whether `id` can name a partition of this table.
    ///
    /// Unpartitioned tables only ever hold the single `all` partition.
    pub fn accepts_partition(&self, id: &PartitionId) -> bool {
        self.is_partitioned() || id.as_str() == PartitionId::UNPARTITIONED
    }
}
