use thiserror::Error;

use crate::{catalog::CatalogError, mvcc::TxnError, placement::PlacementError};

/// Failure of a whole `collect` call; no partial ranges are ever returned.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The catalog could not hand out an active-set snapshot.
    #[error("part catalog of table `{table}` is unavailable: {source}")]
    CatalogUnavailable {
        /// Table whose catalog failed.
        table: String,
        /// Underlying catalog failure.
        #[source]
        source: CatalogError,
    },
    /// The non-transactional committed snapshot could not be captured.
    #[error("transaction snapshot is unavailable: {0}")]
    Transaction(#[from] TxnError),
    /// Metadata and catalog belong to different tables.
    #[error("metadata describes table `{expected}` but the catalog holds `{found}`")]
    TableMismatch {
        /// Table named by the metadata.
        expected: String,
        /// Table owning the catalog.
        found: String,
    },
    /// The placement policy could not answer for a part's disk.
    #[error("placement policy query failed: {0}")]
    Placement(#[from] PlacementError),
}

impl CollectError {
    /// Whether the scheduler may simply retry on its next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CatalogUnavailable { source, .. } => source.is_retryable(),
            Self::Transaction(err) => *err == TxnError::Poisoned,
            Self::TableMismatch { .. } | Self::Placement(_) => false,
        }
    }
}
