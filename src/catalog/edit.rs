use crate::{
    mvcc::TxnId,
    part::{DataPart, PartName, PartState},
};

/// Catalog edits applied sequentially to produce a new version.
#[derive(Debug, Clone)]
pub enum CatalogEdit {
    /// Register a new part.
    Add(DataPart),
    /// Move a part to another state.
    SetState {
        /// Part to update.
        name: PartName,
        /// New state.
        state: PartState,
    },
    /// Record (or clear) the transaction removing a part.
    SetRemoval {
        /// Part to update.
        name: PartName,
        /// Removing transaction; `None` clears a rolled-back removal.
        txn: Option<TxnId>,
    },
    /// Forget a part entirely.
    Remove {
        /// Part to drop.
        name: PartName,
    },
}
