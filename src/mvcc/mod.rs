//! MVCC core utilities (transaction ids, frozen snapshots, and visibility).

mod txn_log;

use std::{collections::BTreeSet, fmt, sync::Arc};

pub use self::txn_log::{TransactionLog, TxnError, TxnStatus};
use crate::part::VersionMetadata;

/// Identifier of a transaction that created or removed a part.
///
/// Ids are handed out in begin order, so an id at or above a snapshot's
/// horizon belongs to a transaction that started after the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(u64);

impl TxnId {
    /// Transaction standing in for non-transactional writes.
    ///
    /// It is committed from the start and visible to every snapshot.
    pub const PREHISTORIC: Self = Self(0);

    /// Construct an id from a raw `u64`.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw `u64` value backing this id.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    pub(crate) const fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Immutable read view captured when a reader starts; decides MVCC visibility.
///
/// A snapshot sees its owner, [`TxnId::PREHISTORIC`], and every transaction
/// that began before `horizon` and had committed at capture: ids in the
/// captured in-flight list or in the rolled-back set are excluded. Capture
/// costs O(running transactions), never O(history), and clones share the
/// captured sets.
#[derive(Clone, Debug)]
pub struct TxnSnapshot {
    owner: Option<TxnId>,
    horizon: TxnId,
    in_flight: Arc<[TxnId]>,
    rolled_back: Arc<BTreeSet<TxnId>>,
}

impl TxnSnapshot {
    /// Snapshot owned by `owner` that sees every transaction below `horizon`.
    pub fn new(owner: TxnId, horizon: TxnId) -> Self {
        Self::captured(Some(owner), horizon, Vec::new(), Arc::default())
    }

    pub(crate) fn captured(
        owner: Option<TxnId>,
        horizon: TxnId,
        mut in_flight: Vec<TxnId>,
        rolled_back: Arc<BTreeSet<TxnId>>,
    ) -> Self {
        in_flight.sort_unstable();
        Self {
            owner,
            horizon,
            in_flight: in_flight.into(),
            rolled_back,
        }
    }

    /// Transaction that owns this snapshot, `None` outside a transaction.
    pub fn owner(&self) -> Option<TxnId> {
        self.owner
    }

    /// Returns `true` when the snapshot belongs to a transaction.
    pub fn is_transactional(&self) -> bool {
        self.owner.is_some()
    }

    /// Whether the effects of `txn` are visible to this snapshot.
    pub fn sees(&self, txn: TxnId) -> bool {
        if txn == TxnId::PREHISTORIC || self.owner == Some(txn) {
            return true;
        }
        txn < self.horizon
            && self.in_flight.binary_search(&txn).is_err()
            && !self.rolled_back.contains(&txn)
    }
}

/// Visibility of a part's version metadata to `snapshot`.
///
/// A part is visible when its creation is seen and its removal, if any, is
/// not. An in-flight or unseen removal leaves the part visible.
pub fn is_visible(version: &VersionMetadata, snapshot: &TxnSnapshot) -> bool {
    if !snapshot.sees(version.creation_txn) {
        return false;
    }
    match version.removal_txn {
        None => true,
        Some(removal) => !snapshot.sees(removal),
    }
}
