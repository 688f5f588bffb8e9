use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;

use super::{TxnId, TxnSnapshot};

/// Lifecycle state of a transaction known to the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnStatus {
    /// Started and neither committed nor rolled back.
    Running,
    /// Committed; visible to snapshots captured afterwards.
    Committed,
    /// Rolled back; never visible to anyone but itself.
    RolledBack,
}

/// Errors raised by the transaction log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxnError {
    /// A thread panicked while holding the log lock.
    #[error("transaction log lock is poisoned")]
    Poisoned,
    /// The transaction was never started on this log.
    #[error("unknown transaction {0}")]
    Unknown(TxnId),
    /// Commit or rollback attempted on a finished transaction.
    #[error("transaction {txn} already finished as {status:?}")]
    AlreadyFinished {
        /// Offending transaction.
        txn: TxnId,
        /// Status it finished with.
        status: TxnStatus,
    },
}

#[derive(Debug)]
struct LogState {
    next: TxnId,
    running: BTreeSet<TxnId>,
    rolled_back: Arc<BTreeSet<TxnId>>,
}

impl LogState {
    fn capture(&self, owner: Option<TxnId>) -> TxnSnapshot {
        TxnSnapshot::captured(
            owner,
            self.next,
            self.running.iter().copied().collect(),
            Arc::clone(&self.rolled_back),
        )
    }

    fn status(&self, txn: TxnId) -> Option<TxnStatus> {
        if txn >= self.next {
            None
        } else if self.running.contains(&txn) {
            Some(TxnStatus::Running)
        } else if self.rolled_back.contains(&txn) {
            Some(TxnStatus::RolledBack)
        } else {
            Some(TxnStatus::Committed)
        }
    }
}

/// In-memory transaction manager handing out ids and frozen snapshots.
///
/// Only running and rolled-back transactions are tracked; any other id below
/// the next one to be handed out has committed. Capturing a snapshot copies
/// the running set, so its cost follows concurrency rather than history.
#[derive(Debug)]
pub struct TransactionLog {
    state: Mutex<LogState>,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self {
            state: Mutex::new(LogState {
                next: TxnId::PREHISTORIC.successor(),
                running: BTreeSet::new(),
                rolled_back: Arc::default(),
            }),
        }
    }
}

impl TransactionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogState>, TxnError> {
        self.state.lock().map_err(|_| TxnError::Poisoned)
    }

    /// Start a transaction and capture its snapshot.
    pub fn begin(&self) -> Result<TxnSnapshot, TxnError> {
        let mut state = self.lock()?;
        let txn = state.next;
        let snapshot = state.capture(Some(txn));
        state.next = txn.successor();
        state.running.insert(txn);
        Ok(snapshot)
    }

    /// Snapshot of everything committed so far, for non-transactional readers.
    pub fn committed_snapshot(&self) -> Result<TxnSnapshot, TxnError> {
        Ok(self.lock()?.capture(None))
    }

    /// Current status of `txn`.
    pub fn status(&self, txn: TxnId) -> Result<TxnStatus, TxnError> {
        if txn == TxnId::PREHISTORIC {
            return Ok(TxnStatus::Committed);
        }
        self.lock()?.status(txn).ok_or(TxnError::Unknown(txn))
    }

    /// Mark `txn` committed.
    pub fn commit(&self, txn: TxnId) -> Result<(), TxnError> {
        self.finish(txn, TxnStatus::Committed)
    }

    /// Mark `txn` rolled back.
    pub fn rollback(&self, txn: TxnId) -> Result<(), TxnError> {
        self.finish(txn, TxnStatus::RolledBack)
    }

    fn finish(&self, txn: TxnId, outcome: TxnStatus) -> Result<(), TxnError> {
        let mut state = self.lock()?;
        if !state.running.remove(&txn) {
            return Err(match state.status(txn) {
                Some(status) if txn != TxnId::PREHISTORIC => {
                    TxnError::AlreadyFinished { txn, status }
                }
                _ => TxnError::Unknown(txn),
            });
        }
        if outcome == TxnStatus::RolledBack {
            // Snapshots holding the previous set keep it unchanged.
            Arc::make_mut(&mut state.rolled_back).insert(txn);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_frozen_at_begin() {
        let log = TransactionLog::new();
        let writer = log.begin().expect("begin").owner().expect("owner");
        let reader = log.begin().expect("begin");
        log.commit(writer).expect("commit");

        assert!(!reader.sees(writer));
        assert!(log.begin().expect("begin").sees(writer));
        assert!(log.committed_snapshot().expect("snapshot").sees(writer));
    }

    #[test]
    fn rolled_back_is_never_visible() {
        let log = TransactionLog::new();
        let txn = log.begin().expect("begin").owner().expect("owner");
        log.rollback(txn).expect("rollback");
        assert_eq!(log.status(txn), Ok(TxnStatus::RolledBack));
        assert!(!log.committed_snapshot().expect("snapshot").sees(txn));
    }

    #[test]
    fn finishing_twice_fails() {
        let log = TransactionLog::new();
        let txn = log.begin().expect("begin").owner().expect("owner");
        log.commit(txn).expect("commit");
        assert_eq!(
            log.rollback(txn),
            Err(TxnError::AlreadyFinished {
                txn,
                status: TxnStatus::Committed,
            })
        );
        assert_eq!(
            log.commit(TxnId::new(99)),
            Err(TxnError::Unknown(TxnId::new(99)))
        );
    }

    #[test]
    fn prehistoric_is_committed() {
        let log = TransactionLog::new();
        assert_eq!(log.status(TxnId::PREHISTORIC), Ok(TxnStatus::Committed));
        let first = log.begin().expect("begin").owner().expect("owner");
        assert_ne!(first, TxnId::PREHISTORIC);
    }

    #[test]
    fn snapshot_cost_does_not_follow_history() {
        let log = TransactionLog::new();
        let long_running = log.begin().expect("begin").owner().expect("owner");
        let mut last = TxnId::PREHISTORIC;
        for _ in 0..20_000 {
            last = log.begin().expect("begin").owner().expect("owner");
            log.commit(last).expect("commit");
        }

        let reader = log.begin().expect("begin");
        let committed = log.committed_snapshot().expect("snapshot");
        assert_eq!(&*reader.in_flight, &[long_running]);
        assert_eq!(committed.in_flight.len(), 2);
        assert!(committed.rolled_back.is_empty());
        assert!(reader.sees(last) && committed.sees(last));
        assert!(!reader.sees(long_running));

        let state = log.lock().expect("lock");
        assert_eq!(state.running.len(), 2);
        assert!(state.rolled_back.is_empty());
    }

    #[test]
    fn rollback_after_capture_leaves_snapshot_unchanged() {
        let log = TransactionLog::new();
        let early = log.begin().expect("begin").owner().expect("owner");
        log.rollback(early).expect("rollback");
        let late = log.begin().expect("begin").owner().expect("owner");
        let reader = log.committed_snapshot().expect("snapshot");
        log.rollback(late).expect("rollback");

        assert_eq!(reader.rolled_back.len(), 1);
        assert!(!reader.sees(early) && !reader.sees(late));
        assert_eq!(log.status(late), Ok(TxnStatus::RolledBack));
    }
}
