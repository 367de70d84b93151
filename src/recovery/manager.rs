use super::{LogRecord, RecoveryError, UpdateRecord};
use crate::buffer::{BufferManager, BufferRef};
use crate::wal::{Lsn, TxnId};
use itertools::Itertools;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

/// What a recovery pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub undone_records: usize,
    /// transactions found without commit or rollback
    pub incomplete_txns: Vec<TxnId>,
    /// the largest transaction number in the log
    pub max_txn: TxnId,
}

/// `RecoveryManager` belongs to one transaction. It logs the
/// transaction's writes before they reach the page and walks
/// the log backward to undo them.
pub struct RecoveryManager {
    txn: TxnId,
    buffers: Arc<BufferManager>,
}

impl RecoveryManager {
    pub fn new(txn: TxnId, buffers: Arc<BufferManager>) -> Result<Self, RecoveryError> {
        LogRecord::Start { txn }.write_to_log(buffers.log())?;
        debug!("recovery: start txn {}", txn);
        Ok(Self { txn, buffers })
    }

    pub fn txn(&self) -> TxnId {
        self.txn
    }
    pub fn buffers(&self) -> &Arc<BufferManager> {
        &self.buffers
    }

    /// Log the value at `offset` then overwrite it. The buffer is
    /// held for writing across both steps.
    pub fn set_string(
        &self,
        buffer: &BufferRef,
        offset: usize,
        value: &str,
    ) -> Result<Lsn, RecoveryError> {
        let mut guard = buffer.write();
        let old_value = guard.page().get_string(offset)?;
        let record = LogRecord::Update(UpdateRecord::new(
            self.txn,
            buffer.block().clone(),
            offset,
            old_value,
            value,
        ));
        let lsn = record.write_to_log(self.buffers.log())?;
        guard.page_mut().set_string(offset, value)?;
        guard.set_modified(self.txn, Some(lsn));
        Ok(lsn)
    }

    pub fn commit(&self) -> Result<(), RecoveryError> {
        self.buffers.flush_all(self.txn)?;
        let lsn = LogRecord::Commit { txn: self.txn }.write_to_log(self.buffers.log())?;
        self.buffers.log().flush(lsn)?;
        info!("recovery: commit txn {}", self.txn);
        Ok(())
    }

    /// Undo the transaction's updates, newest first, up to its
    /// start record.
    pub fn rollback(&self) -> Result<usize, RecoveryError> {
        let mut undone = 0;
        for entry in self.buffers.log().iter_backward()? {
            let record = LogRecord::decode(entry?)?;
            if record.tx_number() != self.txn {
                continue;
            }
            if let LogRecord::Start { .. } = record {
                break;
            }
            record.undo(self.txn, &self.buffers)?;
            undone += 1;
        }
        self.buffers.flush_all(self.txn)?;
        let lsn = LogRecord::Rollback { txn: self.txn }.write_to_log(self.buffers.log())?;
        self.buffers.log().flush(lsn)?;
        info!("recovery: rollback txn {}, {} updates undone", self.txn, undone);
        Ok(undone)
    }

    /// Undo every update of every transaction that never committed
    /// or rolled back, then mark those transactions rolled back.
    /// Running it again after a crash in the middle restores
    /// the same values.
    pub fn recover(&self) -> Result<RecoveryStats, RecoveryError> {
        info!("recovery: start");
        let mut finished = HashSet::new();
        let mut incomplete = HashSet::new();
        let mut stats = RecoveryStats::default();
        for entry in self.buffers.log().iter_backward()? {
            let record = LogRecord::decode(entry?)?;
            stats.max_txn = stats.max_txn.max(record.tx_number());
            match &record {
                LogRecord::Commit { txn } | LogRecord::Rollback { txn } => {
                    finished.insert(*txn);
                }
                LogRecord::Update(_) if !finished.contains(&record.tx_number()) => {
                    debug!("recovery: undo {}", record);
                    record.undo(self.txn, &self.buffers)?;
                    incomplete.insert(record.tx_number());
                    stats.undone_records += 1;
                }
                _ => {}
            }
        }
        self.buffers.flush_all(self.txn)?;
        stats.incomplete_txns = incomplete.into_iter().sorted().collect_vec();
        for &txn in stats.incomplete_txns.iter() {
            LogRecord::Rollback { txn }.write_to_log(self.buffers.log())?;
        }
        let lsn = LogRecord::Commit { txn: self.txn }.write_to_log(self.buffers.log())?;
        self.buffers.log().flush(lsn)?;
        info!(
            "recovery: done, {} updates of {} transactions undone",
            stats.undone_records,
            stats.incomplete_txns.len()
        );
        Ok(stats)
    }
}
