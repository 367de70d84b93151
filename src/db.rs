use crate::buffer::{BufferError, BufferManager};
use crate::config::{Config, ConfigError};
use crate::recovery::{RecoveryError, RecoveryManager, RecoveryStats};
use crate::storage::{DiskManager, StorageError};
use crate::wal::{LogError, LogManager, TxnId};
use log::info;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// transaction number used by the recovery pass at startup
pub const RECOVERY_TXN: TxnId = 0;

/// `Database` wires the disk, the log and the buffer pool
/// together. Components that need them get them from here
/// explicitly.
pub struct Database {
    config: Config,
    buffers: Arc<BufferManager>,
    next_txn: AtomicI32,
    recovery_stats: RecoveryStats,
}

impl Database {
    /// Open the database in `config.directory` and undo whatever
    /// unfinished transactions the log still holds.
    pub fn open(config: Config) -> Result<Self, DatabaseError> {
        config.validate()?;
        let disk = Arc::new(DiskManager::new(&config.directory)?);
        let log = Arc::new(LogManager::new(disk.clone(), &config.log_file)?);
        let buffers = Arc::new(BufferManager::new(
            config.pool_size,
            config.max_clock_rotations,
            disk,
            log,
        ));
        let recovery_stats = RecoveryManager::new(RECOVERY_TXN, buffers.clone())?.recover()?;
        info!(
            "database: open at {}, {} buffers available",
            config.directory.display(),
            buffers.available()
        );
        Ok(Self {
            next_txn: AtomicI32::new(recovery_stats.max_txn.max(RECOVERY_TXN) + 1),
            config,
            buffers,
            recovery_stats,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn buffers(&self) -> &Arc<BufferManager> {
        &self.buffers
    }
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery_stats
    }

    /// Start a new transaction and hand out its recovery manager.
    pub fn begin(&self) -> Result<RecoveryManager, DatabaseError> {
        let txn = self.next_txn.fetch_add(1, Ordering::SeqCst);
        Ok(RecoveryManager::new(txn, self.buffers.clone())?)
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("ConfigError: {0}")]
    Config(#[from] ConfigError),
    #[error("StorageError: {0}")]
    Storage(#[from] StorageError),
    #[error("LogError: {0}")]
    Log(#[from] LogError),
    #[error("BufferError: {0}")]
    Buffer(#[from] BufferError),
    #[error("RecoveryError: {0}")]
    Recovery(#[from] RecoveryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Page;
    use uuid::Uuid;

    #[test]
    fn open_and_reopen_test() {
        let directory = std::env::temp_dir().join(format!("clockdb-{}", Uuid::new_v4()));
        let mut config = Config::new(&directory);
        config.pool_size = 4;
        {
            let db = Database::open(config.clone()).unwrap();
            assert_eq!(db.buffers().available(), 4);
            assert_eq!(db.recovery_stats(), &RecoveryStats::default());
            let t1 = db.begin().unwrap();
            let t2 = db.begin().unwrap();
            assert_eq!(t1.txn(), 1);
            assert_eq!(t2.txn(), 2);
            let buffer = db
                .buffers()
                .pin_new("f", &|_: &mut Page| -> Result<(), StorageError> { Ok(()) })
                .unwrap();
            t2.set_string(&buffer, 0, "lost").unwrap();
            db.buffers().unpin(buffer);
            // the page reaches disk but txn 2 never commits
            db.buffers().flush_all(2).unwrap();
        }
        let db = Database::open(config).unwrap();
        assert_eq!(db.recovery_stats().incomplete_txns, vec![2]);
        // numbering continues after what the log has seen
        assert_eq!(db.begin().unwrap().txn(), 3);
        let buffer = db.buffers().pin(&crate::storage::BlockId::new("f", 0)).unwrap();
        assert_eq!(buffer.get_string(0).unwrap(), "");
        db.buffers().unpin(buffer);
        db.buffers().disk().clear().unwrap();
    }

    #[test]
    fn invalid_config_test() {
        let mut config = Config::new(std::env::temp_dir().join("clockdb-never-created"));
        config.pool_size = 0;
        assert!(matches!(
            Database::open(config),
            Err(DatabaseError::Config(_))
        ));
    }
}
