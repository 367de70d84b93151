use crate::buffer::BufferError;
use crate::storage::StorageError;
use crate::wal::LogError;
use thiserror::Error;

mod manager;
mod record;

pub use manager::{RecoveryManager, RecoveryStats};
pub use record::{LogRecord, UpdateRecord, COMMIT, ROLLBACK, START, UPDATE};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("BufferError: {0}")]
    Buffer(#[from] BufferError),
    #[error("LogError: {0}")]
    Log(#[from] LogError),
    #[error("StorageError: {0}")]
    Storage(#[from] StorageError),
}
