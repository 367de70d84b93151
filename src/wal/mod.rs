use crate::storage::StorageError;
use thiserror::Error;

mod entry;
mod manager;

pub use entry::{LogEntry, LogField};
pub use manager::{LogIterator, LogManager};

/// `Lsn` is the sequence number handed out by the log for
/// every appended record, it starts from 1 in each session.
pub type Lsn = u64;
/// `TxnId` identifies the transaction a record belongs to,
/// it's persisted as an int field of the record.
pub type TxnId = i32;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("StorageError: {0}")]
    Storage(#[from] StorageError),
    #[error("corrupt log entry: expected {expected} at byte {position}")]
    CorruptEntry {
        position: usize,
        expected: &'static str,
    },
    #[error("{field} {value} does not fit in an int field")]
    FieldOutOfRange { field: &'static str, value: usize },
    #[error("log record of {0} bytes does not fit in a log block")]
    RecordTooLarge(usize),
    #[error("unknown log operation {0}")]
    UnknownOperation(i32),
}
