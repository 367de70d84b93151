pub mod buffer;
pub mod config;
pub mod db;
pub mod wal;
pub mod recovery;
pub mod storage;

pub use crate::buffer::{BufferError, BufferManager, BufferRef, PageFormatter};
pub use crate::config::Config;
pub use crate::db::{Database, DatabaseError};
pub use crate::wal::{LogManager, Lsn, TxnId};
pub use crate::recovery::{LogRecord, RecoveryManager, UpdateRecord};
pub use crate::storage::{BlockId, DiskManager, Page, PAGE_SIZE};
