use crate::wal::LogError;
use crate::storage::{Page, StorageError};
use thiserror::Error;

mod slot;
mod clock;
mod manager;

pub use slot::{Buffer, BufferRef};
pub use manager::BufferManager;

pub const DEFAULT_MAX_CLOCK_ROTATIONS: usize = 5;

/// `FrameID` is the position of a slot in the buffer
/// pool, it's used internally as offset in memory.
pub type FrameID = usize;

/// Initializes the content of a freshly appended block,
/// knows the record layout the block will hold.
pub trait PageFormatter {
    fn format(&self, page: &mut Page) -> Result<(), StorageError>;
}

impl<F> PageFormatter for F
where
    F: Fn(&mut Page) -> Result<(), StorageError>,
{
    fn format(&self, page: &mut Page) -> Result<(), StorageError> {
        self(page)
    }
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("no unpinned buffer is available")]
    PoolExhausted,
    #[error("StorageError: {0}")]
    Storage(#[from] StorageError),
    #[error("LogError: {0}")]
    Log(#[from] LogError),
}
