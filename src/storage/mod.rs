use thiserror::Error;

mod block;
mod disk;
mod page;

pub use block::BlockId;
pub use disk::DiskManager;
pub use page::Page;

pub const PAGE_SIZE: usize = 4096;

/// `BlockNum` is the zero-based position of a block
/// inside its file, it's used as offset for disk.
pub type BlockNum = usize;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
    #[error("block {0} is out of bound")]
    BlockOutOfBound(BlockId),
    #[error("access of {len} bytes at offset {offset} overflows the page")]
    PageOverflow { offset: usize, len: usize },
    #[error("string at offset {0} is not valid utf-8")]
    InvalidUtf8(usize),
}
