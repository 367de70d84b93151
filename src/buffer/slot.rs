use super::{BufferError, FrameID, PageFormatter};
use crate::storage::{BlockId, DiskManager, Page, StorageError};
use crate::wal::{LogManager, Lsn, TxnId};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// `Buffer` is the content of one slot in the pool: the page
/// of the block it holds and who modified it last.
pub struct Buffer {
    page: Page,
    block: Option<BlockId>,
    modifying_txn: Option<TxnId>,
    lsn: Option<Lsn>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            page: Page::new(),
            block: None,
            modifying_txn: None,
            lsn: None,
        }
    }
    pub fn page(&self) -> &Page {
        &self.page
    }
    /// Mutating the page directly does not mark the buffer
    /// modified, call `set_modified` afterwards.
    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }
    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }
    pub fn modifying_txn(&self) -> Option<TxnId> {
        self.modifying_txn
    }
    pub fn lsn(&self) -> Option<Lsn> {
        self.lsn
    }
    pub fn is_modified_by(&self, txn: TxnId) -> bool {
        self.modifying_txn == Some(txn)
    }
    /// `lsn` of `None` marks a change that was not logged,
    /// the lsn watermark stays where it is.
    pub fn set_modified(&mut self, txn: TxnId, lsn: Option<Lsn>) {
        self.modifying_txn = Some(txn);
        if let Some(lsn) = lsn {
            self.lsn = Some(self.lsn.map_or(lsn, |old| old.max(lsn)));
        }
    }

    /// Write the page back if it's dirty. The log is forced up
    /// to the page's lsn first. Returns whether a write happened.
    pub(super) fn flush(&mut self, disk: &DiskManager, log: &LogManager) -> Result<bool, BufferError> {
        if self.modifying_txn.is_none() {
            return Ok(false);
        }
        if let Some(lsn) = self.lsn {
            log.flush(lsn)?;
        }
        if let Some(block) = &self.block {
            disk.write(block, &self.page)?;
        }
        self.modifying_txn = None;
        Ok(true)
    }

    /// Load `block` into the slot. The old content must have
    /// been written back already.
    pub(super) fn assign_to_block(
        &mut self,
        block: BlockId,
        disk: &DiskManager,
    ) -> Result<(), StorageError> {
        debug_assert!(self.modifying_txn.is_none());
        self.reset();
        disk.read(&block, &mut self.page)?;
        self.block = Some(block);
        Ok(())
    }

    pub(super) fn assign_to_new(
        &mut self,
        file_name: &str,
        formatter: &dyn PageFormatter,
        disk: &DiskManager,
    ) -> Result<BlockId, StorageError> {
        debug_assert!(self.modifying_txn.is_none());
        self.reset();
        self.page.clear();
        formatter.format(&mut self.page)?;
        let block = disk.append(file_name, &self.page)?;
        self.block = Some(block.clone());
        Ok(block)
    }

    /// forget the block, the page content is kept
    pub(super) fn reset(&mut self) {
        self.block = None;
        self.modifying_txn = None;
        self.lsn = None;
    }
}

/// `BufferRef` is the handle of one pin on a slot. While it's
/// alive the slot keeps holding `block`. It must be handed back
/// through `BufferManager::unpin`.
pub struct BufferRef {
    frame_id: FrameID,
    block: BlockId,
    buffer: Arc<RwLock<Buffer>>,
}

impl BufferRef {
    pub(super) fn new(frame_id: FrameID, block: BlockId, buffer: Arc<RwLock<Buffer>>) -> Self {
        Self {
            frame_id,
            block,
            buffer,
        }
    }
    pub fn block(&self) -> &BlockId {
        &self.block
    }
    pub fn slot(&self) -> FrameID {
        self.frame_id
    }
    /// Guards must not be held across calls into the buffer
    /// manager, it locks the same buffers when flushing.
    pub fn read(&self) -> RwLockReadGuard<'_, Buffer> {
        self.buffer.read()
    }
    pub fn write(&self) -> RwLockWriteGuard<'_, Buffer> {
        self.buffer.write()
    }
    pub fn get_int(&self, offset: usize) -> Result<i32, StorageError> {
        self.read().page.get_int(offset)
    }
    pub fn get_string(&self, offset: usize) -> Result<String, StorageError> {
        self.read().page.get_string(offset)
    }
    pub fn set_int(
        &self,
        offset: usize,
        value: i32,
        txn: TxnId,
        lsn: Option<Lsn>,
    ) -> Result<(), StorageError> {
        let mut buffer = self.write();
        buffer.page.set_int(offset, value)?;
        buffer.set_modified(txn, lsn);
        Ok(())
    }
    pub fn set_string(
        &self,
        offset: usize,
        value: &str,
        txn: TxnId,
        lsn: Option<Lsn>,
    ) -> Result<(), StorageError> {
        let mut buffer = self.write();
        buffer.page.set_string(offset, value)?;
        buffer.set_modified(txn, lsn);
        Ok(())
    }
    pub fn modifying_txn(&self) -> Option<TxnId> {
        self.read().modifying_txn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_modified_test() {
        let mut buffer = Buffer::new();
        assert_eq!(buffer.modifying_txn(), None);
        buffer.set_modified(3, Some(10));
        assert!(buffer.is_modified_by(3));
        assert_eq!(buffer.lsn(), Some(10));
        // unlogged change keeps the watermark
        buffer.set_modified(4, None);
        assert!(buffer.is_modified_by(4));
        assert!(!buffer.is_modified_by(3));
        assert_eq!(buffer.lsn(), Some(10));
        // watermark never goes back
        buffer.set_modified(4, Some(7));
        assert_eq!(buffer.lsn(), Some(10));
    }

    #[test]
    fn flush_forces_log_then_page_test() {
        let disk = Arc::new(DiskManager::new_random().unwrap());
        let log = LogManager::new(disk.clone(), "test.log").unwrap();
        let block = disk.append("f", &Page::new()).unwrap();
        let mut buffer = Buffer::new();
        buffer.assign_to_block(block.clone(), &disk).unwrap();
        // clean buffer is not written
        assert!(!buffer.flush(&disk, &log).unwrap());
        let lsn = log.append(&[crate::wal::LogField::Int(1)]).unwrap();
        buffer.page_mut().set_string(8, "dirty").unwrap();
        buffer.set_modified(1, Some(lsn));
        assert!(buffer.flush(&disk, &log).unwrap());
        assert_eq!(buffer.modifying_txn(), None);
        // the log record reached the disk before the page
        let reopened = LogManager::new(disk.clone(), "test.log").unwrap();
        assert_eq!(reopened.iter_backward().unwrap().count(), 1);
        let mut page = Page::new();
        disk.read(&block, &mut page).unwrap();
        assert_eq!(page.get_string(8).unwrap(), "dirty");
        disk.clear().unwrap();
    }
}
