use super::clock::ClockReplacer;
use super::{Buffer, BufferError, BufferRef, FrameID, PageFormatter};
use crate::storage::{BlockId, DiskManager};
use crate::wal::{LogManager, TxnId};
use itertools::Itertools;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Pool {
    replacer: ClockReplacer,
    buffers: Vec<Arc<RwLock<Buffer>>>,
    block_table: HashMap<BlockId, FrameID>,
}

/// `BufferManager` owns a fixed number of buffers and decides which
/// block each of them holds. Every operation except `available` runs
/// under one pool-wide lock. Nothing here waits for a buffer to be
/// released: a full pool is reported with `BufferError::PoolExhausted`.
pub struct BufferManager {
    disk: Arc<DiskManager>,
    log: Arc<LogManager>,
    pool: Mutex<Pool>,
    num_available: AtomicUsize,
    size: usize,
    max_clock_rotations: usize,
}

impl BufferManager {
    pub fn new(
        size: usize,
        max_clock_rotations: usize,
        disk: Arc<DiskManager>,
        log: Arc<LogManager>,
    ) -> Self {
        let buffers = (0..size)
            .map(|_| Arc::new(RwLock::new(Buffer::new())))
            .collect_vec();
        info!(
            "buffer: pool of {} buffers, gclock rotations {}",
            size, max_clock_rotations
        );
        Self {
            disk,
            log,
            pool: Mutex::new(Pool {
                replacer: ClockReplacer::new(size, max_clock_rotations),
                buffers,
                block_table: HashMap::new(),
            }),
            num_available: AtomicUsize::new(size),
            size,
            max_clock_rotations,
        }
    }

    pub fn disk(&self) -> &Arc<DiskManager> {
        &self.disk
    }
    pub fn log(&self) -> &Arc<LogManager> {
        &self.log
    }
    pub fn pool_size(&self) -> usize {
        self.size
    }
    pub fn max_clock_rotations(&self) -> usize {
        self.max_clock_rotations
    }

    /// Number of unpinned buffers. It's read without the pool lock,
    /// a following `pin` may still fail.
    pub fn available(&self) -> usize {
        self.num_available.load(Ordering::SeqCst)
    }

    pub fn is_resident(&self, block: &BlockId) -> bool {
        self.pool.lock().block_table.contains_key(block)
    }
    /// outstanding pins on `block`, 0 if it's not resident
    pub fn pin_count(&self, block: &BlockId) -> usize {
        let pool = self.pool.lock();
        pool.block_table
            .get(block)
            .map_or(0, |&frame_id| pool.replacer.pin_count(frame_id))
    }

    /// Pin a buffer to `block`, reading it from disk unless
    /// some buffer already holds it.
    pub fn pin(&self, block: &BlockId) -> Result<BufferRef, BufferError> {
        let mut pool = self.pool.lock();
        let resident = pool.block_table.get(block).copied();
        let frame_id = match resident {
            Some(frame_id) => {
                pool.replacer.touch(frame_id);
                frame_id
            }
            None => {
                let frame_id = self.choose_unpinned_buffer(&mut pool)?;
                let assigned = pool.buffers[frame_id]
                    .write()
                    .assign_to_block(block.clone(), &self.disk);
                if let Err(err) = assigned {
                    pool.replacer.assign(frame_id, None);
                    return Err(err.into());
                }
                pool.replacer.assign(frame_id, Some(block.clone()));
                pool.block_table.insert(block.clone(), frame_id);
                debug!("buffer: {} loaded into frame {}", block, frame_id);
                frame_id
            }
        };
        Ok(self.pin_frame(&mut pool, frame_id, block.clone()))
    }

    /// Append a new block to `file_name`, formatted by `formatter`,
    /// and pin a buffer to it.
    pub fn pin_new(
        &self,
        file_name: &str,
        formatter: &dyn PageFormatter,
    ) -> Result<BufferRef, BufferError> {
        let mut pool = self.pool.lock();
        let frame_id = self.choose_unpinned_buffer(&mut pool)?;
        let assigned = pool.buffers[frame_id]
            .write()
            .assign_to_new(file_name, formatter, &self.disk);
        let block = match assigned {
            Ok(block) => block,
            Err(err) => {
                pool.replacer.assign(frame_id, None);
                return Err(err.into());
            }
        };
        pool.replacer.assign(frame_id, Some(block.clone()));
        pool.block_table.insert(block.clone(), frame_id);
        debug!("buffer: new {} in frame {}", block, frame_id);
        Ok(self.pin_frame(&mut pool, frame_id, block))
    }

    fn pin_frame(&self, pool: &mut Pool, frame_id: FrameID, block: BlockId) -> BufferRef {
        if pool.replacer.pin(frame_id) {
            self.num_available.fetch_sub(1, Ordering::SeqCst);
        }
        BufferRef::new(frame_id, block, pool.buffers[frame_id].clone())
    }

    /// Release one pin. The buffer keeps its block until
    /// the clock picks it as a victim.
    pub fn unpin(&self, buffer: BufferRef) {
        let mut pool = self.pool.lock();
        debug_assert_eq!(pool.block_table.get(buffer.block()), Some(&buffer.slot()));
        if pool.replacer.unpin(buffer.slot()) {
            self.num_available.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Write back every buffer modified by `txn`, pinned or not.
    /// Returns the number of buffers written.
    pub fn flush_all(&self, txn: TxnId) -> Result<usize, BufferError> {
        let pool = self.pool.lock();
        let mut flushed = 0;
        for buffer in pool.buffers.iter() {
            let mut buffer = buffer.write();
            if buffer.block().is_some()
                && buffer.is_modified_by(txn)
                && buffer.flush(&self.disk, &self.log)?
            {
                flushed += 1;
            }
        }
        debug!("buffer: flushed {} buffers of txn {}", flushed, txn);
        Ok(flushed)
    }

    /// Take a frame for a new block. The old block is written back
    /// before it leaves the block table, if that fails the frame
    /// keeps holding it and the error is returned.
    fn choose_unpinned_buffer(&self, pool: &mut Pool) -> Result<FrameID, BufferError> {
        let frame_id = pool.replacer.victim().ok_or(BufferError::PoolExhausted)?;
        if let Some(old) = pool.replacer.block(frame_id).cloned() {
            pool.buffers[frame_id]
                .write()
                .flush(&self.disk, &self.log)?;
            pool.block_table.remove(&old);
            debug!("buffer: evict {} from frame {}", old, frame_id);
        }
        Ok(frame_id)
    }
}
