use super::{LogEntry, LogError, LogField, Lsn};
use crate::storage::{BlockId, DiskManager, Page, PAGE_SIZE};
use log::{debug, info};
use parking_lot::Mutex;
use std::mem::size_of;
use std::sync::Arc;

///
/// The log file is a sequence of blocks, every block has the format
///
/// ```text
/// | boundary: u32 | free space | record[k] | ... | record[1] | record[0] |
/// ```
///
/// Records grow from the end of the block towards the front, the
/// boundary points to the most recent one. Reading a block from the
/// boundary to the end therefore yields the newest record first.
///
const BOUNDARY_OFFSET: usize = 0;
const HEADER_SIZE: usize = size_of::<i32>();

struct LogTail {
    page: Page,
    block: BlockId,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

pub struct LogManager {
    disk: Arc<DiskManager>,
    log_file: String,
    tail: Mutex<LogTail>,
}

fn boundary(page: &Page) -> Result<usize, LogError> {
    let boundary = page.get_int(BOUNDARY_OFFSET)?;
    if boundary < HEADER_SIZE as i32 || boundary > PAGE_SIZE as i32 {
        return Err(LogError::CorruptEntry {
            position: BOUNDARY_OFFSET,
            expected: "block boundary",
        });
    }
    Ok(boundary as usize)
}

impl LogManager {
    pub fn new(disk: Arc<DiskManager>, log_file: &str) -> Result<Self, LogError> {
        let mut page = Page::new();
        let num_blocks = disk.num_blocks(log_file)?;
        let block = if num_blocks == 0 {
            Self::append_new_block(&disk, log_file, &mut page)?
        } else {
            let block = BlockId::new(log_file, num_blocks - 1);
            disk.read(&block, &mut page)?;
            boundary(&page)?;
            block
        };
        info!("log: open {} at {}", log_file, block);
        Ok(Self {
            disk,
            log_file: log_file.to_string(),
            tail: Mutex::new(LogTail {
                page,
                block,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    fn append_new_block(
        disk: &DiskManager,
        log_file: &str,
        page: &mut Page,
    ) -> Result<BlockId, LogError> {
        page.clear();
        page.set_int(BOUNDARY_OFFSET, PAGE_SIZE as i32)?;
        Ok(disk.append(log_file, page)?)
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// Append one record and return its sequence number. The
    /// record is only durable once `flush` covers its lsn.
    pub fn append(&self, fields: &[LogField]) -> Result<Lsn, LogError> {
        let bytes = LogField::encode_all(fields);
        let needed = Page::max_string_len(bytes.len());
        if needed > PAGE_SIZE - HEADER_SIZE {
            return Err(LogError::RecordTooLarge(bytes.len()));
        }
        let mut tail = self.tail.lock();
        let mut boundary = boundary(&tail.page)?;
        if boundary < needed + HEADER_SIZE {
            self.flush_tail(&mut tail)?;
            let LogTail { page, block, .. } = &mut *tail;
            *block = Self::append_new_block(&self.disk, &self.log_file, page)?;
            boundary = PAGE_SIZE;
        }
        let position = boundary - needed;
        tail.page.set_bytes(position, &bytes)?;
        tail.page.set_int(BOUNDARY_OFFSET, position as i32)?;
        tail.latest_lsn += 1;
        debug!("log: append lsn {} ({} bytes)", tail.latest_lsn, bytes.len());
        Ok(tail.latest_lsn)
    }

    /// Make sure the record with `lsn` is on disk.
    pub fn flush(&self, lsn: Lsn) -> Result<(), LogError> {
        let mut tail = self.tail.lock();
        if lsn > tail.last_saved_lsn {
            self.flush_tail(&mut tail)?;
        }
        Ok(())
    }

    fn flush_tail(&self, tail: &mut LogTail) -> Result<(), LogError> {
        self.disk.write(&tail.block, &tail.page)?;
        tail.last_saved_lsn = tail.latest_lsn;
        debug!("log: flushed up to lsn {}", tail.last_saved_lsn);
        Ok(())
    }

    pub fn latest_lsn(&self) -> Lsn {
        self.tail.lock().latest_lsn
    }

    /// Iterate over every record in the log, newest first.
    /// The whole log is flushed before the scan starts.
    pub fn iter_backward(&self) -> Result<LogIterator, LogError> {
        let block = {
            let mut tail = self.tail.lock();
            self.flush_tail(&mut tail)?;
            tail.block.clone()
        };
        LogIterator::new(self.disk.clone(), block)
    }
}

/// `LogIterator` walks the log from the tail block back to
/// block 0. It's a single pass and stops at the first error.
pub struct LogIterator {
    disk: Arc<DiskManager>,
    block: BlockId,
    page: Page,
    position: usize,
    done: bool,
}

impl LogIterator {
    fn new(disk: Arc<DiskManager>, block: BlockId) -> Result<Self, LogError> {
        let mut page = Page::new();
        disk.read(&block, &mut page)?;
        let position = boundary(&page)?;
        Ok(Self {
            disk,
            block,
            page,
            position,
            done: false,
        })
    }

    fn move_to_previous_block(&mut self) -> Result<(), LogError> {
        self.block = BlockId::new(self.block.file_name(), self.block.number() - 1);
        self.disk.read(&self.block, &mut self.page)?;
        self.position = boundary(&self.page)?;
        Ok(())
    }

    fn next_entry(&mut self) -> Result<Option<LogEntry>, LogError> {
        while self.position >= PAGE_SIZE {
            if self.block.number() == 0 {
                return Ok(None);
            }
            self.move_to_previous_block()?;
        }
        let bytes = self
            .page
            .get_bytes(self.position)
            .map_err(|_| LogError::CorruptEntry {
                position: self.position,
                expected: "record",
            })?
            .to_vec();
        self.position += Page::max_string_len(bytes.len());
        Ok(Some(LogEntry::new(bytes)))
    }
}

impl Iterator for LogIterator {
    type Item = Result<LogEntry, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_log() -> (Arc<DiskManager>, LogManager) {
        let disk = Arc::new(DiskManager::new_random().unwrap());
        let log = LogManager::new(disk.clone(), "test.log").unwrap();
        (disk, log)
    }

    fn read_all(log: &LogManager) -> Vec<(i32, String)> {
        log.iter_backward()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                (entry.next_int().unwrap(), entry.next_string().unwrap())
            })
            .collect()
    }

    #[test]
    fn empty_log_test() {
        let (disk, log) = new_log();
        assert_eq!(log.iter_backward().unwrap().count(), 0);
        disk.clear().unwrap();
    }

    #[test]
    fn lsn_and_backward_order_test() {
        let (disk, log) = new_log();
        for i in 0..10 {
            let lsn = log
                .append(&[LogField::Int(i), LogField::Str(format!("record {}", i))])
                .unwrap();
            assert_eq!(lsn, i as Lsn + 1);
        }
        let records = read_all(&log);
        assert_eq!(records.len(), 10);
        for (k, (i, s)) in records.into_iter().enumerate() {
            assert_eq!(i, 9 - k as i32);
            assert_eq!(s, format!("record {}", i));
        }
        disk.clear().unwrap();
    }

    #[test]
    fn spans_many_blocks_test() {
        let (disk, log) = new_log();
        let filler = "x".repeat(500);
        for i in 0..100 {
            log.append(&[LogField::Int(i), LogField::Str(filler.clone())])
                .unwrap();
        }
        assert!(disk.num_blocks("test.log").unwrap() > 10);
        let ids = read_all(&log).into_iter().map(|(i, _)| i).collect::<Vec<_>>();
        assert_eq!(ids, (0..100).rev().collect::<Vec<_>>());
        disk.clear().unwrap();
    }

    #[test]
    fn flush_and_reopen_test() {
        let (disk, log) = new_log();
        let lsn = log.append(&[LogField::Int(1), "first".into()]).unwrap();
        log.flush(lsn).unwrap();
        let writes = disk.num_writes();
        // already durable
        log.flush(lsn).unwrap();
        assert_eq!(disk.num_writes(), writes);
        log.append(&[LogField::Int(2), "second".into()]).unwrap();
        // unflushed records are lost with the manager
        drop(log);
        let log = LogManager::new(disk.clone(), "test.log").unwrap();
        assert_eq!(read_all(&log), vec![(1, "first".to_string())]);
        log.append(&[LogField::Int(3), "third".into()]).unwrap();
        assert_eq!(
            read_all(&log),
            vec![(3, "third".to_string()), (1, "first".to_string())]
        );
        disk.clear().unwrap();
    }

    #[test]
    fn too_large_test() {
        let (disk, log) = new_log();
        let huge = "y".repeat(PAGE_SIZE);
        assert!(matches!(
            log.append(&[LogField::Str(huge)]),
            Err(LogError::RecordTooLarge(_))
        ));
        disk.clear().unwrap();
    }
}
