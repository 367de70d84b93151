use super::*;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// `DiskManager` reads and writes whole blocks of the files
/// inside one database directory. Files are opened lazily
/// and kept open until the manager is dropped.
pub struct DiskManager {
    directory: PathBuf,
    files: Mutex<HashMap<String, File>>,
    num_reads: AtomicUsize,
    num_writes: AtomicUsize,
}

impl DiskManager {
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, StorageError> {
        let directory = directory.as_ref().to_path_buf();
        let is_new = !directory.exists();
        if is_new {
            fs::create_dir_all(&directory)?;
        }
        info!(
            "disk: open {} database at {}",
            if is_new { "new" } else { "existing" },
            directory.display()
        );
        Ok(Self {
            directory,
            files: Mutex::new(HashMap::new()),
            num_reads: AtomicUsize::new(0),
            num_writes: AtomicUsize::new(0),
        })
    }
    /// open a fresh directory with a random name under the
    /// system temp directory
    pub fn new_random() -> Result<Self, StorageError> {
        let directory = std::env::temp_dir().join(format!("clockdb-{}", Uuid::new_v4()));
        Self::new(directory)
    }
    pub fn directory(&self) -> &Path {
        &self.directory
    }
    /// close every file and delete the whole directory
    pub fn clear(&self) -> Result<(), StorageError> {
        self.files.lock().clear();
        if self.directory.exists() {
            fs::remove_dir_all(&self.directory)?;
        }
        Ok(())
    }

    fn with_file<T>(
        &self,
        file_name: &str,
        f: impl FnOnce(&mut File) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut files = self.files.lock();
        let file = match files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(self.directory.join(file_name))?,
            ),
        };
        f(file)
    }

    fn len_in_blocks(file: &File) -> Result<usize, StorageError> {
        let len = file.metadata()?.len();
        Ok(((len + PAGE_SIZE as u64 - 1) / PAGE_SIZE as u64) as usize)
    }

    /// Read `block` into `page`. The block right after the end of
    /// the file reads as zeros, like a freshly extended file. Blocks
    /// further out could never be written back and are rejected.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<(), StorageError> {
        self.with_file(block.file_name(), |file| {
            if block.number() > Self::len_in_blocks(file)? {
                return Err(StorageError::BlockOutOfBound(block.clone()));
            }
            page.clear();
            let offset = (block.number() * PAGE_SIZE) as u64;
            if offset < file.metadata()?.len() {
                file.seek(SeekFrom::Start(offset))?;
                let mut filled = 0;
                while filled < PAGE_SIZE {
                    let n = file.read(&mut page.buffer[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
            }
            Ok(())
        })?;
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        debug!("disk: read {}", block);
        Ok(())
    }

    pub fn write(&self, block: &BlockId, page: &Page) -> Result<(), StorageError> {
        self.with_file(block.file_name(), |file| {
            if block.number() > Self::len_in_blocks(file)? {
                return Err(StorageError::BlockOutOfBound(block.clone()));
            }
            file.seek(SeekFrom::Start((block.number() * PAGE_SIZE) as u64))?;
            file.write_all(page.as_raw())?;
            file.sync_data()?;
            Ok(())
        })?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        debug!("disk: write {}", block);
        Ok(())
    }

    /// Extend `file_name` by one block holding `page`,
    /// return the id of the new block.
    pub fn append(&self, file_name: &str, page: &Page) -> Result<BlockId, StorageError> {
        let block = self.with_file(file_name, |file| {
            let block = BlockId::new(file_name, Self::len_in_blocks(file)?);
            file.seek(SeekFrom::Start((block.number() * PAGE_SIZE) as u64))?;
            file.write_all(page.as_raw())?;
            file.sync_data()?;
            Ok(block)
        })?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        debug!("disk: append {}", block);
        Ok(block)
    }

    pub fn num_blocks(&self, file_name: &str) -> Result<usize, StorageError> {
        self.with_file(file_name, |file| Self::len_in_blocks(file))
    }
    pub fn num_reads(&self) -> usize {
        self.num_reads.load(Ordering::Relaxed)
    }
    pub fn num_writes(&self) -> usize {
        self.num_writes.load(Ordering::Relaxed)
    }
}
