use crate::buffer::{BufferError, BufferManager};
use crate::storage::BlockId;
use crate::wal::{LogEntry, LogError, LogField, LogManager, Lsn, TxnId};
use log::trace;
use std::convert::TryFrom;
use std::fmt;

pub const START: i32 = 1;
pub const COMMIT: i32 = 2;
pub const ROLLBACK: i32 = 3;
pub const UPDATE: i32 = 4;

///
/// Update record format:
///
/// ```text
/// | UPDATE | txn | file_name | block_num | offset | old_value | new_value |
/// ```
///
/// Only `old_value` is needed to undo the write, `new_value` is
/// kept for inspecting the log.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRecord {
    txn: TxnId,
    block: BlockId,
    offset: usize,
    old_value: String,
    new_value: String,
}

impl UpdateRecord {
    pub fn new(
        txn: TxnId,
        block: BlockId,
        offset: usize,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            txn,
            block,
            offset,
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
    pub fn block(&self) -> &BlockId {
        &self.block
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn old_value(&self) -> &str {
        &self.old_value
    }
    pub fn new_value(&self) -> &str {
        &self.new_value
    }

    /// Block number and offset are stored as ints, values that
    /// don't fit are rejected here rather than when decoding.
    fn fields(&self) -> Result<Vec<LogField>, LogError> {
        Ok(vec![
            LogField::Int(UPDATE),
            LogField::Int(self.txn),
            LogField::Str(self.block.file_name().to_string()),
            LogField::Int(int_field(self.block.number(), "block number")?),
            LogField::Int(int_field(self.offset, "offset")?),
            LogField::Str(self.old_value.clone()),
            LogField::Str(self.new_value.clone()),
        ])
    }

    /// read the fields following the operation tag
    fn decode(entry: &mut LogEntry) -> Result<Self, LogError> {
        let txn = entry.next_int()?;
        let file_name = entry.next_string()?;
        let block_num = non_negative(entry, "block number")?;
        let offset = non_negative(entry, "offset")?;
        let old_value = entry.next_string()?;
        let new_value = entry.next_string()?;
        Ok(Self {
            txn,
            block: BlockId::new(file_name, block_num),
            offset,
            old_value,
            new_value,
        })
    }

    /// Put the old value back. The write is marked as done by `txn`
    /// without an lsn, undoing is never logged itself. Applying it
    /// again leaves the page as it is.
    pub fn undo(&self, txn: TxnId, buffers: &BufferManager) -> Result<(), BufferError> {
        let buffer = buffers.pin(&self.block)?;
        let restored = buffer.set_string(self.offset, &self.old_value, txn, None);
        buffers.unpin(buffer);
        restored?;
        trace!(
            "recovery: restored {:?} at {} offset {}",
            self.old_value,
            self.block,
            self.offset
        );
        Ok(())
    }
}

fn int_field(value: usize, field: &'static str) -> Result<i32, LogError> {
    i32::try_from(value).map_err(|_| LogError::FieldOutOfRange { field, value })
}

fn non_negative(entry: &mut LogEntry, expected: &'static str) -> Result<usize, LogError> {
    let position = entry.position();
    usize::try_from(entry.next_int()?)
        .map_err(|_| LogError::CorruptEntry { position, expected })
}

/// Every kind of record the recovery scanner understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogRecord {
    Start { txn: TxnId },
    Commit { txn: TxnId },
    Rollback { txn: TxnId },
    Update(UpdateRecord),
}

impl LogRecord {
    pub fn op(&self) -> i32 {
        match self {
            LogRecord::Start { .. } => START,
            LogRecord::Commit { .. } => COMMIT,
            LogRecord::Rollback { .. } => ROLLBACK,
            LogRecord::Update(_) => UPDATE,
        }
    }

    pub fn tx_number(&self) -> TxnId {
        match self {
            LogRecord::Start { txn } | LogRecord::Commit { txn } | LogRecord::Rollback { txn } => {
                *txn
            }
            LogRecord::Update(update) => update.txn,
        }
    }

    pub fn fields(&self) -> Result<Vec<LogField>, LogError> {
        match self {
            LogRecord::Update(update) => update.fields(),
            _ => Ok(vec![
                LogField::Int(self.op()),
                LogField::Int(self.tx_number()),
            ]),
        }
    }

    /// Nothing is appended if the record can't be encoded.
    pub fn write_to_log(&self, log: &LogManager) -> Result<Lsn, LogError> {
        log.append(&self.fields()?)
    }

    pub fn decode(mut entry: LogEntry) -> Result<Self, LogError> {
        let record = match entry.next_int()? {
            START => LogRecord::Start {
                txn: entry.next_int()?,
            },
            COMMIT => LogRecord::Commit {
                txn: entry.next_int()?,
            },
            ROLLBACK => LogRecord::Rollback {
                txn: entry.next_int()?,
            },
            UPDATE => LogRecord::Update(UpdateRecord::decode(&mut entry)?),
            op => return Err(LogError::UnknownOperation(op)),
        };
        Ok(record)
    }

    /// Only updates change anything when undone.
    pub fn undo(&self, txn: TxnId, buffers: &BufferManager) -> Result<(), BufferError> {
        match self {
            LogRecord::Update(update) => update.undo(txn, buffers),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Start { txn } => write!(f, "<START {}>", txn),
            LogRecord::Commit { txn } => write!(f, "<COMMIT {}>", txn),
            LogRecord::Rollback { txn } => write!(f, "<ROLLBACK {}>", txn),
            LogRecord::Update(update) => write!(
                f,
                "<UPDATE {} {} {} {:?} {:?}>",
                update.txn, update.block, update.offset, update.old_value, update.new_value
            ),
        }
    }
}
