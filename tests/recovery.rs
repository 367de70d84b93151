use clockdb::buffer::BufferError;
use clockdb::recovery::RecoveryStats;
use clockdb::storage::StorageError;
use clockdb::{
    BlockId, BufferManager, Config, Database, DiskManager, LogManager, LogRecord, Page,
    UpdateRecord,
};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("clockdb-{}", Uuid::new_v4()))
}

fn blank(_: &mut Page) -> Result<(), StorageError> {
    Ok(())
}

fn new_manager(size: usize) -> BufferManager {
    let disk = Arc::new(DiskManager::new_random().unwrap());
    let log = Arc::new(LogManager::new(disk.clone(), "clockdb.log").unwrap());
    BufferManager::new(size, 5, disk, log)
}

#[test]
fn undo_restores_prior_value() {
    let bm = new_manager(4);
    let block = bm.disk().append("f", &Page::new()).unwrap();
    assert_eq!(block, BlockId::new("f", 0));

    let buffer = bm.pin(&block).unwrap();
    let prior = buffer.get_string(4).unwrap();
    let record = LogRecord::Update(UpdateRecord::new(1, block.clone(), 4, prior, "A"));
    let lsn = record.write_to_log(bm.log()).unwrap();
    buffer.set_string(4, "A", 1, Some(lsn)).unwrap();
    buffer.set_string(4, "B", 1, None).unwrap();
    bm.unpin(buffer);

    let entry = bm
        .log()
        .iter_backward()
        .unwrap()
        .next()
        .expect("one record was logged")
        .unwrap();
    let decoded = LogRecord::decode(entry).unwrap();
    assert_eq!(decoded.op(), clockdb::recovery::UPDATE);
    assert_eq!(decoded.tx_number(), 1);
    decoded.undo(1, &bm).unwrap();

    let buffer = bm.pin(&block).unwrap();
    assert_eq!(buffer.get_string(4).unwrap(), "");
    bm.unpin(buffer);
    bm.disk().clear().unwrap();
}

#[test]
fn saturated_pool_reports_unavailable() {
    let bm = new_manager(2);
    let first = bm.pin_new("f", &blank).unwrap();
    let second = bm.pin_new("f", &blank).unwrap();
    let third = bm.disk().append("f", &Page::new()).unwrap();
    assert!(matches!(bm.pin(&third), Err(BufferError::PoolExhausted)));
    assert_eq!(bm.available(), 0);
    bm.unpin(second);
    assert_eq!(bm.available(), 1);
    let b = bm.pin(&third).unwrap();
    assert_eq!(bm.available(), 0);
    bm.unpin(b);
    bm.unpin(first);
    assert_eq!(bm.available(), 2);
    bm.disk().clear().unwrap();
}

#[test]
fn empty_slot_is_filled_before_eviction() {
    let bm = new_manager(3);
    let a = bm.pin_new("f", &blank).unwrap();
    let b = bm.pin_new("f", &blank).unwrap();
    let (block_a, block_b) = (a.block().clone(), b.block().clone());
    bm.unpin(a);
    bm.unpin(b);
    let c = bm.pin_new("f", &blank).unwrap();
    assert_eq!(c.slot(), 2);
    assert!(bm.is_resident(&block_a));
    assert!(bm.is_resident(&block_b));
    bm.unpin(c);
    bm.disk().clear().unwrap();
}

#[test]
fn crash_before_commit_is_undone() {
    let directory = scratch_dir();
    let config = Config::new(&directory);
    let block = {
        let db = Database::open(config.clone()).unwrap();
        let setup = db.begin().unwrap();
        let buffer = db.buffers().pin_new("accounts.tbl", &blank).unwrap();
        setup.set_string(&buffer, 0, "alice").unwrap();
        setup.set_string(&buffer, 32, "bob").unwrap();
        setup.commit().unwrap();

        let crashed = db.begin().unwrap();
        crashed.set_string(&buffer, 0, "mallory").unwrap();
        let block = buffer.block().clone();
        db.buffers().unpin(buffer);
        // the dirty page is written out, the commit never happens
        db.buffers().flush_all(crashed.txn()).unwrap();
        let mut page = Page::new();
        db.buffers().disk().read(&block, &mut page).unwrap();
        assert_eq!(page.get_string(0).unwrap(), "mallory");
        block
    };

    let db = Database::open(config.clone()).unwrap();
    assert_eq!(db.recovery_stats().undone_records, 1);
    let buffer = db.buffers().pin(&block).unwrap();
    assert_eq!(buffer.get_string(0).unwrap(), "alice");
    assert_eq!(buffer.get_string(32).unwrap(), "bob");
    db.buffers().unpin(buffer);
    drop(db);

    // the undone transaction is closed in the log now
    let db = Database::open(config).unwrap();
    assert_eq!(db.recovery_stats().undone_records, 0);
    db.buffers().disk().clear().unwrap();
}

#[test]
fn recovery_can_restart_after_partial_undo() {
    let directory = scratch_dir();
    let config = Config::new(&directory);
    let block = {
        let db = Database::open(config.clone()).unwrap();
        let txn = db.begin().unwrap();
        let buffer = db.buffers().pin_new("f", &blank).unwrap();
        txn.set_string(&buffer, 8, "one").unwrap();
        txn.set_string(&buffer, 8, "two").unwrap();
        txn.set_string(&buffer, 8, "three").unwrap();
        let block = buffer.block().clone();
        db.buffers().unpin(buffer);
        db.buffers().flush_all(txn.txn()).unwrap();

        // a recovery pass that dies after undoing only the newest update
        let bm = db.buffers();
        let newest = bm
            .log()
            .iter_backward()
            .unwrap()
            .map(|entry| LogRecord::decode(entry.unwrap()).unwrap())
            .find(|record| matches!(record, LogRecord::Update(_)))
            .unwrap();
        newest.undo(0, bm).unwrap();
        bm.flush_all(0).unwrap();
        block
    };

    let db = Database::open(config).unwrap();
    assert_eq!(
        db.recovery_stats(),
        &RecoveryStats {
            undone_records: 3,
            incomplete_txns: vec![1],
            max_txn: 1,
        }
    );
    let buffer = db.buffers().pin(&block).unwrap();
    assert_eq!(buffer.get_string(8).unwrap(), "");
    db.buffers().unpin(buffer);
    db.buffers().disk().clear().unwrap();
}
