use clockdb::{Config, Database};
use log::error;
use std::process;

fn main() {
    env_logger::init();
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!("usage: clockdb <directory> [gclock-rotations]");
            process::exit(2);
        }
    };
    let db = match Database::open(config) {
        Ok(db) => db,
        Err(err) => {
            error!("failed to open database: {}", err);
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };
    let stats = db.recovery_stats();
    println!(
        "recovered: {} updates of {} transactions undone",
        stats.undone_records,
        stats.incomplete_txns.len()
    );
    println!(
        "buffer pool: {} buffers, {} available, gclock rotations {}",
        db.buffers().pool_size(),
        db.buffers().available(),
        db.buffers().max_clock_rotations()
    );
    println!("database ready");
}
