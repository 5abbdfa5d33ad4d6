//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `driftsync_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use driftsync_core::db::migrations::latest_version;
use driftsync_core::db::open_db_in_memory;

fn main() {
    println!("driftsync_core version={}", driftsync_core::core_version());
    println!("driftsync_core schema_version={}", latest_version());

    match open_db_in_memory() {
        Ok(_conn) => println!("driftsync_core store=ok"),
        Err(err) => {
            eprintln!("driftsync_core store=error {err}");
            std::process::exit(1);
        }
    }
}
