//! One-shot dataset import CLI.
//!
//! `spamshield-import [--force] [path]` — loads the SMS dataset into a
//! fresh in-memory store and prints the resulting partition. Mostly
//! useful for sanity-checking a dataset file before wiring a real
//! long-lived store backend; the agent runtime itself imports through
//! `DatasetImporter` directly.

use std::sync::Arc;

use spamshield_core::config::AppConfig;
use spamshield_core::dataset::DatasetImporter;
use spamshield_core::store::memory::MemoryStore;
use spamshield_core::store::Store;
use spamshield_core::setup_logging;

fn main() {
    setup_logging(None);

    let config = AppConfig::from_env();
    let mut path = config.dataset_path.clone();
    let mut force = false;

    for arg in std::env::args().skip(1) {
        if arg == "--force" {
            force = true;
        } else {
            path = arg;
        }
    }

    let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
    let importer = DatasetImporter::new(store);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let report = runtime.block_on(importer.import(&path, force));

    match report {
        Ok(r) => {
            println!(
                "imported={} skipped={} train={} holdout={}",
                r.imported, r.skipped, r.train_count, r.holdout_count
            );
        }
        Err(e) => {
            eprintln!("import failed: {e}");
            std::process::exit(1);
        }
    }
}
