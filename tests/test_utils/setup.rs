use std::path::PathBuf;

use small_kv::{btree::BTree, utils, Table};
use tempfile::TempDir;

/// # Conduct the initialization
///
/// - Setting up log configurations.
/// - Create a temporary directory for the database files, it's removed
///   when the returned `TempDir` is dropped.
pub fn setup() -> TempDir {
    utils::init_log();
    tempfile::tempdir().unwrap()
}

pub struct TablePaths {
    pub btree: PathBuf,
    pub data: PathBuf,
    pub log: PathBuf,
}

pub fn table_paths(dir: &TempDir) -> TablePaths {
    TablePaths {
        btree: dir.path().join("btree.db"),
        data: dir.path().join("data.txt"),
        log: dir.path().join("log.txt"),
    }
}

pub fn open_table(dir: &TempDir) -> Table {
    let paths = table_paths(dir);
    Table::open(&paths.btree, &paths.data, &paths.log).unwrap()
}

pub fn open_btree(dir: &TempDir, capacity: usize) -> BTree {
    BTree::with_capacity(dir.path().join("btree.db"), capacity).unwrap()
}
