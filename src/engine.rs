use crate::{btree::BTree, transaction::LockManager, tx_log::LogManager};

/// The shared state every transaction works against: the committed
/// data, the lock table and the write-ahead log.
pub struct Engine {
    pub btree: BTree,
    pub lock_manager: LockManager,
    pub log_manager: LogManager,
}

impl Engine {
    pub fn new(btree: BTree, log_manager: LogManager) -> Self {
        Self {
            btree,
            lock_manager: LockManager::new(),
            log_manager,
        }
    }
}
