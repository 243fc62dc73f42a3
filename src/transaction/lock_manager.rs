use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use itertools::Itertools;
use log::debug;

use crate::types::TransactionID;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLockResult {
    GetLock,

    /// The lock is held by younger transactions, try again later.
    Wait,

    /// The lock is held by an older transaction, the requester must
    /// give up (wait-die).
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lock {
    Shared(BTreeSet<TransactionID>),
    Exclusive(TransactionID),
}

impl Lock {
    fn shared(txnid: TransactionID) -> Self {
        let mut readers = BTreeSet::new();
        readers.insert(txnid);
        Lock::Shared(readers)
    }

    /// Whether some holder of the lock is older than `txnid`.
    ///
    /// A smaller transaction id means an older transaction.
    pub fn has_priority(&self, txnid: TransactionID) -> bool {
        match self {
            Lock::Shared(readers) => readers.iter().any(|r| *r < txnid),
            Lock::Exclusive(holder) => *holder < txnid,
        }
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Lock::Shared(readers) => write!(f, "S[{}]", readers.iter().join(", ")),
            Lock::Exclusive(holder) => write!(f, "X[{}]", holder),
        }
    }
}

/// Key level locks with wait-die deadlock avoidance.
///
/// A key without an entry in `lock_table` is not locked by anyone.
#[derive(Default)]
pub struct LockManager {
    lock_table: BTreeMap<String, Lock>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The requester conflicts with the current holders: an older
    /// requester waits, a younger one dies.
    fn wait_or_die(lock: &Lock, txnid: TransactionID) -> TryLockResult {
        if lock.has_priority(txnid) {
            TryLockResult::Abort
        } else {
            TryLockResult::Wait
        }
    }

    pub fn try_shared_lock(&mut self, key: &str, txnid: TransactionID) -> TryLockResult {
        let result = match self.lock_table.get_mut(key) {
            None => {
                self.lock_table.insert(key.to_string(), Lock::shared(txnid));
                TryLockResult::GetLock
            }
            Some(Lock::Shared(readers)) => {
                readers.insert(txnid);
                TryLockResult::GetLock
            }
            Some(Lock::Exclusive(holder)) if *holder == txnid => TryLockResult::GetLock,
            Some(lock) => Self::wait_or_die(lock, txnid),
        };

        debug!("tx_{} s-lock {:?}: {:?}", txnid, key, result);
        result
    }

    pub fn try_exclusive_lock(&mut self, key: &str, txnid: TransactionID) -> TryLockResult {
        let result = match self.lock_table.get(key) {
            None => {
                self.lock_table
                    .insert(key.to_string(), Lock::Exclusive(txnid));
                TryLockResult::GetLock
            }
            Some(Lock::Exclusive(holder)) if *holder == txnid => TryLockResult::GetLock,
            Some(Lock::Shared(readers)) if readers.contains(&txnid) => {
                return self.try_upgrade_lock(key, txnid);
            }
            Some(lock) => Self::wait_or_die(lock, txnid),
        };

        debug!("tx_{} x-lock {:?}: {:?}", txnid, key, result);
        result
    }

    /// Turn a shared lock held by `txnid` into an exclusive one, which
    /// only succeeds if `txnid` is the only reader.
    pub fn try_upgrade_lock(&mut self, key: &str, txnid: TransactionID) -> TryLockResult {
        let lock = self
            .lock_table
            .get_mut(key)
            .unwrap_or_else(|| panic!("upgrade {:?} which is not locked", key));

        let sole_reader = match &*lock {
            Lock::Shared(readers) => {
                assert!(
                    readers.contains(&txnid),
                    "tx_{} upgrades {:?} without holding a shared lock",
                    txnid,
                    key
                );
                readers.len() == 1
            }
            Lock::Exclusive(_) => panic!("upgrade {:?} which is exclusively locked", key),
        };

        let result = if sole_reader {
            *lock = Lock::Exclusive(txnid);
            TryLockResult::GetLock
        } else {
            Self::wait_or_die(lock, txnid)
        };

        debug!("tx_{} upgrade lock {:?}: {:?}", txnid, key, result);
        result
    }

    pub fn unlock(&mut self, key: &str, txnid: TransactionID) {
        let released = match self.lock_table.get_mut(key) {
            Some(Lock::Shared(readers)) => {
                assert!(
                    readers.remove(&txnid),
                    "tx_{} unlocks {:?} without holding it",
                    txnid,
                    key
                );
                readers.is_empty()
            }
            Some(Lock::Exclusive(holder)) => {
                assert_eq!(*holder, txnid, "unlock {:?} held by another transaction", key);
                true
            }
            None => panic!("unlock {:?} which is not locked", key),
        };

        if released {
            self.lock_table.remove(key);
        }
    }

    pub fn get_lock(&self, key: &str) -> Option<&Lock> {
        self.lock_table.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.lock_table.is_empty()
    }
}

impl fmt::Display for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depiction = "lock table: {".to_string();
        for (key, lock) in &self.lock_table {
            depiction.push_str(&format!("\n\t{:?} -> {}", key, lock));
        }
        depiction.push_str("\n}");
        write!(f, "{}", depiction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_locks_are_compatible() {
        let mut lm = LockManager::new();
        assert_eq!(lm.try_shared_lock("a", 2), TryLockResult::GetLock);
        assert_eq!(lm.try_shared_lock("a", 1), TryLockResult::GetLock);
        assert_eq!(lm.try_shared_lock("a", 3), TryLockResult::GetLock);

        lm.unlock("a", 1);
        lm.unlock("a", 2);
        assert!(!lm.is_empty());
        lm.unlock("a", 3);
        assert!(lm.is_empty());
    }

    #[test]
    fn test_upgrade() {
        let mut lm = LockManager::new();
        lm.try_shared_lock("a", 1);
        assert_eq!(lm.try_exclusive_lock("a", 1), TryLockResult::GetLock);
        assert_eq!(lm.get_lock("a"), Some(&Lock::Exclusive(1)));

        // re-entrant
        assert_eq!(lm.try_shared_lock("a", 1), TryLockResult::GetLock);
        assert_eq!(lm.try_exclusive_lock("a", 1), TryLockResult::GetLock);
    }

    #[test]
    fn test_upgrade_with_other_readers() {
        let mut lm = LockManager::new();
        lm.try_shared_lock("a", 1);
        lm.try_shared_lock("a", 2);

        // the older reader waits for the younger one
        assert_eq!(lm.try_upgrade_lock("a", 1), TryLockResult::Wait);
        // the younger reader dies
        assert_eq!(lm.try_upgrade_lock("a", 2), TryLockResult::Abort);
    }

    #[test]
    #[should_panic]
    fn test_unlock_without_lock() {
        let mut lm = LockManager::new();
        lm.try_shared_lock("a", 1);
        lm.unlock("a", 2);
    }
}
