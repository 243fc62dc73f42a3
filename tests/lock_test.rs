mod test_utils;

use small_kv::transaction::{Lock, LockManager, TryLockResult};
use test_utils::setup;

#[test]
fn test_wait_die() {
    setup();
    let older = 1;
    let younger = 2;

    // the younger requester dies
    let mut lm = LockManager::new();
    assert_eq!(lm.try_exclusive_lock("key1", older), TryLockResult::GetLock);
    assert_eq!(lm.try_exclusive_lock("key1", younger), TryLockResult::Abort);
    assert_eq!(lm.try_shared_lock("key1", younger), TryLockResult::Abort);

    // the older requester waits, the holder is never preempted
    let mut lm = LockManager::new();
    assert_eq!(lm.try_exclusive_lock("key1", younger), TryLockResult::GetLock);
    assert_eq!(lm.try_exclusive_lock("key1", older), TryLockResult::Wait);
    assert_eq!(lm.try_shared_lock("key1", older), TryLockResult::Wait);
    assert_eq!(lm.get_lock("key1"), Some(&Lock::Exclusive(younger)));

    lm.unlock("key1", younger);
    assert_eq!(lm.try_exclusive_lock("key1", older), TryLockResult::GetLock);
}

#[test]
fn test_shared_then_exclusive() {
    setup();
    let mut lm = LockManager::new();

    assert_eq!(lm.try_shared_lock("key1", 1), TryLockResult::GetLock);
    assert_eq!(lm.try_shared_lock("key1", 3), TryLockResult::GetLock);

    // 2 is younger than reader 1 but older than reader 3
    assert_eq!(lm.try_exclusive_lock("key1", 2), TryLockResult::Abort);
    // 0 is older than every reader
    assert_eq!(lm.try_exclusive_lock("key1", 0), TryLockResult::Wait);

    lm.unlock("key1", 3);
    assert_eq!(lm.try_exclusive_lock("key1", 1), TryLockResult::GetLock);
    assert_eq!(lm.get_lock("key1"), Some(&Lock::Exclusive(1)));

    lm.unlock("key1", 1);
    assert!(lm.is_empty());
}

#[test]
fn test_display() {
    setup();
    let mut lm = LockManager::new();
    lm.try_shared_lock("a", 1);
    lm.try_shared_lock("a", 2);
    lm.try_exclusive_lock("b", 3);

    let depiction = lm.to_string();
    assert!(depiction.contains("\"a\" -> S[1, 2]"));
    assert!(depiction.contains("\"b\" -> X[3]"));
}
