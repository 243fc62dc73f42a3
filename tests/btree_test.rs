mod test_utils;

use std::collections::BTreeMap;

use small_kv::btree::{DEFAULT_BUFFER_CAPACITY, MAX_ENTRY_LEN};
use test_utils::{apply, assert_same, open_btree, random_actions, setup};

#[test]
fn test_search_and_update() {
    let dir = setup();
    let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);

    assert!(btree.is_empty().unwrap());
    assert_eq!(btree.search("key1").unwrap(), None);
    assert!(!btree.update("key1", "value1").unwrap());

    btree.insert("key1", "value1").unwrap();
    btree.insert("key2", "").unwrap();
    assert_eq!(btree.search("key1").unwrap(), Some("value1".to_string()));
    assert_eq!(btree.search("key2").unwrap(), Some("".to_string()));

    assert!(btree.update("key1", "value1_new").unwrap());
    assert_eq!(btree.search("key1").unwrap(), Some("value1_new".to_string()));

    btree.upsert("key1", "value1_upsert").unwrap();
    btree.upsert("key3", "value3").unwrap();
    assert_eq!(btree.len().unwrap(), 3);
    assert_eq!(btree.search("key1").unwrap(), Some("value1_upsert".to_string()));
}

#[test]
fn test_root_split() {
    let dir = setup();
    let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);

    // a node holds up to 5 keys
    for i in 0..5 {
        btree.insert(&format!("key{}", i), "value").unwrap();
        assert_eq!(btree.page_count(), 1);
    }

    // the full root moves to a new page and is split
    btree.insert("key5", "value").unwrap();
    assert_eq!(btree.page_count(), 3);
    btree.check_integrity().unwrap();
    btree.draw_tree().unwrap();

    for i in 0..6 {
        assert!(btree.search(&format!("key{}", i)).unwrap().is_some());
    }
}

#[test]
fn test_delete_until_empty() {
    let dir = setup();
    let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);

    let mut reference = BTreeMap::new();
    for i in 0..200 {
        let key = format!("key{:03}", (i * 37) % 200);
        btree.insert(&key, &format!("value{}", i)).unwrap();
        reference.insert(key, format!("value{}", i));
    }
    assert_same(&mut btree, &reference);

    for i in 0..200 {
        let key = format!("key{:03}", (i * 53) % 200);
        assert!(btree.del(&key).unwrap());
        assert!(!btree.del(&key).unwrap());
        reference.remove(&key);

        if i % 10 == 0 {
            assert_same(&mut btree, &reference);
        }
    }

    assert!(btree.is_empty().unwrap());
    btree.check_integrity().unwrap();

    // pages of merged nodes are never reused
    assert!(btree.page_count() > 1);
}

#[test]
fn test_random_workload() {
    let dir = setup();
    let mut reference = BTreeMap::new();

    {
        let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);
        for (i, action) in random_actions(1, 3000, 400).iter().enumerate() {
            apply(&mut btree, &mut reference, action);
            if i % 200 == 0 {
                assert_same(&mut btree, &reference);
            }
        }
        assert_same(&mut btree, &reference);
    }

    // the data survives a restart
    let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);
    assert_same(&mut btree, &reference);

    for action in random_actions(2, 1000, 400).iter() {
        apply(&mut btree, &mut reference, action);
    }
    assert_same(&mut btree, &reference);
}

#[test]
fn test_random_workload_small_cache() {
    let dir = setup();
    let mut reference = BTreeMap::new();

    {
        let mut btree = open_btree(&dir, 4);
        for (i, action) in random_actions(3, 2000, 300).iter().enumerate() {
            apply(&mut btree, &mut reference, action);
            assert!(btree.buffer_manager().resident_count() <= 4);
            if i % 200 == 0 {
                assert_same(&mut btree, &reference);
            }
        }
    }

    let mut btree = open_btree(&dir, 4);
    assert_same(&mut btree, &reference);
}

#[test]
fn test_clear() {
    let dir = setup();
    let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);
    for i in 0..50 {
        btree.insert(&format!("key{:02}", i), "value").unwrap();
    }
    assert!(btree.page_count() > 1);

    btree.clear().unwrap();
    assert_eq!(btree.page_count(), 1);
    assert!(btree.is_empty().unwrap());

    btree.insert("key", "value").unwrap();
    assert_eq!(btree.len().unwrap(), 1);
}

#[test]
fn test_invalid_entry() {
    let dir = setup();
    let mut btree = open_btree(&dir, DEFAULT_BUFFER_CAPACITY);

    let longest = "k".repeat(MAX_ENTRY_LEN);
    btree.insert(&longest, &longest).unwrap();
    assert_eq!(btree.search(&longest).unwrap(), Some(longest.clone()));

    let too_long = "k".repeat(MAX_ENTRY_LEN + 1);
    assert!(btree.insert(&too_long, "value").is_err());
    assert!(btree.insert("key", &too_long).is_err());
    assert!(btree.update(&longest, &too_long).is_err());
    assert!(btree.insert("", "value").is_err());

    assert_eq!(btree.len().unwrap(), 1);
}
