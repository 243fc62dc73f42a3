use std::collections::BTreeMap;

use rand::prelude::*;
use small_kv::btree::BTree;

#[derive(Debug, Clone)]
pub enum Action {
    Insert(String, String),
    Update(String, String),
    Del(String),
}

/// Generate random actions over a small key space so that updates and
/// deletes of existing keys are frequent.
pub fn random_actions(seed: u64, count: usize, key_space: u32) -> Vec<Action> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let key = format!("key{:05}", rng.gen_range(0, key_space));
            match rng.gen_range(0, 10) {
                0..=4 => Action::Insert(key, format!("value{}", i)),
                5..=6 => Action::Update(key, format!("updated{}", i)),
                _ => Action::Del(key),
            }
        })
        .collect()
}

/// Apply the action to both the b-tree and the reference map, with
/// the semantics of the b-tree api: insert only new keys, update only
/// existing ones.
pub fn apply(btree: &mut BTree, reference: &mut BTreeMap<String, String>, action: &Action) {
    match action {
        Action::Insert(key, value) => {
            if reference.contains_key(key) {
                return;
            }
            btree.insert(key, value).unwrap();
            reference.insert(key.clone(), value.clone());
        }
        Action::Update(key, value) => {
            let updated = btree.update(key, value).unwrap();
            assert_eq!(updated, reference.contains_key(key));
            if updated {
                reference.insert(key.clone(), value.clone());
            }
        }
        Action::Del(key) => {
            let deleted = btree.del(key).unwrap();
            assert_eq!(deleted, reference.remove(key).is_some());
        }
    }
}

pub fn assert_same(btree: &mut BTree, reference: &BTreeMap<String, String>) {
    assert_eq!(&btree.all_data().unwrap(), reference);
    btree.check_integrity().unwrap();
}
