mod test_utils;

use std::{collections::BTreeMap, fs, io::Write};

use small_kv::{
    tx_log::{LogKind, LogManager, LogRecord},
    Script, Step, Table,
};
use test_utils::{open_table, setup, table_paths};

fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn commit(table: &mut Table, steps: Vec<Step>) {
    let mut steps = steps;
    steps.push(Step::Commit);
    table.add_transaction(Script::new(steps));
    assert_eq!(table.exec_transaction().unwrap(), vec![true]);
}

#[test]
fn test_checkpoint() {
    let dir = setup();
    let paths = table_paths(&dir);
    let mut table = open_table(&dir);

    commit(
        &mut table,
        vec![Step::insert("key2", "value2"), Step::insert("key1", "value1")],
    );
    assert!(!table.engine().log_manager.is_empty().unwrap());

    table.checkpointing().unwrap();
    assert_eq!(
        fs::read_to_string(&paths.data).unwrap(),
        "key1 value1\nkey2 value2\n"
    );
    assert!(table.engine().log_manager.is_empty().unwrap());
    assert!(!dir.path().join("tmp_data.txt").exists());

    // nothing to recover from an empty log
    table.recovery().unwrap();
    assert_eq!(
        table.all_data().unwrap(),
        data(&[("key1", "value1"), ("key2", "value2")])
    );
}

#[test]
fn test_recovery_from_log() {
    let dir = setup();
    let paths = table_paths(&dir);

    {
        let mut table = open_table(&dir);
        commit(&mut table, vec![Step::insert("key1", "value1")]);
        table.checkpointing().unwrap();

        commit(
            &mut table,
            vec![Step::insert("key2", "value2"), Step::update("key1", "value1_new")],
        );
        commit(&mut table, vec![Step::del("key2"), Step::insert("key3", "value3")]);
    }

    // lose the b-tree file, the checkpoint and the log are enough
    fs::remove_file(&paths.btree).unwrap();

    let mut table = open_table(&dir);
    assert!(table.all_data().unwrap().is_empty());
    table.recovery().unwrap();

    let expected = data(&[("key1", "value1_new"), ("key3", "value3")]);
    assert_eq!(table.all_data().unwrap(), expected);
    assert!(table.engine().log_manager.is_empty().unwrap());
    assert_eq!(
        fs::read_to_string(&paths.data).unwrap(),
        "key1 value1_new\nkey3 value3\n"
    );

    // recovering again changes nothing
    table.recovery().unwrap();
    assert_eq!(table.all_data().unwrap(), expected);
    drop(table);

    let mut table = open_table(&dir);
    table.recovery().unwrap();
    assert_eq!(table.all_data().unwrap(), expected);
}

#[test]
fn test_uncommitted_tail() {
    let dir = setup();
    let paths = table_paths(&dir);

    {
        let mut table = open_table(&dir);
        commit(&mut table, vec![Step::insert("key1", "value1")]);
    }

    // a transaction which crashed before its commit record, and half of
    // a record
    {
        let mut log_manager = LogManager::new(&paths.log).unwrap();
        log_manager.log(LogKind::Insert, "key2", "value2");
        log_manager.log(LogKind::Del, "key1", "");
        log_manager.log_flush().unwrap();

        let torn = LogRecord::commit().encode();
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&paths.log)
            .unwrap();
        file.write_all(&torn[..10]).unwrap();
    }

    let mut table = open_table(&dir);
    table.recovery().unwrap();
    assert_eq!(table.all_data().unwrap(), data(&[("key1", "value1")]));
    assert!(table.engine().log_manager.is_empty().unwrap());
}

#[test]
fn test_recovery_matches_direct_apply() {
    let batches = vec![
        vec![Step::insert("a", "1"), Step::insert("b", "2"), Step::insert("c", "3")],
        vec![Step::del("b"), Step::update("c", "33")],
        vec![Step::insert("b", "222"), Step::insert("d", "")],
    ];

    // apply everything and keep the b-tree file
    let direct_dir = setup();
    let mut direct = open_table(&direct_dir);
    for steps in batches.clone() {
        commit(&mut direct, steps);
    }
    let expected = direct.all_data().unwrap();
    assert_eq!(
        expected,
        data(&[("a", "1"), ("b", "222"), ("c", "33"), ("d", "")])
    );

    // same commits, then rebuild from the checkpoint and the log only
    let dir = setup();
    let paths = table_paths(&dir);
    {
        let mut table = open_table(&dir);
        commit(&mut table, batches[0].clone());
        table.checkpointing().unwrap();
        for steps in batches[1..].iter().cloned() {
            commit(&mut table, steps);
        }
    }
    fs::remove_file(&paths.btree).unwrap();

    let mut table = open_table(&dir);
    table.recovery().unwrap();
    assert_eq!(table.all_data().unwrap(), expected);
    table.btree().check_integrity().unwrap();

    // the empty value survives the text dump
    commit(&mut table, vec![Step::insert("e", "5")]);
    drop(table);
    fs::remove_file(&paths.btree).unwrap();

    let mut table = open_table(&dir);
    table.recovery().unwrap();
    let mut expected = expected;
    expected.insert("e".to_string(), "5".to_string());
    assert_eq!(table.all_data().unwrap(), expected);
}

#[test]
fn test_crash_right_after_create() {
    let dir = setup();

    // neither Drop nor a checkpoint runs, as in a crash before the
    // first commit
    let table = open_table(&dir);
    std::mem::forget(table);

    let mut table = open_table(&dir);
    table.recovery().unwrap();
    assert!(table.all_data().unwrap().is_empty());

    commit(&mut table, vec![Step::insert("key1", "value1")]);
    assert_eq!(table.all_data().unwrap(), data(&[("key1", "value1")]));
}
