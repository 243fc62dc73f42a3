use std::{env, process};

use log::{error, info};
use small_kv::{utils::init_log, KvResult, Script, Step, StepContext, Table};

/// Run the demo transactions against a table.
///
/// `small-kv [btree file] [data file] [log file]`
pub fn main() {
    init_log();

    let args: Vec<String> = env::args().collect();
    let btree_file = args.get(1).map(String::as_str).unwrap_or("btree.db");
    let data_file = args.get(2).map(String::as_str).unwrap_or("data.txt");
    let log_file = args.get(3).map(String::as_str).unwrap_or("log.txt");

    if let Err(e) = run(btree_file, data_file, log_file) {
        error!("{}", e);
        e.show_backtrace();
        process::exit(1);
    }
}

fn run(btree_file: &str, data_file: &str, log_file: &str) -> KvResult {
    let mut table = Table::open(btree_file, data_file, log_file)?;
    table.recovery()?;

    // two writers on disjoint keys, interleaved
    table.add_transaction(Script::new(vec![
        Step::insert("key1", "value1"),
        Step::insert("key3", "value3"),
        Step::insert("key5", "value5"),
        Step::Commit,
    ]));
    table.add_transaction(Script::new(vec![
        Step::insert("key2", "value2"),
        Step::insert("key4", "value4"),
        Step::insert("key6", "value6"),
        Step::Commit,
    ]));
    report(&mut table)?;

    // read then write, both transactions touch key3
    table.add_transaction(|ctx: &StepContext| match ctx.pc() {
        0 => Some(Step::select("key1")),
        1 => Some(match ctx.last_read() {
            Some(_) => Step::update("key1", "value1_new"),
            None => Step::insert("key1", "value1_new"),
        }),
        2 => Some(Step::select("key3")),
        3 => Some(match ctx.last_read() {
            Some(_) => Step::del("key3"),
            None => Step::insert("key3", "value3_new"),
        }),
        _ => Some(Step::Commit),
    });
    table.add_transaction(|ctx: &StepContext| match ctx.pc() {
        0 => Some(Step::select("key3")),
        1 => Some(match ctx.last_read() {
            Some(_) => Step::del("key3"),
            None => Step::insert("key3", "value3_new"),
        }),
        _ => Some(Step::Commit),
    });
    report(&mut table)?;

    table.checkpointing()
}

fn report(table: &mut Table) -> KvResult {
    let commits = table.exec_transaction()?;
    for (i, committed) in commits.iter().enumerate() {
        println!(
            "transaction {}: {}",
            i,
            if *committed { "commit" } else { "abort" }
        );
    }
    for (key, value) in table.all_data()? {
        println!("{} {}", key, value);
    }
    info!("{} keys in the table", table.all_data()?.len());
    Ok(())
}
