use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;

use crate::{
    btree::BTree,
    engine::Engine,
    error::KvError,
    transaction::{Scheduler, Transaction, TransactionFlow, TransactionIdGenerator},
    tx_log::{LogKind, LogManager},
    types::{KvResult, TransactionID},
    utils::{file_size, file_sync, open_or_create},
};

/// A key-value table made of three files:
///
/// - the b-tree file, which holds the committed data
/// - the data file, a plain text dump of the data made by the last
///   checkpoint, one `key value` pair per line
/// - the log file, the write-ahead log of commits since the last
///   checkpoint
pub struct Table {
    engine: Engine,
    data_file: PathBuf,
    scheduler: Scheduler,
    id_generator: TransactionIdGenerator,
}

impl Table {
    pub fn open<P: AsRef<Path>>(btree_file: P, data_file: P, log_file: P) -> KvResult<Self> {
        // the data file must exist before the first recovery
        open_or_create(&data_file)?;

        Ok(Self {
            engine: Engine::new(BTree::new(btree_file)?, LogManager::new(log_file)?),
            data_file: data_file.as_ref().to_path_buf(),
            scheduler: Scheduler::new(),
            id_generator: TransactionIdGenerator::new(),
        })
    }

    pub fn btree(&mut self) -> &mut BTree {
        &mut self.engine.btree
    }

    pub fn engine(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn all_data(&mut self) -> KvResult<BTreeMap<String, String>> {
        self.engine.btree.all_data()
    }

    /// Start a transaction which is driven by the caller rather than
    /// the scheduler.
    pub fn begin(&mut self) -> Transaction {
        Transaction::begin(&mut self.id_generator)
    }

    /// Schedule a transaction, it runs on the next `exec_transaction`.
    pub fn add_transaction<F: TransactionFlow + 'static>(&mut self, flow: F) -> TransactionID {
        let txn = Transaction::begin(&mut self.id_generator);
        let txnid = txn.get_id();
        self.scheduler.add_task(txn, Box::new(flow));
        txnid
    }

    /// Run all scheduled transactions, return whether each of them
    /// committed in the order they were added.
    pub fn exec_transaction(&mut self) -> KvResult<Vec<bool>> {
        let commits = self.scheduler.run(&mut self.engine)?;
        info!("executed {} transactions: {:?}", commits.len(), commits);
        Ok(commits)
    }

    /// Make the current data durable in the data file and empty the
    /// log.
    pub fn checkpointing(&mut self) -> KvResult {
        self.engine.btree.flush()?;

        let tmp_file = self.tmp_data_file()?;
        {
            let mut writer = BufWriter::new(File::create(&tmp_file)?);
            for (key, value) in self.engine.btree.all_data()? {
                writeln!(writer, "{} {}", key, value)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_file, &self.data_file)?;
        file_sync(&self.data_file)?;

        self.engine.log_manager.erase_log()?;
        info!("checkpoint done: {:?}", self.data_file);
        Ok(())
    }

    /// Rebuild the b-tree from the last checkpoint and the committed
    /// part of the log.
    ///
    /// Nothing happens if the log is empty, the b-tree file is up to
    /// date in that case.
    pub fn recovery(&mut self) -> KvResult {
        if file_size(self.engine.log_manager.file_path())? == 0 {
            info!("log is empty, no recovery needed");
            return Ok(());
        }

        info!("recover from {:?}", self.engine.log_manager.file_path());
        let btree = &mut self.engine.btree;
        btree.clear()?;

        let dump = fs::read_to_string(&self.data_file)?;
        for line in dump.lines() {
            let mut fields = line.split_whitespace();
            let key = match fields.next() {
                Some(key) => key,
                None => continue,
            };
            btree.insert(key, fields.next().unwrap_or(""))?;
        }

        self.engine.log_manager.show_log_contents()?;
        let records = self.engine.log_manager.read_records()?;

        let mut pending: BTreeMap<String, (LogKind, String)> = BTreeMap::new();
        let mut committed = 0;
        for record in records {
            if record.kind != LogKind::Commit {
                pending.insert(record.key, (record.kind, record.value));
                continue;
            }

            for (key, (kind, value)) in std::mem::take(&mut pending) {
                match kind {
                    LogKind::Insert | LogKind::Update => btree.upsert(&key, &value)?,
                    LogKind::Del => {
                        btree.del(&key)?;
                    }
                    LogKind::Commit => unreachable!(),
                }
            }
            committed += 1;
        }

        info!(
            "replayed {} committed transactions, discarded {} uncommitted records",
            committed,
            pending.len()
        );
        self.checkpointing()
    }

    fn tmp_data_file(&self) -> KvResult<PathBuf> {
        let name = self
            .data_file
            .file_name()
            .ok_or_else(|| KvError::new(&format!("invalid data file: {:?}", self.data_file)))?;

        let mut tmp_name = "tmp_".to_string();
        tmp_name.push_str(&name.to_string_lossy());
        Ok(self.data_file.with_file_name(tmp_name))
    }
}
