use std::{collections::BTreeMap, fmt};

use log::debug;

use super::{
    flow::DataOperation,
    lock_manager::{LockManager, TryLockResult},
};
use crate::{
    btree::tree::check_entry,
    engine::Engine,
    error::KvError,
    tx_log::LogKind,
    types::{KvResult, TransactionID},
};

/// Hands out transaction ids, a smaller id means an older
/// transaction.
#[derive(Debug, Default)]
pub struct TransactionIdGenerator {
    next: TransactionID,
}

impl TransactionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> TransactionID {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Whether a key exists in the committed b-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    InKeys,
    NotInKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeKind {
    Insert,
    Update,
    Del,
}

impl OpeKind {
    fn log_kind(self) -> LogKind {
        match self {
            OpeKind::Insert => LogKind::Insert,
            OpeKind::Update => LogKind::Update,
            OpeKind::Del => LogKind::Del,
        }
    }

    /// Whether the operation can be applied when the key is in the
    /// given state.
    fn allowed_in(self, state: DataState) -> bool {
        match self {
            OpeKind::Insert => state == DataState::NotInKeys,
            OpeKind::Update | OpeKind::Del => state == DataState::InKeys,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataWrite {
    /// State of the key when this transaction wrote it for the first
    /// time.
    pub first_data_state: DataState,
    pub last_ope: OpeKind,

    /// `None` iff `last_ope` is `Del`.
    pub value: Option<String>,
}

/// A transaction under strict two-phase locking.
///
/// Writes are kept in `write_set` and only reach the b-tree (and the
/// log) on commit. Every lock taken is held until commit or rollback.
pub struct Transaction {
    txnid: TransactionID,
    write_set: BTreeMap<String, DataWrite>,
    read_set: BTreeMap<String, Option<String>>,

    /// Set when a write conflicts with the state of its key, the
    /// transaction can only roll back from then on.
    conditional_write_error: bool,
}

impl Transaction {
    pub fn begin(id_generator: &mut TransactionIdGenerator) -> Self {
        let txnid = id_generator.next_id();
        debug!("tx_{} begin", txnid);
        Self {
            txnid,
            write_set: BTreeMap::new(),
            read_set: BTreeMap::new(),
            conditional_write_error: false,
        }
    }

    pub fn get_id(&self) -> TransactionID {
        self.txnid
    }

    pub fn has_conditional_write_error(&self) -> bool {
        self.conditional_write_error
    }

    pub fn write_set(&self) -> &BTreeMap<String, DataWrite> {
        &self.write_set
    }

    pub fn read_set(&self) -> &BTreeMap<String, Option<String>> {
        &self.read_set
    }

    /// The value of `key` as seen by this transaction, including its
    /// own uncommitted writes.
    pub fn get_value(&self, key: &str) -> Option<String> {
        if let Some(value) = self.read_set.get(key) {
            return value.clone();
        }
        self.write_set.get(key).and_then(|w| w.value.clone())
    }

    pub fn exec(&mut self, engine: &mut Engine, op: &DataOperation) -> KvResult<TryLockResult> {
        match op {
            DataOperation::Select(key) => self.select(engine, key),
            DataOperation::Insert(key, value) => self.insert(engine, key, value),
            DataOperation::Update(key, value) => self.update(engine, key, value),
            DataOperation::Del(key) => self.del(engine, key),
        }
    }

    pub fn select(&mut self, engine: &mut Engine, key: &str) -> KvResult<TryLockResult> {
        check_data(key, "")?;

        if self.read_set.contains_key(key) || self.write_set.contains_key(key) {
            return Ok(TryLockResult::GetLock);
        }

        let result = engine.lock_manager.try_shared_lock(key, self.txnid);
        match result {
            TryLockResult::GetLock => {
                let value = engine.btree.search(key)?;
                self.read_set.insert(key.to_string(), value);
            }
            TryLockResult::Abort => self.rollback(&mut engine.lock_manager),
            TryLockResult::Wait => {}
        }
        Ok(result)
    }

    pub fn insert(
        &mut self,
        engine: &mut Engine,
        key: &str,
        value: &str,
    ) -> KvResult<TryLockResult> {
        check_data(key, value)?;
        self.write(engine, key, OpeKind::Insert, Some(value))
    }

    pub fn update(
        &mut self,
        engine: &mut Engine,
        key: &str,
        value: &str,
    ) -> KvResult<TryLockResult> {
        check_data(key, value)?;
        self.write(engine, key, OpeKind::Update, Some(value))
    }

    pub fn del(&mut self, engine: &mut Engine, key: &str) -> KvResult<TryLockResult> {
        check_data(key, "")?;
        self.write(engine, key, OpeKind::Del, None)
    }

    fn write(
        &mut self,
        engine: &mut Engine,
        key: &str,
        ope: OpeKind,
        value: Option<&str>,
    ) -> KvResult<TryLockResult> {
        let value = value.map(|v| v.to_string());

        // the key is already exclusively locked by us
        if let Some(write) = self.write_set.get_mut(key) {
            let state = if write.last_ope == OpeKind::Del {
                DataState::NotInKeys
            } else {
                DataState::InKeys
            };
            if !ope.allowed_in(state) {
                debug!("tx_{} conditional write error: {:?} {:?}", self.txnid, ope, key);
                self.conditional_write_error = true;
            }

            write.last_ope = ope;
            write.value = value;
            return Ok(TryLockResult::GetLock);
        }

        let result = engine.lock_manager.try_exclusive_lock(key, self.txnid);
        match result {
            TryLockResult::GetLock => {
                let state = match engine.btree.search(key)? {
                    Some(_) => DataState::InKeys,
                    None => DataState::NotInKeys,
                };
                if !ope.allowed_in(state) {
                    debug!("tx_{} conditional write error: {:?} {:?}", self.txnid, ope, key);
                    self.conditional_write_error = true;
                }

                // the shared lock (if any) became the exclusive one
                self.read_set.remove(key);
                self.write_set.insert(
                    key.to_string(),
                    DataWrite {
                        first_data_state: state,
                        last_ope: ope,
                        value,
                    },
                );
            }
            TryLockResult::Abort => self.rollback(&mut engine.lock_manager),
            TryLockResult::Wait => {}
        }
        Ok(result)
    }

    /// Validate, log and apply the writes, then release all locks.
    ///
    /// Return false if the transaction is rolled back because of a
    /// conditional write error.
    pub fn commit(&mut self, engine: &mut Engine) -> KvResult<bool> {
        for (key, write) in &self.write_set {
            let state = match engine.btree.search(key)? {
                Some(_) => DataState::InKeys,
                None => DataState::NotInKeys,
            };
            if state != write.first_data_state {
                debug!("tx_{} {:?} changed since the first write", self.txnid, key);
                self.conditional_write_error = true;
            }
        }

        if self.conditional_write_error {
            self.rollback(&mut engine.lock_manager);
            return Ok(false);
        }

        for (key, write) in &self.write_set {
            let value = write.value.as_deref().unwrap_or("");
            engine.log_manager.log(write.last_ope.log_kind(), key, value);
        }
        engine.log_manager.log(LogKind::Commit, "", "");
        engine.log_manager.log_flush()?;

        for (key, write) in &self.write_set {
            match &write.value {
                Some(value) => engine.btree.upsert(key, value)?,
                None => {
                    engine.btree.del(key)?;
                }
            }
        }

        debug!("tx_{} commit, {} writes", self.txnid, self.write_set.len());
        self.unlock(&mut engine.lock_manager);
        Ok(true)
    }

    /// Drop all writes and release all locks.
    pub fn rollback(&mut self, lock_manager: &mut LockManager) {
        debug!("tx_{} rollback", self.txnid);
        self.unlock(lock_manager);
    }

    fn unlock(&mut self, lock_manager: &mut LockManager) {
        for key in self.write_set.keys().chain(self.read_set.keys()) {
            lock_manager.unlock(key, self.txnid);
        }
        self.write_set.clear();
        self.read_set.clear();
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.txnid)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Keys and values end up in the checkpoint file as whitespace
/// separated fields, so they can't contain whitespace.
fn check_data(key: &str, value: &str) -> KvResult {
    check_entry(key, value)?;
    if key.contains(char::is_whitespace) || value.contains(char::is_whitespace) {
        return Err(KvError::new(&format!(
            "whitespace in key {:?} or value {:?}",
            key, value
        )));
    }
    Ok(())
}
