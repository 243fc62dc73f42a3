use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, error, warn};

use super::record::{LogKind, LogRecord};
use crate::{types::KvResult, utils::open_or_create};

/// The write-ahead log.
///
/// Records are buffered in memory by `log` and only reach the disk
/// on `log_flush`, which a transaction calls once after it has
/// logged all its writes and the commit record.
pub struct LogManager {
    file_path: PathBuf,
    file: File,

    /// Encoded records which haven't been written yet.
    buffer: Vec<u8>,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> KvResult<Self> {
        Ok(Self {
            file_path: file_path.as_ref().to_path_buf(),
            file: open_or_create(&file_path)?,
            buffer: Vec::new(),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn log(&mut self, kind: LogKind, key: &str, value: &str) {
        self.buffer
            .extend(LogRecord::new(kind, key, value).encode());
    }

    /// Append the buffered records to the log file and make them
    /// durable.
    ///
    /// The buffer is emptied whether or not the write succeeds. On
    /// failure the file is cut back to its length before the append,
    /// so a partial write never sits in front of later records.
    pub fn log_flush(&mut self) -> KvResult {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let buffer = std::mem::take(&mut self.buffer);
        let start = self.file.seek(SeekFrom::End(0))?;
        if let Err(e) = self.append(&buffer) {
            error!(
                "append {} bytes to log {:?} failed: {}",
                buffer.len(),
                self.file_path,
                e
            );
            if let Err(truncate_err) = self.file.set_len(start) {
                error!(
                    "cut log {:?} back to {} bytes failed: {}",
                    self.file_path, start, truncate_err
                );
            }
            return Err(e);
        }

        debug!("flushed {} bytes of log", buffer.len());
        Ok(())
    }

    fn append(&mut self, buf: &[u8]) -> KvResult {
        self.file.write_all(buf)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Number of bytes logged but not flushed yet.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Truncate the log, buffered records are dropped as well.
    pub fn erase_log(&mut self) -> KvResult {
        self.buffer.clear();
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }

    pub fn size(&self) -> KvResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the log file is empty, buffered records don't count.
    pub fn is_empty(&self) -> KvResult<bool> {
        Ok(self.size()? == 0)
    }

    /// Read every valid record from the start of the log file.
    ///
    /// Reading stops at the first record which is truncated or fails
    /// its checksum, the rest of the file is considered garbage left by
    /// an interrupted write.
    pub fn read_records(&mut self) -> KvResult<Vec<LogRecord>> {
        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut buf)?;

        let mut records = Vec::new();
        let mut idx = 0;
        while idx < buf.len() {
            match LogRecord::decode(&buf, &mut idx) {
                Some(record) => records.push(record),
                None => {
                    warn!(
                        "log {:?} has an invalid record at byte {}, ignore the remaining {} bytes",
                        self.file_path,
                        idx,
                        buf.len() - idx
                    );
                    break;
                }
            }
        }
        Ok(records)
    }

    /// Print the content of the log file to the debug log.
    pub fn show_log_contents(&mut self) -> KvResult {
        let records = self.read_records()?;

        let mut depiction = String::new();
        for (i, record) in records.iter().enumerate() {
            let prefix = if i + 1 == records.len() { "└──" } else { "├──" };
            depiction.push_str(&format!("{} [record {}] {}\n", prefix, i, record));
        }
        debug!("log {:?}:\n{}", self.file_path, depiction);
        Ok(())
    }
}
