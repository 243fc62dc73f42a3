use std::{
    fs::{self, File, OpenOptions},
    path::Path,
};

use crate::types::KvResult;

/// Open the file with read and write mode.
///
/// If the file doesn't exist, it will be created.
pub fn open_or_create<P: AsRef<Path>>(file_path: P) -> KvResult<File> {
    let file = OpenOptions::new()
        .write(true)
        .read(true)
        .create(true)
        .open(file_path)?;
    Ok(file)
}

pub fn file_size<P: AsRef<Path>>(file_path: P) -> KvResult<u64> {
    Ok(fs::metadata(file_path)?.len())
}

/// Flush the content and metadata of the named file to the disk.
pub fn file_sync<P: AsRef<Path>>(file_path: P) -> KvResult {
    let file = OpenOptions::new().read(true).open(file_path)?;
    file.sync_all()?;
    Ok(())
}
