use crate::error::KvError;

pub type KvResult<T = ()> = Result<T, KvError>;

/// Index of a 4096-byte page inside the b-tree file.
pub type PageId = u32;

pub type TransactionID = u32;
