pub mod btree;
pub mod engine;
pub mod error;
pub mod table;
pub mod transaction;
pub mod tx_log;
pub mod types;
pub mod utils;

pub use btree::BTree;
pub use error::KvError;
pub use table::Table;
pub use transaction::{Script, Step, StepContext, TransactionFlow, TryLockResult};
pub use types::KvResult;
