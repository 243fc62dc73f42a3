mod flow;
mod lock_manager;
mod scheduler;
mod tx;

pub use flow::{DataOperation, Script, Step, StepContext, TransactionFlow};
pub use lock_manager::{Lock, LockManager, TryLockResult};
pub use scheduler::Scheduler;
pub use tx::{DataState, DataWrite, OpeKind, Transaction, TransactionIdGenerator};
