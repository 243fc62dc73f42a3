use log::{debug, warn};

use super::{
    flow::{DataOperation, Step, StepContext, TransactionFlow},
    lock_manager::TryLockResult,
    tx::Transaction,
};
use crate::{engine::Engine, types::KvResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    /// Ready to run the next step of its body.
    Execute,

    /// Blocked on a lock, the pending operation is retried on every
    /// turn.
    Wait,

    Done,
}

struct Task {
    txn: Transaction,
    flow: Box<dyn TransactionFlow>,
    state: TaskState,

    /// Number of granted data operations.
    pc: usize,
    pending: Option<DataOperation>,
    last_read: Option<String>,
    committed: bool,
}

impl Task {
    fn execute(&mut self, engine: &mut Engine) -> KvResult {
        let ctx = StepContext::new(self.pc, self.last_read.clone());
        match self.flow.next_step(&ctx) {
            Some(Step::Data(op)) => self.run_operation(engine, op)?,
            Some(Step::Commit) => {
                self.committed = self.txn.commit(engine)?;
                self.state = TaskState::Done;
            }
            Some(Step::Rollback) => {
                self.txn.rollback(&mut engine.lock_manager);
                self.state = TaskState::Done;
            }
            None => {
                warn!("{} ends without commit or rollback", self.txn);
                self.txn.rollback(&mut engine.lock_manager);
                self.state = TaskState::Done;
            }
        }
        Ok(())
    }

    fn retry(&mut self, engine: &mut Engine) -> KvResult {
        match self.pending.take() {
            Some(op) => self.run_operation(engine, op),
            None => {
                self.state = TaskState::Execute;
                Ok(())
            }
        }
    }

    fn run_operation(&mut self, engine: &mut Engine, op: DataOperation) -> KvResult {
        match self.txn.exec(engine, &op)? {
            TryLockResult::GetLock => {
                if let DataOperation::Select(key) = &op {
                    self.last_read = self.txn.get_value(key);
                }
                self.pc += 1;
                self.state = TaskState::Execute;
            }
            TryLockResult::Wait => {
                debug!("{} waits on {}", self.txn, op);
                self.pending = Some(op);
                self.state = TaskState::Wait;
            }
            TryLockResult::Abort => {
                debug!("{} aborts on {}", self.txn, op);
                self.state = TaskState::Done;
            }
        }
        Ok(())
    }
}

/// Runs transactions in an interleaved way on a single thread.
///
/// The tasks are visited round-robin, each visit runs at most one
/// step of the task. A task blocked on a lock keeps its turn but only
/// retries the blocked operation. Since wait-die never lets an older
/// transaction wait for a younger one, some task always makes
/// progress.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, txn: Transaction, flow: Box<dyn TransactionFlow>) {
        self.tasks.push(Task {
            txn,
            flow,
            state: TaskState::Execute,
            pc: 0,
            pending: None,
            last_read: None,
            committed: false,
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run all tasks to the end, return whether each of them committed
    /// in the order they were added.
    ///
    /// On error the remaining transactions are rolled back and all
    /// tasks are dropped.
    pub fn run(&mut self, engine: &mut Engine) -> KvResult<Vec<bool>> {
        let mut tasks = std::mem::take(&mut self.tasks);

        if let Err(e) = Self::run_tasks(&mut tasks, engine) {
            for task in tasks.iter_mut().filter(|t| t.state != TaskState::Done) {
                task.txn.rollback(&mut engine.lock_manager);
            }
            return Err(e);
        }

        Ok(tasks.iter().map(|t| t.committed).collect())
    }

    fn run_tasks(tasks: &mut [Task], engine: &mut Engine) -> KvResult {
        let total = tasks.len();
        let mut finished = 0;
        let mut idx = 0;

        while finished < total {
            let task = &mut tasks[idx];
            let running = match task.state {
                TaskState::Execute => {
                    task.execute(engine)?;
                    true
                }
                TaskState::Wait => {
                    task.retry(engine)?;
                    true
                }
                TaskState::Done => false,
            };

            if running && task.state == TaskState::Done {
                finished += 1;
            }
            idx = (idx + 1) % total;
        }
        Ok(())
    }
}
