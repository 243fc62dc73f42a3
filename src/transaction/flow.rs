use std::{collections::VecDeque, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataOperation {
    Select(String),
    Insert(String, String),
    Update(String, String),
    Del(String),
}

impl DataOperation {
    pub fn key(&self) -> &str {
        match self {
            DataOperation::Select(key)
            | DataOperation::Insert(key, _)
            | DataOperation::Update(key, _)
            | DataOperation::Del(key) => key,
        }
    }
}

impl fmt::Display for DataOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataOperation::Select(key) => write!(f, "select({})", key),
            DataOperation::Insert(key, value) => write!(f, "insert({}, {})", key, value),
            DataOperation::Update(key, value) => write!(f, "update({}, {})", key, value),
            DataOperation::Del(key) => write!(f, "del({})", key),
        }
    }
}

/// What a transaction body asks the scheduler to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Data(DataOperation),
    Commit,
    Rollback,
}

impl Step {
    pub fn select(key: &str) -> Self {
        Step::Data(DataOperation::Select(key.to_string()))
    }

    pub fn insert(key: &str, value: &str) -> Self {
        Step::Data(DataOperation::Insert(key.to_string(), value.to_string()))
    }

    pub fn update(key: &str, value: &str) -> Self {
        Step::Data(DataOperation::Update(key.to_string(), value.to_string()))
    }

    pub fn del(key: &str) -> Self {
        Step::Data(DataOperation::Del(key.to_string()))
    }
}

/// What a transaction body can see when it decides its next step.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    pc: usize,
    last_read: Option<String>,
}

impl StepContext {
    pub fn new(pc: usize, last_read: Option<String>) -> Self {
        Self { pc, last_read }
    }

    /// Number of data operations which have been granted so far.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Result of the most recent `select`, `None` if the key doesn't
    /// exist or nothing has been selected yet.
    pub fn last_read(&self) -> Option<&str> {
        self.last_read.as_deref()
    }
}

/// The body of a transaction, resumed by the scheduler one step at a
/// time.
///
/// `next_step` is called once per step: a data operation which has to
/// wait for a lock is retried by the scheduler, not asked again.
/// Returning `None` ends the body without a commit, the transaction is
/// rolled back.
pub trait TransactionFlow {
    fn next_step(&mut self, ctx: &StepContext) -> Option<Step>;
}

impl<F> TransactionFlow for F
where
    F: FnMut(&StepContext) -> Option<Step>,
{
    fn next_step(&mut self, ctx: &StepContext) -> Option<Step> {
        self(ctx)
    }
}

/// A transaction body made of a fixed list of steps.
#[derive(Debug, Clone)]
pub struct Script {
    steps: VecDeque<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl TransactionFlow for Script {
    fn next_step(&mut self, _: &StepContext) -> Option<Step> {
        self.steps.pop_front()
    }
}
