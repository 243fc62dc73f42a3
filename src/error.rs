use std::{error::Error, fmt, io};

use backtrace::Backtrace;
use log::error;

#[derive(Debug)]
pub struct KvError {
    details: String,
}

impl KvError {
    pub fn new(msg: &str) -> KvError {
        KvError {
            details: msg.to_string(),
        }
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    /// Log the error together with the backtrace of the caller.
    pub fn show_backtrace(&self) {
        let bt = Backtrace::new();
        error!("msg: [{}], backtrace: {:?}", self.details, bt);
    }
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl Error for KvError {}

impl From<io::Error> for KvError {
    fn from(e: io::Error) -> Self {
        KvError::new(&format!("io error: {}", e))
    }
}
