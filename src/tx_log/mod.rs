mod log_manager;
mod record;

pub use log_manager::LogManager;
pub use record::{LogKind, LogRecord};
