mod encoding;
mod io;
mod logging;

pub use encoding::{checksum, from_hex, to_hex, HEX_LEN};
pub use io::{file_size, file_sync, open_or_create};
pub use logging::init_log;
