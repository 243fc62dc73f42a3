use std::io::Write;

use env_logger::{Builder, Env};

/// Install the global logger, calling it more than once is harmless.
///
/// `RUST_LOG` picks the level, `info` when it's unset. A line looks like
/// `2026-01-01T00:00:00Z WARN small_kv::tx_log [log_manager.rs:120] msg`.
pub fn init_log() {
    let env = Env::default().default_filter_or("info");
    let _ = Builder::from_env(env)
        .format(|buf, record| {
            let file = record
                .file()
                .and_then(|path| path.rsplit('/').next())
                .unwrap_or("?");
            writeln!(
                buf,
                "{} {:<5} {} [{}:{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.module_path().unwrap_or("?"),
                file,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(cfg!(test))
        .try_init();
}
