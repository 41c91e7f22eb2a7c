//! Structured logging (§10): one global `tracing-subscriber` installed at
//! startup, mirroring the teacher's `node/src/main.rs` initialization.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `debug` forces `debug` level when
/// `RUST_LOG` is unset; otherwise `RUST_LOG` wins.
pub fn init(debug: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug { "debug" } else { "info" };
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
