use tracing_subscriber::EnvFilter;

/// Directives applied when `RUST_LOG` is unset. The rocksdb crate logs
/// compaction chatter at info, so it is held back to warn.
const DEFAULT_DIRECTIVES: &str = "info,rocksdb=warn";

/// Initialize structured logging for the send queue.
///
/// Debug builds emit pretty-printed human-readable output; release builds
/// emit JSON for log aggregation. `RUST_LOG` overrides the default filter,
/// e.g. `RUST_LOG=remessa_core=debug,info` to trace claim and dispatch
/// decisions.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    if cfg!(debug_assertions) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    }
}
