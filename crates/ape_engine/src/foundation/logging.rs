//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default filter such as `"info"` or `"ape_engine=debug"`.
///
/// `RUST_LOG`, when set, still takes precedence over `default_filter`.
pub fn init_with_level(default_filter: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(default_filter);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // Repeated initialization keeps the first logger
    let _ = builder.try_init();
}
