//! Fieldscope Tools
//!
//! Command line tools for probing datasets through the field resolution
//! engine.

pub mod stats;
pub mod synthetic;

use tracing_subscriber::{EnvFilter, fmt};

/// Initialize logging with a default filter.
///
/// Use the `RUST_LOG` environment variable to override the default filter.
/// Default is `info`, with `debug` for the engine and the tools.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fieldscope_engine=debug,fieldscope_tools=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}
