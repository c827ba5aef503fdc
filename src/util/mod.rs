//! Utility modules: logging setup and the on-disk response cache.

pub mod cache;
pub mod logging;

pub use cache::ResponseCache;
pub use logging::{init_from_env, init_logging, LoggingConfig};
