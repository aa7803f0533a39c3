//! Environment variable names read by [`LayerConfig::from_env`].
//!
//! These are purely helpers; the formatter itself never touches the
//! environment.
//!
//! [`LayerConfig::from_env`]: crate::init::LayerConfig::from_env

/// Filter directives for the installed subscriber, e.g. `info,my_crate=debug`.
pub const LOG_DATA_MODEL_FILTER_ENV: &str = "LOG_DATA_MODEL_FILTER";

/// Fallback filter variable used when [`LOG_DATA_MODEL_FILTER_ENV`] is unset.
pub const RUST_LOG_ENV: &str = "RUST_LOG";

/// Output stream, `stdout` (default) or `stderr`.
pub const LOG_DATA_MODEL_OUTPUT_ENV: &str = "LOG_DATA_MODEL_OUTPUT";

/// Read an environment variable, treating an empty value as unset.
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
