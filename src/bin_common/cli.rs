//! Config path resolution for binaries.
//!
//! Order of precedence: first CLI argument, `UPDOWN_CONFIG_PATH`, then the
//! default location.

use std::path::PathBuf;

pub const CONFIG_ENV_VAR: &str = "UPDOWN_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/updown.yaml";

/// Resolve the config file path from argv and the environment.
pub fn resolve_config_path() -> PathBuf {
    config_path_from(
        std::env::args().nth(1),
        std::env::var(CONFIG_ENV_VAR).ok(),
    )
}

pub fn config_path_from(arg: Option<String>, env: Option<String>) -> PathBuf {
    if let Some(arg) = arg {
        if !arg.is_empty() {
            return PathBuf::from(arg);
        }
    }
    if let Some(env) = env {
        if !env.is_empty() {
            return PathBuf::from(env);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
