//! Up/Down MM Bot - Main Library
//!
//! Re-exports the engine library and hosts the shared binary scaffolding.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (config path
//!   resolution, run banner)
//! - **updown**: The engine library (re-exported from the workspace)

// Re-export the workspace library for convenience
pub use updown;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables.

    pub mod cli;
    pub mod runner;

    pub use cli::resolve_config_path;
    pub use runner::print_banner;
}
