//! Startup banner shared by binaries.

use tracing::info;

pub fn print_banner(name: &str, mode: &str) {
    info!("");
    info!("========================================");
    info!("Starting {} ({})", name, mode);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}
