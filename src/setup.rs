//! Basic setup functions.

use clap::Parser;
use env_logger::{Builder, Env};

use crate::config::Config;

/// Initialize logging from `ERASERHEAD_LOG`, defaulting to `info`.
/// Safe to call more than once.
pub fn init_logging() {
    let env = Env::new()
        .filter_or("ERASERHEAD_LOG", "info")
        .write_style("ERASERHEAD_LOG_STYLE");
    let _ = Builder::from_env(env)
        .format_timestamp(None)
        .is_test(cfg!(test))
        .try_init();
    log::debug!("Logging initialized");
}

pub fn init_config() -> Config {
    let config = Config::parse();
    log::info!("Reading trace from {}", config.file.display());
    if let Some(base_path) = &config.base_path {
        log::info!("Traceback frames limited to {base_path}");
    }
    log::debug!("Config: {:?}", config);
    config
}
