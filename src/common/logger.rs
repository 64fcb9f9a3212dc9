//! logger setup
//! stdout output, level taken from settings

use std::sync::Once;
use pretty_env_logger;
use super::setting::Settings;

static INIT: Once = Once::new();

fn level_filter(level: &str) -> log::LevelFilter {
    match level {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info
    }
}

/// initialise the logger, repeated calls are ignored
pub fn init_logger() {
    INIT.call_once(|| {
        let result = pretty_env_logger::formatted_builder()
            .target(pretty_env_logger::env_logger::Target::Stdout)
            .filter_level(level_filter(Settings::get().env.log_level.as_str()))
            .try_init();
        if result.is_err() {
            println!("logger already initialised elsewhere");
        }
    });
}


/// log with a TAG prefix, supports trace debug info warn error
#[macro_export]
macro_rules! warn {
    ($tag:expr, $($arg:tt)*) => ({
        log::warn!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! error {
    ($tag:expr, $($arg:tt)*) => ({
        log::error!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! info {
    ($tag:expr, $($arg:tt)*) => ({
        log::info!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! debug {
    ($tag:expr, $($arg:tt)*) => ({
        log::debug!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! trace {
    ($tag:expr, $($arg:tt)*) => ({
        log::trace!("[{}] {}", $tag, format_args!($($arg)*));
    })
}
