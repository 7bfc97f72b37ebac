#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message logged
//! through the macros carries the id of the crawl job that is currently
//! active, so interleaved output from background validations stays readable.

use std::sync::atomic::{AtomicU64, Ordering};

/// Id of the active crawl job. Zero means no job has been started.
static ACTIVE_JOB: AtomicU64 = AtomicU64::new(0);

/// Records `job_id` as the active job for log prefixes.
/// The orchestrator calls this once per started job.
pub fn set_active_job(job_id: u64) {
    ACTIVE_JOB.store(job_id, Ordering::Relaxed);
}

/// Returns the active job id, or 0 when no job has been started.
pub fn active_job() -> u64 {
    ACTIVE_JOB.load(Ordering::Relaxed)
}

/// Prefix used by the logging macros: `"[job N] "`, or empty outside a job.
#[doc(hidden)]
pub fn job_prefix() -> String {
    match active_job() {
        0 => String::new(),
        id => format!("[job {id}] "),
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::job_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
