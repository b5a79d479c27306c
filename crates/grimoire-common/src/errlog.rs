//! Writer for the single-event `error.log` file.
//!
//! The log is overwritten, not appended: it always holds the most recent
//! event only. Every entry is mirrored to `tracing::error!` so hosts with
//! a subscriber installed see the failure as well. Failures while writing
//! the log itself fall back to stderr.

use std::error::Error;
use std::fmt::Write as _;
use std::fs;

use chrono::Local;

use crate::InstallDirs;

/// Logs a plain message.
pub fn log_message(dirs: &InstallDirs, text: &str) {
    tracing::error!("{text}");
    write_log(dirs, text);
}

/// Logs an error together with its source chain.
pub fn log_error(dirs: &InstallDirs, err: &(dyn Error + 'static)) {
    tracing::error!("{err}");
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(text, "\ncaused by: {cause}");
        source = cause.source();
    }
    write_log(dirs, &text);
}

fn write_log(dirs: &InstallDirs, text: &str) {
    let line = format!("[{}] {text}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
    if let Err(write_err) = fs::write(dirs.error_log_file(), &line) {
        eprintln!("failed to write error.log: {write_err}");
        eprint!("{line}");
    }
}
