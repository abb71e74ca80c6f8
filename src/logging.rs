//! Process-wide tracing setup
//!
//! Two sinks: a console layer on stderr whose verbosity follows `-v`, and an
//! append-only log file that always records INFO and above.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::Result;

/// Console filter for a `-v` count
#[must_use]
pub const fn console_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the console filter when set. The file is opened in
/// append mode and never rotated.
///
/// # Errors
///
/// Returns error if the log directory or file cannot be created
pub fn init(verbose: u8, log_file: &Path) -> Result<()> {
    let file = open_log_file(log_file)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_filter(verbose)));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer(file))
        .init();

    tracing::debug!(path = %log_file.display(), "logging initialized");
    Ok(())
}

/// Open `path` for appending, creating it and its directory if needed
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Plain-text layer writing INFO and above to `file`
fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_filter(LevelFilter::INFO)
}

/// Install a console-only subscriber
///
/// Used when the log file cannot be opened.
pub fn init_console(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_filter(verbose)));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();
}
