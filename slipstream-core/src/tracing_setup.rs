//! Tracing setup for Slipstream.
//!
//! Two sinks with different jobs: the console stays at the operator's
//! chosen level with the swarm engine's targets held at warn (piece and
//! peer chatter would drown the gateway's own logs), while a debug file
//! under the data directory records enough to reconstruct a failed
//! stream after the fact: metadata waits, remuxer exits, probe reports.
//! A `RUST_LOG` setting overrides the console filter entirely.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::Result;

/// Name of the debug log file inside the log directory. Each run
/// truncates the previous one.
pub const LOG_FILE_NAME: &str = "slipstream.log";

/// Where Slipstream sends its diagnostics.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Console verbosity; `RUST_LOG` overrides it when set.
    pub console_level: Level,
    /// Directory receiving the debug log file; `None` disables file
    /// output.
    pub log_dir: Option<PathBuf>,
}

impl TracingOptions {
    /// Console output only, at the given level.
    pub fn console_only(console_level: Level) -> Self {
        Self {
            console_level,
            log_dir: None,
        }
    }

    /// Console output plus the debug file under `<data_dir>/logs`.
    pub fn with_data_dir(console_level: Level, data_dir: &Path) -> Self {
        Self {
            console_level,
            log_dir: Some(data_dir.join("logs")),
        }
    }
}

/// Installs the global subscriber described by `options`.
///
/// # Errors
///
/// - `SlipstreamError::Io` - The log directory or file cannot be
///   created
pub fn init_tracing(options: &TracingOptions) -> Result<()> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_filter(console_filter(options.console_level));

    let log_file = match &options.log_dir {
        Some(dir) => {
            create_dir_all(dir)?;
            let path = dir.join(LOG_FILE_NAME);
            Some((File::create(&path)?, path))
        }
        None => None,
    };

    match log_file {
        Some((file, path)) => {
            let file_layer = fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(file)
                .with_filter(EnvFilter::new(
                    file_level(options.console_level).to_string(),
                ));
            tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .init();
            tracing::info!(log_file = %path.display(), "debug log enabled");
        }
        None => {
            tracing_subscriber::registry().with(console_layer).init();
        }
    }

    Ok(())
}

/// Console filter: `RUST_LOG` wins when present; otherwise the chosen
/// level, with the swarm engine capped at warn.
fn console_filter(console_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{console_level},librqbit=warn")))
}

/// The file sink records at least debug, and follows the console when
/// the operator asks for trace.
fn file_level(console_level: Level) -> Level {
    if console_level > Level::DEBUG {
        console_level
    } else {
        Level::DEBUG
    }
}

/// CLI log levels for user control.
///
/// Only the clap surface: the CLI flag is the sole place a textual
/// level enters the program, and `ValueEnum` supplies its parsing and
/// display.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts the CLI log level to a tracing [`Level`].
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(CliLogLevel::Error.as_tracing_level(), Level::ERROR);
        assert_eq!(CliLogLevel::Info.as_tracing_level(), Level::INFO);
        assert_eq!(CliLogLevel::Trace.as_tracing_level(), Level::TRACE);
    }

    #[test]
    fn test_file_level_floors_at_debug() {
        assert_eq!(file_level(Level::ERROR), Level::DEBUG);
        assert_eq!(file_level(Level::INFO), Level::DEBUG);
        assert_eq!(file_level(Level::DEBUG), Level::DEBUG);
        assert_eq!(file_level(Level::TRACE), Level::TRACE);
    }

    #[test]
    fn test_console_only_has_no_log_dir() {
        assert!(TracingOptions::console_only(Level::INFO).log_dir.is_none());
    }

    #[test]
    fn test_init_creates_log_file_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = TracingOptions::with_data_dir(Level::INFO, dir.path());
        init_tracing(&options).unwrap();
        assert!(dir.path().join("logs").join(LOG_FILE_NAME).exists());
    }
}
