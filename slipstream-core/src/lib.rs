//! Slipstream Core - torrent-backed progressive streaming engine
//!
//! This crate provides the streaming engine behind Slipstream: a narrow
//! torrent client surface with per-file readers, streaming session
//! lifecycle, background media probing, and the live ffmpeg remux
//! pipeline that turns non-browser containers into fragmented MP4.

#![deny(missing_docs)]

pub mod config;
pub mod session;
pub mod streaming;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::SlipstreamConfig;
pub use session::{SessionError, SessionManager, StreamSession, StreamStatus};
pub use streaming::{MediaProbe, MediaProber, Remuxer, StreamingError};
pub use torrent::{FileReader, Torrent, TorrentClient, TorrentError};
pub use tracing_setup::{CliLogLevel, TracingOptions, init_tracing};

/// Core errors that can bubble up from any Slipstream subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SlipstreamError {
    /// Torrent engine errors (magnet parsing, metadata, swarm I/O)
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    /// Session lifecycle errors (unknown id, unplayable torrent)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Streaming pipeline errors (remuxer, prober)
    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Human-readable description of the configuration error
        reason: String,
    },

    /// Standard I/O errors from filesystem operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using SlipstreamError as the error type
pub type Result<T> = std::result::Result<T, SlipstreamError>;
