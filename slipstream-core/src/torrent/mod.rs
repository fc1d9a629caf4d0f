//! Narrow, testable surface over a BitTorrent engine.
//!
//! The session manager and HTTP layer never talk to the engine directly;
//! they go through the [`TorrentClient`] / [`Torrent`] / [`FileReader`]
//! traits. The production implementation lives in [`rqbit`], a
//! deterministic in-memory implementation for tests and offline
//! development in [`simulation`].

pub mod rqbit;
pub mod simulation;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};

pub use rqbit::RqbitClient;
pub use simulation::{SimulationTorrentClient, SimulationTorrentSpec};

/// Read-ahead window of readers opened for HTTP delivery.
pub const STREAM_READ_AHEAD: u64 = 16 * 1024 * 1024;

/// Read-ahead window of the throwaway reader handed to the media prober.
pub const PROBE_READ_AHEAD: u64 = 10 * 1024 * 1024;

/// Errors that can occur during torrent operations.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    /// Magnet URI could not be parsed or is unsupported.
    #[error("invalid magnet URI: {reason}")]
    BadMagnet {
        /// Why the URI was rejected.
        reason: String,
    },

    /// No peer delivered the info dictionary within the configured bound.
    #[error("no peer delivered torrent metadata within {timeout:?}")]
    MetadataTimeout {
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// Listener sockets could not be bound at engine startup.
    #[error("torrent listener could not be started: {reason}")]
    NetworkUnreachable {
        /// Underlying bind failure.
        reason: String,
    },

    /// Requested file index does not exist in the torrent.
    #[error("file index {index} out of range")]
    FileOutOfRange {
        /// The offending index.
        index: usize,
    },

    /// Any other failure surfaced by the underlying engine.
    #[error("torrent engine error: {reason}")]
    Engine {
        /// Engine-reported failure description.
        reason: String,
    },
}

/// One file inside a torrent, as exposed to file selection and listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFileInfo {
    /// Zero-based index within the torrent's file list.
    pub index: usize,
    /// Path of the file relative to the torrent root.
    pub path: String,
    /// File length in bytes.
    pub size: u64,
}

/// Swarm-level statistics for a live torrent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwarmStats {
    /// Peers with an established connection.
    pub active_peers: u32,
}

/// Configuration applied to a [`FileReader`] when it is opened.
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Bytes past the current offset whose pieces are prioritized.
    pub read_ahead: u64,
    /// Raise piece-request urgency near the current offset at the cost
    /// of aggregate throughput.
    pub responsive: bool,
}

impl ReaderOptions {
    /// Options for readers that feed an HTTP response.
    pub fn streaming() -> Self {
        Self {
            read_ahead: STREAM_READ_AHEAD,
            responsive: true,
        }
    }

    /// Options for the short-lived reader handed to the media prober.
    pub fn probing() -> Self {
        Self {
            read_ahead: PROBE_READ_AHEAD,
            responsive: true,
        }
    }
}

/// Seekable byte sequence over one file inside a torrent.
///
/// Reads pend until the relevant pieces arrive from the swarm. Opening a
/// reader declares interest in the pieces around its offset; dropping it
/// releases that declaration. Readers are independent: every concurrent
/// HTTP request gets its own.
pub trait FileReader: AsyncRead + AsyncSeek + Send + Unpin {
    /// Adjusts the read-ahead window for subsequent reads.
    fn set_read_ahead(&mut self, bytes: u64);
}

/// Handle to one live torrent in the engine.
#[async_trait]
pub trait Torrent: Send + Sync {
    /// Hex infohash identifying the swarm.
    fn info_hash(&self) -> String;

    /// Files carried by the torrent, in metadata order.
    fn files(&self) -> Vec<TorrentFileInfo>;

    /// Current swarm statistics.
    fn stats(&self) -> SwarmStats;

    /// Bytes of the given file already verified on disk.
    fn bytes_completed(&self, file_index: usize) -> u64;

    /// Opens an independent reader over the given file.
    ///
    /// # Errors
    ///
    /// - `TorrentError::FileOutOfRange` - No file at `file_index`
    /// - `TorrentError::Engine` - The engine refused to create a stream
    fn open_reader(
        &self,
        file_index: usize,
        options: ReaderOptions,
    ) -> Result<Box<dyn FileReader>, TorrentError>;

    /// Drops the torrent from the engine. Downloaded payload stays on
    /// disk; in-flight reads observe errors and terminate.
    async fn remove(&self);
}

impl std::fmt::Debug for dyn Torrent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Torrent")
            .field("info_hash", &self.info_hash())
            .finish_non_exhaustive()
    }
}

/// Entry point into the BitTorrent engine.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Joins the swarm for a magnet URI and blocks until metadata is
    /// available, bounded by the configured metadata timeout.
    ///
    /// # Errors
    ///
    /// - `TorrentError::BadMagnet` - Malformed or unsupported URI
    /// - `TorrentError::MetadataTimeout` - No peer delivered the info
    ///   dictionary in time
    async fn add_magnet(&self, uri: &str) -> Result<Arc<dyn Torrent>, TorrentError>;

    /// Resolves a magnet's metadata and returns its file list without
    /// keeping the torrent around.
    ///
    /// # Errors
    ///
    /// - `TorrentError::BadMagnet` - Malformed or unsupported URI
    /// - `TorrentError::MetadataTimeout` - No peer delivered the info
    ///   dictionary in time
    async fn list_files(&self, uri: &str) -> Result<Vec<TorrentFileInfo>, TorrentError>;

    /// Shuts down all torrents and closes sockets; resolves when done.
    async fn close(&self);
}
