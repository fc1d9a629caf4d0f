//! Deterministic in-memory torrent backend.
//!
//! Serves registered byte patterns through the same trait surface the
//! production engine implements, so session lifecycle, file selection,
//! and HTTP delivery can be exercised without a swarm. Reads resolve
//! immediately; a removed torrent fails subsequent reads the way a
//! dropped torrent does in production.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::{
    FileReader, ReaderOptions, SwarmStats, Torrent, TorrentClient, TorrentError, TorrentFileInfo,
};

/// One file carried by a simulated torrent.
#[derive(Debug, Clone)]
pub struct SimulationFileSpec {
    /// Path relative to the torrent root.
    pub path: String,
    /// Full file content.
    pub content: Bytes,
}

/// Description of a torrent the simulated swarm knows how to serve.
#[derive(Debug, Clone)]
pub struct SimulationTorrentSpec {
    /// Magnet URI that resolves to this torrent.
    pub magnet_uri: String,
    /// Hex infohash reported for the torrent.
    pub info_hash: String,
    /// Files in metadata order.
    pub files: Vec<SimulationFileSpec>,
    /// Initially reported established-peer count.
    pub active_peers: u32,
}

/// Deterministic byte pattern for test file content.
pub fn patterned_bytes(seed: u8, len: usize) -> Bytes {
    let mut data = Vec::with_capacity(len);
    for i in 0..len {
        data.push(seed.wrapping_add((i % 251) as u8));
    }
    Bytes::from(data)
}

/// In-memory [`TorrentClient`] for tests and offline development.
#[derive(Default)]
pub struct SimulationTorrentClient {
    known: Mutex<Vec<Arc<SimulationTorrent>>>,
    added: AtomicUsize,
    dropped: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl SimulationTorrentClient {
    /// Creates an empty simulated swarm.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a torrent the simulated swarm can resolve.
    pub fn register(&self, spec: SimulationTorrentSpec) -> Arc<SimulationTorrent> {
        let active_peers = spec.active_peers;
        let torrent = Arc::new(SimulationTorrent {
            spec,
            removed: Arc::new(AtomicBool::new(false)),
            active_peers: AtomicU32::new(active_peers),
            completed_override: Mutex::new(HashMap::new()),
            last_read_ahead: Arc::new(AtomicU64::new(0)),
            drop_counter: Arc::clone(&self.dropped),
        });
        self.known.lock().unwrap().push(Arc::clone(&torrent));
        torrent
    }

    /// Number of successful magnet adds so far.
    pub fn added_count(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    /// Number of torrent drops so far.
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lookup(&self, uri: &str) -> Option<Arc<SimulationTorrent>> {
        self.known
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.spec.magnet_uri == uri || uri.contains(&t.spec.info_hash))
            .cloned()
    }
}

#[async_trait]
impl TorrentClient for SimulationTorrentClient {
    async fn add_magnet(&self, uri: &str) -> Result<Arc<dyn Torrent>, TorrentError> {
        if !uri.trim_start().starts_with("magnet:") {
            return Err(TorrentError::BadMagnet {
                reason: "URI does not start with magnet:".to_string(),
            });
        }
        // An unregistered magnet behaves like a silent swarm.
        let torrent = self
            .lookup(uri)
            .ok_or(TorrentError::MetadataTimeout {
                timeout: std::time::Duration::from_secs(0),
            })?;
        torrent.removed.store(false, Ordering::SeqCst);
        self.added.fetch_add(1, Ordering::SeqCst);
        Ok(torrent)
    }

    async fn list_files(&self, uri: &str) -> Result<Vec<TorrentFileInfo>, TorrentError> {
        if !uri.trim_start().starts_with("magnet:") {
            return Err(TorrentError::BadMagnet {
                reason: "URI does not start with magnet:".to_string(),
            });
        }
        let torrent = self
            .lookup(uri)
            .ok_or(TorrentError::MetadataTimeout {
                timeout: std::time::Duration::from_secs(0),
            })?;
        Ok(torrent.files())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for torrent in self.known.lock().unwrap().iter() {
            torrent.removed.store(true, Ordering::SeqCst);
        }
    }
}

/// One simulated torrent; tests keep the concrete handle to tweak
/// per-file progress and peer counts mid-flight.
pub struct SimulationTorrent {
    spec: SimulationTorrentSpec,
    removed: Arc<AtomicBool>,
    active_peers: AtomicU32,
    completed_override: Mutex<HashMap<usize, u64>>,
    last_read_ahead: Arc<AtomicU64>,
    drop_counter: Arc<AtomicUsize>,
}

impl SimulationTorrent {
    /// Overrides the reported established-peer count.
    pub fn set_active_peers(&self, peers: u32) {
        self.active_peers.store(peers, Ordering::SeqCst);
    }

    /// Overrides bytes-completed for one file (default: fully complete).
    pub fn set_bytes_completed(&self, file_index: usize, bytes: u64) {
        self.completed_override
            .lock()
            .unwrap()
            .insert(file_index, bytes);
    }

    /// Read-ahead most recently declared by any reader of this torrent.
    pub fn last_read_ahead(&self) -> u64 {
        self.last_read_ahead.load(Ordering::SeqCst)
    }

    /// Whether the torrent has been dropped from the client.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Torrent for SimulationTorrent {
    fn info_hash(&self) -> String {
        self.spec.info_hash.clone()
    }

    fn files(&self) -> Vec<TorrentFileInfo> {
        self.spec
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| TorrentFileInfo {
                index,
                path: file.path.clone(),
                size: file.content.len() as u64,
            })
            .collect()
    }

    fn stats(&self) -> SwarmStats {
        SwarmStats {
            active_peers: self.active_peers.load(Ordering::SeqCst),
        }
    }

    fn bytes_completed(&self, file_index: usize) -> u64 {
        if let Some(bytes) = self.completed_override.lock().unwrap().get(&file_index) {
            return *bytes;
        }
        self.spec
            .files
            .get(file_index)
            .map(|f| f.content.len() as u64)
            .unwrap_or(0)
    }

    fn open_reader(
        &self,
        file_index: usize,
        options: ReaderOptions,
    ) -> Result<Box<dyn FileReader>, TorrentError> {
        if self.is_removed() {
            return Err(TorrentError::Engine {
                reason: "torrent removed".to_string(),
            });
        }
        let file = self
            .spec
            .files
            .get(file_index)
            .ok_or(TorrentError::FileOutOfRange { index: file_index })?;
        self.last_read_ahead
            .store(options.read_ahead, Ordering::SeqCst);
        Ok(Box::new(SimulationFileReader {
            cursor: io::Cursor::new(file.content.clone()),
            removed: Arc::clone(&self.removed),
            read_ahead_sink: Arc::clone(&self.last_read_ahead),
        }))
    }

    async fn remove(&self) {
        if !self.removed.swap(true, Ordering::SeqCst) {
            self.drop_counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Reader over a fully-available simulated file.
struct SimulationFileReader {
    cursor: io::Cursor<Bytes>,
    removed: Arc<AtomicBool>,
    read_ahead_sink: Arc<AtomicU64>,
}

impl FileReader for SimulationFileReader {
    fn set_read_ahead(&mut self, bytes: u64) {
        self.read_ahead_sink.store(bytes, Ordering::SeqCst);
    }
}

impl AsyncRead for SimulationFileReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.removed.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::other("torrent removed")));
        }
        Pin::new(&mut self.cursor).poll_read(cx, buf)
    }
}

impl AsyncSeek for SimulationFileReader {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.cursor).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.cursor).poll_complete(cx)
    }
}
