//! Streaming sessions: the central entity tying a torrent, its chosen
//! video file, and the probe results together for the HTTP layer.

pub mod manager;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::streaming::probe::{AudioTrack, MediaProbe};
use crate::torrent::{FileReader, ReaderOptions, Torrent, TorrentError};

pub use manager::{SessionManager, StartStream};

/// Status reported for every live session.
///
/// Set at creation, before any buffering has occurred; real readiness is
/// conveyed by `buffered_percent` on the status endpoint.
pub const STATUS_READY: &str = "ready";

/// Errors surfaced by session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with the given id.
    #[error("session not found: {id}")]
    NotFound {
        /// The unknown id.
        id: String,
    },

    /// Torrent metadata arrived but held no recognized video file.
    #[error("torrent contains no playable video file")]
    NoVideoInTorrent,

    /// Failure from the torrent engine.
    #[error(transparent)]
    Torrent(#[from] TorrentError),
}

/// Session descriptor returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSession {
    /// Opaque session id.
    pub session_id: Uuid,
    /// TMDB id the client associated with this playback.
    pub tmdb_id: i64,
    /// Display title.
    pub title: String,
    /// Magnet the session was started from.
    pub magnet_uri: String,
    /// Hex infohash of the swarm.
    pub info_hash: String,
    /// Path of the chosen video file inside the torrent.
    pub file_path: String,
    /// Size of the chosen file in bytes.
    pub file_size: u64,
    /// MIME type served on the direct path.
    pub content_type: String,
    /// Whether delivery goes through the remux path.
    pub needs_transcode: bool,
    /// Session status; always `ready` while the session lives.
    pub status: String,
    /// Probed duration in seconds; 0 until the probe succeeds.
    pub duration: f64,
    /// Probed audio tracks; empty until the probe succeeds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audio_tracks: Vec<AudioTrack>,
}

/// Download progress snapshot for a session.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// Session status string.
    pub status: String,
    /// Bytes of the chosen file verified on disk.
    pub downloaded_bytes: u64,
    /// Size of the chosen file.
    pub total_bytes: u64,
    /// First-order download speed estimate, bytes per second.
    pub download_speed: u64,
    /// Established peer connections.
    pub peers_connected: u32,
    /// `downloaded_bytes / total_bytes × 100`, derived.
    pub buffered_percent: f64,
    /// Probed duration in seconds; 0 means unknown.
    pub duration: f64,
    /// Probed audio tracks.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audio_tracks: Vec<AudioTrack>,
}

/// One live streaming session.
///
/// Identity and delivery attributes are fixed at creation; probe results
/// and the speed sample mutate under the session mutex. The torrent
/// handle stays alive for the session's whole lifetime and is dropped
/// exactly once, by whoever removes the session from the registry.
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) tmdb_id: i64,
    pub(crate) title: String,
    pub(crate) magnet_uri: String,
    pub(crate) info_hash: String,
    pub(crate) file_path: String,
    pub(crate) file_index: usize,
    pub(crate) file_size: u64,
    pub(crate) content_type: String,
    pub(crate) needs_transcode: bool,
    pub(crate) torrent: Arc<dyn Torrent>,
    pub(crate) state: Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("info_hash", &self.info_hash)
            .finish_non_exhaustive()
    }
}

/// Mutable session state, guarded by the session mutex.
pub(crate) struct SessionState {
    pub(crate) duration: f64,
    pub(crate) audio_tracks: Vec<AudioTrack>,
    pub(crate) last_bytes: u64,
    pub(crate) last_sample: Option<Instant>,
    pub(crate) last_speed: u64,
    /// Long-lived reader that keeps pieces near the head hot and is
    /// retuned by the dynamic read-ahead policy.
    pub(crate) status_reader: Option<Box<dyn FileReader>>,
}

impl Session {
    /// Opaque session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether this session serves through the remux path.
    pub fn needs_transcode(&self) -> bool {
        self.needs_transcode
    }

    /// MIME type for direct delivery.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Size of the chosen file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path of the chosen file inside the torrent.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Probed duration in seconds; 0 means unknown and disables
    /// time-based seeking on the remux path.
    pub async fn duration(&self) -> f64 {
        self.state.lock().await.duration
    }

    /// Opens a fresh independent reader over the chosen file. Every
    /// concurrent request must use its own.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Engine` - The torrent was dropped or the engine
    ///   refused a new stream
    pub fn open_reader(&self, options: ReaderOptions) -> Result<Box<dyn FileReader>, TorrentError> {
        self.torrent.open_reader(self.file_index, options)
    }

    /// Applies probe results under the session mutex. A zero duration
    /// leaves the unknown sentinel untouched.
    pub async fn apply_probe(&self, probe: MediaProbe) {
        let mut state = self.state.lock().await;
        if probe.duration > 0.0 {
            state.duration = probe.duration;
        }
        state.audio_tracks = probe.audio_tracks;
    }

    /// Snapshot of the session descriptor as returned to clients.
    pub async fn descriptor(&self) -> StreamSession {
        let state = self.state.lock().await;
        StreamSession {
            session_id: self.id,
            tmdb_id: self.tmdb_id,
            title: self.title.clone(),
            magnet_uri: self.magnet_uri.clone(),
            info_hash: self.info_hash.clone(),
            file_path: self.file_path.clone(),
            file_size: self.file_size,
            content_type: self.content_type.clone(),
            needs_transcode: self.needs_transcode,
            status: STATUS_READY.to_string(),
            duration: state.duration,
            audio_tracks: state.audio_tracks.clone(),
        }
    }
}
