//! Registry and lifecycle of streaming sessions.
//!
//! Lock ordering: registry lock before session mutex, never the
//! reverse. Lookups take the read lock; insert and delete take the
//! write lock, which makes a concurrent double-stop resolve to exactly
//! one success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use super::{STATUS_READY, Session, SessionError, SessionState, StreamSession, StreamStatus};
use crate::streaming::MediaProber;
use crate::streaming::media_info::ContainerFormat;
use crate::torrent::{
    ReaderOptions, STREAM_READ_AHEAD, TorrentClient, TorrentFileInfo,
};

/// Peer count below which the status reader widens to the large window.
const LOW_PEER_THRESHOLD: u32 = 3;

/// Read-ahead when the swarm is thin; more outstanding interest keeps
/// the few peers busy.
const LOW_PEER_READ_AHEAD: u64 = 64 * 1024 * 1024;

/// Buffered percentage below which playback is still starting up.
const EARLY_BUFFER_PERCENT: f64 = 10.0;

/// Read-ahead during startup, to ride out early variance.
const EARLY_READ_AHEAD: u64 = 32 * 1024 * 1024;

/// Parameters of a stream start request.
#[derive(Debug, Clone)]
pub struct StartStream {
    /// TMDB id the client associates with the playback.
    pub tmdb_id: i64,
    /// Display title.
    pub title: String,
    /// Magnet URI to stream from.
    pub magnet_uri: String,
    /// Explicit file choice; `None` selects the largest video file.
    pub file_index: Option<usize>,
}

/// Registry of active streaming sessions.
pub struct SessionManager {
    client: Arc<dyn TorrentClient>,
    prober: Arc<dyn MediaProber>,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionManager {
    /// Creates a manager over the given torrent client and prober.
    pub fn new(client: Arc<dyn TorrentClient>, prober: Arc<dyn MediaProber>) -> Self {
        Self {
            client,
            prober,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Starts a streaming session for a magnet URI.
    ///
    /// Blocks until torrent metadata is available, picks the video file,
    /// opens the long-lived status reader, registers the session, and
    /// fires the media probe in the background. Probe failure is
    /// non-fatal.
    ///
    /// # Errors
    ///
    /// - `SessionError::Torrent` - Magnet rejected, metadata timed out,
    ///   or the engine failed
    /// - `SessionError::NoVideoInTorrent` - No recognized video file (or
    ///   an explicit `file_index` that is not one); the torrent is
    ///   dropped before returning
    pub async fn start_stream(&self, request: StartStream) -> Result<StreamSession, SessionError> {
        info!(title = %request.title, "starting stream");

        let torrent = self.client.add_magnet(&request.magnet_uri).await?;

        let files = torrent.files();
        let Some(file) = select_video_file(&files, request.file_index) else {
            torrent.remove().await;
            return Err(SessionError::NoVideoInTorrent);
        };

        let format = ContainerFormat::from_path(&file.path);

        let status_reader = match torrent.open_reader(file.index, ReaderOptions::streaming()) {
            Ok(reader) => reader,
            Err(e) => {
                torrent.remove().await;
                return Err(e.into());
            }
        };

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            tmdb_id: request.tmdb_id,
            title: request.title,
            magnet_uri: request.magnet_uri,
            info_hash: torrent.info_hash(),
            file_path: file.path.clone(),
            file_index: file.index,
            file_size: file.size,
            content_type: format.mime_type().to_string(),
            needs_transcode: format.needs_remux(),
            torrent,
            state: Mutex::new(SessionState {
                duration: 0.0,
                audio_tracks: Vec::new(),
                last_bytes: 0,
                last_sample: None,
                last_speed: 0,
                status_reader: Some(status_reader),
            }),
        });

        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));

        self.spawn_probe(&session);

        info!(
            session_id = %session.id,
            file = %session.file_path,
            size = session.file_size,
            transcode = session.needs_transcode,
            "stream session created"
        );

        Ok(session.descriptor().await)
    }

    /// Looks up a live session.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` - Unknown id
    pub async fn session(&self, id: &Uuid) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    /// Computes the download status of a session.
    ///
    /// Each call takes a speed sample (first call reports 0) and retunes
    /// the status reader's read-ahead: a thin swarm gets the widest
    /// window, early playback a widened one, steady state the default.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` - Unknown id
    pub async fn status(&self, id: &Uuid) -> Result<StreamStatus, SessionError> {
        let session = self.session(id).await?;

        let downloaded = session.torrent.bytes_completed(session.file_index);
        let stats = session.torrent.stats();
        let buffered_percent = if session.file_size == 0 {
            0.0
        } else {
            downloaded as f64 / session.file_size as f64 * 100.0
        };

        let mut state = session.state.lock().await;

        let read_ahead = if stats.active_peers < LOW_PEER_THRESHOLD {
            LOW_PEER_READ_AHEAD
        } else if buffered_percent < EARLY_BUFFER_PERCENT {
            EARLY_READ_AHEAD
        } else {
            STREAM_READ_AHEAD
        };
        if let Some(reader) = state.status_reader.as_mut() {
            reader.set_read_ahead(read_ahead);
        }

        let now = Instant::now();
        let speed = match state.last_sample {
            Some(previous) => {
                let elapsed = now.duration_since(previous).as_secs_f64();
                if elapsed > 0.0 {
                    (downloaded.saturating_sub(state.last_bytes) as f64 / elapsed) as u64
                } else {
                    state.last_speed
                }
            }
            None => 0,
        };
        state.last_bytes = downloaded;
        state.last_sample = Some(now);
        state.last_speed = speed;

        Ok(StreamStatus {
            status: STATUS_READY.to_string(),
            downloaded_bytes: downloaded,
            total_bytes: session.file_size,
            download_speed: speed,
            peers_connected: stats.active_peers,
            buffered_percent,
            duration: state.duration,
            audio_tracks: state.audio_tracks.clone(),
        })
    }

    /// Stops a session: removes it from the registry, closes the status
    /// reader, then drops the torrent. Of two racing stops exactly one
    /// succeeds; the loser observes `NotFound`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotFound` - Unknown (or already stopped) id
    pub async fn stop_session(&self, id: &Uuid) -> Result<(), SessionError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;

        session.state.lock().await.status_reader = None;
        session.torrent.remove().await;

        info!(session_id = %session.id, "stream session stopped");
        Ok(())
    }

    /// Resolves a magnet's file list without creating a session.
    ///
    /// # Errors
    ///
    /// - `SessionError::Torrent` - Magnet rejected or metadata timed out
    pub async fn list_files(&self, magnet_uri: &str) -> Result<Vec<TorrentFileInfo>, SessionError> {
        Ok(self.client.list_files(magnet_uri).await?)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Stops every session and shuts the torrent client down.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in sessions {
            session.state.lock().await.status_reader = None;
            session.torrent.remove().await;
            info!(session_id = %session.id, "stream session stopped");
        }

        self.client.close().await;
    }

    fn spawn_probe(&self, session: &Arc<Session>) {
        let reader = match session
            .torrent
            .open_reader(session.file_index, ReaderOptions::probing())
        {
            Ok(reader) => reader,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "probe reader unavailable");
                return;
            }
        };

        let prober = Arc::clone(&self.prober);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            match prober.probe(reader).await {
                Ok(probe) => {
                    info!(
                        session_id = %session.id,
                        duration_sec = probe.duration,
                        audio_tracks = probe.audio_tracks.len(),
                        "probed media info"
                    );
                    session.apply_probe(probe).await;
                }
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "media probe failed");
                }
            }
        });
    }
}

/// Picks the file to stream: the explicit index when the request names
/// one (it must carry a video extension), otherwise the largest file
/// with a recognized video extension.
fn select_video_file(
    files: &[TorrentFileInfo],
    explicit: Option<usize>,
) -> Option<TorrentFileInfo> {
    match explicit {
        Some(index) => files
            .get(index)
            .filter(|f| ContainerFormat::is_video(&f.path))
            .cloned(),
        None => files
            .iter()
            .filter(|f| ContainerFormat::is_video(&f.path))
            .max_by_key(|f| f.size)
            .cloned(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::streaming::probe::{AudioTrack, MediaProbe, SimulationProber};
    use crate::torrent::simulation::{
        SimulationFileSpec, SimulationTorrent, SimulationTorrentClient, SimulationTorrentSpec,
        patterned_bytes,
    };
    use crate::torrent::{PROBE_READ_AHEAD, TorrentError};

    const MAGNET: &str = "magnet:?xt=urn:btih:feedc0de";

    fn movie_spec(files: Vec<(&str, usize)>) -> SimulationTorrentSpec {
        SimulationTorrentSpec {
            magnet_uri: MAGNET.to_string(),
            info_hash: "feedc0de".to_string(),
            files: files
                .into_iter()
                .enumerate()
                .map(|(i, (path, len))| SimulationFileSpec {
                    path: path.to_string(),
                    content: patterned_bytes(i as u8, len),
                })
                .collect(),
            active_peers: 5,
        }
    }

    fn manager_with(
        spec: SimulationTorrentSpec,
        prober: SimulationProber,
    ) -> (
        Arc<SessionManager>,
        Arc<SimulationTorrentClient>,
        Arc<SimulationTorrent>,
    ) {
        let client = Arc::new(SimulationTorrentClient::new());
        let torrent = client.register(spec);
        let manager = Arc::new(SessionManager::new(
            Arc::clone(&client) as Arc<dyn TorrentClient>,
            Arc::new(prober),
        ));
        (manager, client, torrent)
    }

    fn start_request() -> StartStream {
        StartStream {
            tmdb_id: 603,
            title: "Test Movie".to_string(),
            magnet_uri: MAGNET.to_string(),
            file_index: None,
        }
    }

    #[tokio::test]
    async fn test_start_stream_selects_largest_video() {
        let spec = movie_spec(vec![
            ("sample.mp4", 1024),
            ("movie.mkv", 65536),
            ("readme.txt", 100_000),
        ]);
        let (manager, _client, _torrent) = manager_with(spec, SimulationProber::failing());

        let session = manager.start_stream(start_request()).await.unwrap();
        assert_eq!(session.file_path, "movie.mkv");
        assert_eq!(session.file_size, 65536);
        assert!(session.needs_transcode);
        assert_eq!(session.content_type, "video/x-matroska");
        assert_eq!(session.status, "ready");
        assert_eq!(session.duration, 0.0);
    }

    #[tokio::test]
    async fn test_start_stream_direct_for_mp4() {
        let spec = movie_spec(vec![("movie.mp4", 4096)]);
        let (manager, _client, _torrent) = manager_with(spec, SimulationProber::failing());

        let session = manager.start_stream(start_request()).await.unwrap();
        assert!(!session.needs_transcode);
        assert_eq!(session.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_no_video_drops_torrent() {
        let spec = movie_spec(vec![("readme.txt", 4096), ("cover.jpg", 2048)]);
        let (manager, client, torrent) = manager_with(spec, SimulationProber::failing());

        let err = manager.start_stream(start_request()).await.unwrap_err();
        assert!(matches!(err, SessionError::NoVideoInTorrent));
        assert!(torrent.is_removed());
        assert_eq!(client.added_count(), 1);
        assert_eq!(client.dropped_count(), 1);
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_explicit_file_index() {
        let spec = movie_spec(vec![("episode1.mkv", 8192), ("episode2.mkv", 8192)]);
        let (manager, _client, _torrent) = manager_with(spec, SimulationProber::failing());

        let mut request = start_request();
        request.file_index = Some(1);
        let session = manager.start_stream(request).await.unwrap();
        assert_eq!(session.file_path, "episode2.mkv");
    }

    #[tokio::test]
    async fn test_explicit_file_index_must_be_video() {
        let spec = movie_spec(vec![("movie.mkv", 8192), ("subs.srt", 100)]);
        let (manager, client, _torrent) = manager_with(spec, SimulationProber::failing());

        let mut request = start_request();
        request.file_index = Some(1);
        let err = manager.start_stream(request).await.unwrap_err();
        assert!(matches!(err, SessionError::NoVideoInTorrent));
        assert_eq!(client.dropped_count(), 1);

        let mut request = start_request();
        request.file_index = Some(9);
        let err = manager.start_stream(request).await.unwrap_err();
        assert!(matches!(err, SessionError::NoVideoInTorrent));
    }

    #[tokio::test]
    async fn test_bad_magnet_propagates() {
        let (manager, _client, _torrent) =
            manager_with(movie_spec(vec![("a.mp4", 16)]), SimulationProber::failing());

        let mut request = start_request();
        request.magnet_uri = "http://not-a-magnet".to_string();
        let err = manager.start_stream(request).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Torrent(TorrentError::BadMagnet { .. })
        ));
    }

    #[tokio::test]
    async fn test_session_lookup_until_stopped() {
        let (manager, _client, torrent) =
            manager_with(movie_spec(vec![("movie.mp4", 4096)]), SimulationProber::failing());

        let descriptor = manager.start_stream(start_request()).await.unwrap();
        let id = descriptor.session_id;

        let session = manager.session(&id).await.unwrap();
        assert_eq!(session.id(), id);

        manager.stop_session(&id).await.unwrap();
        assert!(torrent.is_removed());
        assert!(matches!(
            manager.session(&id).await.unwrap_err(),
            SessionError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_stop_twice_resolves_one_not_found() {
        let (manager, client, _torrent) =
            manager_with(movie_spec(vec![("movie.mp4", 4096)]), SimulationProber::failing());

        let id = manager.start_stream(start_request()).await.unwrap().session_id;

        manager.stop_session(&id).await.unwrap();
        assert!(matches!(
            manager.stop_session(&id).await.unwrap_err(),
            SessionError::NotFound { .. }
        ));
        // One add, one drop, no double-release.
        assert_eq!(client.added_count(), 1);
        assert_eq!(client.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_progress_bounds() {
        let (manager, _client, torrent) =
            manager_with(movie_spec(vec![("movie.mp4", 10_000)]), SimulationProber::failing());

        let id = manager.start_stream(start_request()).await.unwrap().session_id;

        let status = manager.status(&id).await.unwrap();
        assert_eq!(status.downloaded_bytes, 10_000);
        assert_eq!(status.total_bytes, 10_000);
        assert_eq!(status.buffered_percent, 100.0);
        assert_eq!(status.download_speed, 0, "first sample reports zero");
        assert_eq!(status.peers_connected, 5);

        torrent.set_bytes_completed(0, 2_500);
        let status = manager.status(&id).await.unwrap();
        assert_eq!(status.downloaded_bytes, 2_500);
        assert_eq!(status.buffered_percent, 25.0);
    }

    #[tokio::test]
    async fn test_dynamic_read_ahead_policy() {
        let (manager, _client, torrent) =
            manager_with(movie_spec(vec![("movie.mp4", 10_000)]), SimulationProber::failing());

        let id = manager.start_stream(start_request()).await.unwrap().session_id;

        // Thin swarm wins over everything.
        torrent.set_active_peers(1);
        manager.status(&id).await.unwrap();
        assert_eq!(torrent.last_read_ahead(), LOW_PEER_READ_AHEAD);

        // Healthy swarm, early playback.
        torrent.set_active_peers(10);
        torrent.set_bytes_completed(0, 500);
        manager.status(&id).await.unwrap();
        assert_eq!(torrent.last_read_ahead(), EARLY_READ_AHEAD);

        // Steady state.
        torrent.set_bytes_completed(0, 9_000);
        manager.status(&id).await.unwrap();
        assert_eq!(torrent.last_read_ahead(), STREAM_READ_AHEAD);
    }

    #[tokio::test]
    async fn test_speed_clamps_and_tracks_progress() {
        let (manager, _client, torrent) =
            manager_with(movie_spec(vec![("movie.mp4", 100_000)]), SimulationProber::failing());

        let id = manager.start_stream(start_request()).await.unwrap().session_id;

        torrent.set_bytes_completed(0, 1_000);
        assert_eq!(manager.status(&id).await.unwrap().download_speed, 0);

        torrent.set_bytes_completed(0, 50_000);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.status(&id).await.unwrap().download_speed > 0);

        // Progress can never run backwards into a negative speed.
        torrent.set_bytes_completed(0, 10_000);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.status(&id).await.unwrap().download_speed, 0);
    }

    #[tokio::test]
    async fn test_probe_populates_session() {
        let prober = SimulationProber::with_report(MediaProbe {
            duration: 5400.0,
            audio_tracks: vec![
                AudioTrack {
                    index: 0,
                    language: "eng".to_string(),
                    title: "Track 1 (eng)".to_string(),
                },
                AudioTrack {
                    index: 1,
                    language: "fra".to_string(),
                    title: "Track 2 (fra)".to_string(),
                },
            ],
        });
        let (manager, _client, _torrent) =
            manager_with(movie_spec(vec![("movie.mkv", 4096)]), prober);

        let id = manager.start_stream(start_request()).await.unwrap().session_id;

        // The probe runs in a background task; give it a bounded window.
        let mut status = manager.status(&id).await.unwrap();
        for _ in 0..50 {
            if !status.audio_tracks.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = manager.status(&id).await.unwrap();
        }

        assert_eq!(status.duration, 5400.0);
        assert_eq!(status.audio_tracks.len(), 2);
        assert_eq!(status.audio_tracks[1].title, "Track 2 (fra)");

        let session = manager.session(&id).await.unwrap();
        assert_eq!(session.duration().await, 5400.0);
    }

    #[tokio::test]
    async fn test_probe_failure_is_non_fatal() {
        let (manager, _client, _torrent) =
            manager_with(movie_spec(vec![("movie.mkv", 4096)]), SimulationProber::failing());

        let id = manager.start_stream(start_request()).await.unwrap().session_id;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let status = manager.status(&id).await.unwrap();
        assert_eq!(status.duration, 0.0);
        assert!(status.audio_tracks.is_empty());
    }

    #[tokio::test]
    async fn test_probe_uses_probing_read_ahead() {
        let (manager, _client, torrent) =
            manager_with(movie_spec(vec![("movie.mkv", 4096)]), SimulationProber::failing());

        manager.start_stream(start_request()).await.unwrap();
        // The probe reader is the last one opened during start.
        assert_eq!(torrent.last_read_ahead(), PROBE_READ_AHEAD);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let (manager, client, torrent) =
            manager_with(movie_spec(vec![("movie.mp4", 4096)]), SimulationProber::failing());

        manager.start_stream(start_request()).await.unwrap();
        manager.shutdown().await;

        assert_eq!(manager.session_count().await, 0);
        assert!(torrent.is_removed());
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_list_files_creates_no_session() {
        let (manager, client, _torrent) = manager_with(
            movie_spec(vec![("movie.mkv", 8192), ("subs.srt", 128)]),
            SimulationProber::failing(),
        );

        let files = manager.list_files(MAGNET).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "movie.mkv");
        assert_eq!(files[0].size, 8192);
        assert_eq!(manager.session_count().await, 0);
        assert_eq!(client.added_count(), 0);
    }

    #[test]
    fn test_select_video_file_auto() {
        let files = vec![
            TorrentFileInfo {
                index: 0,
                path: "a.nfo".to_string(),
                size: 999_999,
            },
            TorrentFileInfo {
                index: 1,
                path: "b.avi".to_string(),
                size: 100,
            },
            TorrentFileInfo {
                index: 2,
                path: "c.webm".to_string(),
                size: 200,
            },
        ];
        let picked = select_video_file(&files, None).unwrap();
        assert_eq!(picked.index, 2);

        assert!(select_video_file(&files[..1], None).is_none());
    }
}
