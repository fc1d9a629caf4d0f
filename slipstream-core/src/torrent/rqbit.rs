//! librqbit-backed production torrent client.
//!
//! One engine session holds every torrent; payload files land in the
//! configured torrent directory, addressed by the engine per infohash.
//! Seeding is not sustained: torrents are removed when their session
//! stops, and payload files are left behind as cache.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use librqbit::api::TorrentIdOrHash;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions,
};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tracing::{debug, warn};

use super::{
    FileReader, ReaderOptions, SwarmStats, Torrent, TorrentClient, TorrentError, TorrentFileInfo,
};
use crate::config::{StorageConfig, TorrentConfig};

/// Production [`TorrentClient`] over a librqbit session.
pub struct RqbitClient {
    session: Arc<Session>,
    metadata_timeout: Duration,
}

impl RqbitClient {
    /// Starts the engine: binds listener sockets, enables DHT and
    /// tracker announces, and roots payload storage in the torrent
    /// directory.
    ///
    /// # Errors
    ///
    /// - `TorrentError::NetworkUnreachable` - Listener sockets could not
    ///   be bound or the data directory is unusable
    pub async fn new(
        torrent_config: &TorrentConfig,
        storage_config: &StorageConfig,
    ) -> Result<Self, TorrentError> {
        let torrent_dir = storage_config.torrent_dir();
        tokio::fs::create_dir_all(&torrent_dir)
            .await
            .map_err(|e| TorrentError::NetworkUnreachable {
                reason: format!("create {}: {e}", torrent_dir.display()),
            })?;

        let options = SessionOptions {
            disable_dht: false,
            disable_dht_persistence: true,
            persistence: None,
            listen_port_range: Some(
                torrent_config.listen_port..torrent_config.listen_port.saturating_add(1),
            ),
            enable_upnp_port_forwarding: true,
            ..Default::default()
        };

        let session = Session::new_with_opts(torrent_dir, options)
            .await
            .map_err(|e| TorrentError::NetworkUnreachable {
                reason: e.to_string(),
            })?;

        Ok(Self {
            session,
            metadata_timeout: torrent_config.metadata_timeout,
        })
    }

    fn check_magnet(uri: &str) -> Result<(), TorrentError> {
        if uri.trim_start().starts_with("magnet:") {
            Ok(())
        } else {
            Err(TorrentError::BadMagnet {
                reason: "URI does not start with magnet:".to_string(),
            })
        }
    }
}

#[async_trait]
impl TorrentClient for RqbitClient {
    async fn add_magnet(&self, uri: &str) -> Result<Arc<dyn Torrent>, TorrentError> {
        Self::check_magnet(uri)?;

        let response = self
            .session
            .add_torrent(
                AddTorrent::from_url(uri),
                Some(AddTorrentOptions {
                    overwrite: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| TorrentError::BadMagnet {
                reason: e.to_string(),
            })?;

        let handle = response
            .into_handle()
            .ok_or_else(|| TorrentError::Engine {
                reason: "torrent add returned no handle".to_string(),
            })?;
        let id = handle.id();

        // Block until the swarm delivers the info dictionary, bounded.
        match tokio::time::timeout(self.metadata_timeout, handle.wait_until_initialized()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = self.session.delete(TorrentIdOrHash::Id(id), false).await;
                return Err(TorrentError::Engine {
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let _ = self.session.delete(TorrentIdOrHash::Id(id), false).await;
                return Err(TorrentError::MetadataTimeout {
                    timeout: self.metadata_timeout,
                });
            }
        }

        debug!(info_hash = %handle.info_hash().as_string(), "torrent metadata resolved");

        Ok(Arc::new(RqbitTorrent {
            session: Arc::clone(&self.session),
            handle,
            id,
        }))
    }

    async fn list_files(&self, uri: &str) -> Result<Vec<TorrentFileInfo>, TorrentError> {
        Self::check_magnet(uri)?;

        // list_only resolves metadata without registering the torrent, so
        // a listing can never drop a torrent a live session owns.
        let response = tokio::time::timeout(
            self.metadata_timeout,
            self.session.add_torrent(
                AddTorrent::from_url(uri),
                Some(AddTorrentOptions {
                    list_only: true,
                    ..Default::default()
                }),
            ),
        )
        .await
        .map_err(|_| TorrentError::MetadataTimeout {
            timeout: self.metadata_timeout,
        })?
        .map_err(|e| TorrentError::BadMagnet {
            reason: e.to_string(),
        })?;

        match response {
            AddTorrentResponse::ListOnly(listing) => {
                let details =
                    listing
                        .info
                        .iter_file_details()
                        .map_err(|e| TorrentError::Engine {
                            reason: e.to_string(),
                        })?;
                Ok(details
                    .enumerate()
                    .map(|(index, file)| TorrentFileInfo {
                        index,
                        path: file
                            .filename
                            .to_string()
                            .unwrap_or_else(|_| format!("file-{index}")),
                        size: file.len,
                    })
                    .collect())
            }
            AddTorrentResponse::AlreadyManaged(_, handle)
            | AddTorrentResponse::Added(_, handle) => Ok(file_infos(&handle)),
        }
    }

    async fn close(&self) {
        self.session.stop().await;
    }
}

/// One live torrent owned by the librqbit session.
struct RqbitTorrent {
    session: Arc<Session>,
    handle: Arc<ManagedTorrent>,
    id: usize,
}

#[async_trait]
impl Torrent for RqbitTorrent {
    fn info_hash(&self) -> String {
        self.handle.info_hash().as_string()
    }

    fn files(&self) -> Vec<TorrentFileInfo> {
        file_infos(&self.handle)
    }

    fn stats(&self) -> SwarmStats {
        let stats = self.handle.stats();
        SwarmStats {
            active_peers: stats
                .live
                .as_ref()
                .map(|live| live.snapshot.peer_stats.live as u32)
                .unwrap_or(0),
        }
    }

    fn bytes_completed(&self, file_index: usize) -> u64 {
        self.handle
            .stats()
            .file_progress
            .get(file_index)
            .copied()
            .unwrap_or(0)
    }

    fn open_reader(
        &self,
        file_index: usize,
        options: ReaderOptions,
    ) -> Result<Box<dyn FileReader>, TorrentError> {
        debug!(
            file_index,
            read_ahead = options.read_ahead,
            responsive = options.responsive,
            "opening file stream"
        );
        let stream = self
            .handle
            .clone()
            .stream(file_index)
            .map_err(|e| TorrentError::Engine {
                reason: e.to_string(),
            })?;
        Ok(Box::new(RqbitFileReader {
            inner: Box::pin(stream),
            read_ahead: options.read_ahead,
        }))
    }

    async fn remove(&self) {
        if let Err(e) = self.session.delete(TorrentIdOrHash::Id(self.id), false).await {
            warn!(info_hash = %self.info_hash(), error = %e, "failed to remove torrent");
        }
    }
}

/// Reader over one file, backed by a librqbit file stream.
///
/// The engine prioritizes pieces at the stream offset itself; the
/// read-ahead window is recorded as the reader's declared interest.
/// librqbit's file stream type (`FileStream`) is not re-exported from the
/// crate root, so it cannot be named here; it is stored behind this object
/// trait instead, constructed directly from `ManagedTorrent::stream`.
trait SeekableRead: AsyncRead + AsyncSeek + Send {}
impl<T: AsyncRead + AsyncSeek + Send> SeekableRead for T {}

struct RqbitFileReader {
    inner: Pin<Box<dyn SeekableRead>>,
    #[allow(dead_code)]
    read_ahead: u64,
}

impl FileReader for RqbitFileReader {
    fn set_read_ahead(&mut self, bytes: u64) {
        self.read_ahead = bytes;
    }
}

impl AsyncRead for RqbitFileReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncSeek for RqbitFileReader {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        self.inner.as_mut().start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        self.inner.as_mut().poll_complete(cx)
    }
}

fn file_infos(handle: &ManagedTorrent) -> Vec<TorrentFileInfo> {
    let metadata = handle.metadata.load();
    let Some(metadata) = metadata.as_ref() else {
        return Vec::new();
    };
    let Ok(details) = metadata.info.iter_file_details() else {
        return Vec::new();
    };
    details
        .enumerate()
        .map(|(index, file)| TorrentFileInfo {
            index,
            path: file
                .filename
                .to_string()
                .unwrap_or_else(|_| format!("file-{index}")),
            size: file.len,
        })
        .collect()
}
