//! Centralized configuration for Slipstream.
//!
//! All tunable parameters live here so the rest of the codebase never
//! hard-codes ports, paths, or timeouts.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Slipstream components.
///
/// Groups related settings into logical sections and supports
/// environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SlipstreamConfig {
    /// HTTP listener settings
    pub http: HttpConfig,
    /// BitTorrent engine settings
    pub torrent: TorrentConfig,
    /// External media tool settings (ffmpeg/ffprobe)
    pub media: MediaConfig,
    /// On-disk data layout settings
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Port the JSON/streaming API listens on
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// BitTorrent engine configuration.
///
/// Controls swarm participation and the bound on how long a magnet add
/// may wait for the info dictionary.
#[derive(Debug, Clone)]
pub struct TorrentConfig {
    /// TCP/UDP listen port announced to the swarm
    pub listen_port: u16,
    /// How long to wait for peers to deliver torrent metadata
    pub metadata_timeout: Duration,
}

impl Default for TorrentConfig {
    fn default() -> Self {
        Self {
            listen_port: 6881,
            metadata_timeout: Duration::from_secs(60),
        }
    }
}

/// External media tool configuration.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Remuxer executable (container bytes in, fragmented MP4 out)
    pub ffmpeg_path: PathBuf,
    /// Prober executable (container bytes in, JSON report out)
    pub ffprobe_path: PathBuf,
    /// Bitrate for the AAC audio transcode on the remux path
    pub audio_bitrate: String,
    /// Upper bound on a single probe run against a partial download
    pub probe_timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            audio_bitrate: "192k".to_string(),
            probe_timeout: Duration::from_secs(60),
        }
    }
}

/// On-disk data layout configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root data directory; torrent payloads live underneath it
    pub data_dir: PathBuf,
    /// Advisory cap on cached torrent payloads, in GiB
    pub max_cache_gb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_cache_gb: 50,
        }
    }
}

impl StorageConfig {
    /// Directory holding torrent payloads, addressed by infohash.
    pub fn torrent_dir(&self) -> PathBuf {
        self.data_dir.join("torrents")
    }
}

impl SlipstreamConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("SLIPSTREAM_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.http.port = port;
            }
        }

        if let Ok(port) = std::env::var("SLIPSTREAM_TORRENT_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.torrent.listen_port = port;
            }
        }

        if let Ok(timeout) = std::env::var("SLIPSTREAM_METADATA_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.torrent.metadata_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(dir) = std::env::var("SLIPSTREAM_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }

        if let Ok(cache) = std::env::var("SLIPSTREAM_MAX_CACHE_GB") {
            if let Ok(gb) = cache.parse::<u64>() {
                config.storage.max_cache_gb = gb;
            }
        }

        if let Ok(path) = std::env::var("SLIPSTREAM_FFMPEG") {
            config.media.ffmpeg_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("SLIPSTREAM_FFPROBE") {
            config.media.ffprobe_path = PathBuf::from(path);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = SlipstreamConfig::default();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.torrent.listen_port, 6881);
        assert_eq!(config.torrent.metadata_timeout, Duration::from_secs(60));
        assert_eq!(config.media.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.media.audio_bitrate, "192k");
        assert_eq!(config.storage.max_cache_gb, 50);
        assert_eq!(
            config.storage.torrent_dir(),
            PathBuf::from("./data/torrents")
        );
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("SLIPSTREAM_PORT", "9090");
            std::env::set_var("SLIPSTREAM_TORRENT_PORT", "6999");
            std::env::set_var("SLIPSTREAM_METADATA_TIMEOUT", "15");
            std::env::set_var("SLIPSTREAM_DATA_DIR", "/tmp/slipstream-test");
            std::env::set_var("SLIPSTREAM_MAX_CACHE_GB", "10");
        }

        let config = SlipstreamConfig::from_env();

        assert_eq!(config.http.port, 9090);
        assert_eq!(config.torrent.listen_port, 6999);
        assert_eq!(config.torrent.metadata_timeout, Duration::from_secs(15));
        assert_eq!(
            config.storage.data_dir,
            PathBuf::from("/tmp/slipstream-test")
        );
        assert_eq!(config.storage.max_cache_gb, 10);

        // Cleanup
        unsafe {
            std::env::remove_var("SLIPSTREAM_PORT");
            std::env::remove_var("SLIPSTREAM_TORRENT_PORT");
            std::env::remove_var("SLIPSTREAM_METADATA_TIMEOUT");
            std::env::remove_var("SLIPSTREAM_DATA_DIR");
            std::env::remove_var("SLIPSTREAM_MAX_CACHE_GB");
        }
    }
}
