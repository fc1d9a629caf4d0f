//! Wire types for torrent search.

use serde::{Deserialize, Serialize};

/// One torrent found by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSearchResult {
    /// Name of the provider that returned this result.
    pub provider: String,
    /// Release title.
    pub title: String,
    /// Magnet URI to stream from.
    pub magnet_uri: String,
    /// Quality label, e.g. `1080p`.
    pub quality: String,
    /// Payload size in bytes, 0 when unknown.
    pub size_bytes: u64,
    /// Human-readable payload size.
    pub size_human: String,
    /// Seeder count reported by the provider.
    pub seeds: u32,
    /// Leecher count reported by the provider.
    pub peers: u32,
}

/// A movie search request.
#[derive(Debug, Clone, Default)]
pub struct MovieQuery {
    /// Title to search for.
    pub title: String,
    /// IMDb id, when the caller knows it.
    pub imdb_id: Option<String>,
    /// Release year, when the caller knows it.
    pub year: Option<String>,
}

/// A TV season search request.
#[derive(Debug, Clone, Default)]
pub struct TvQuery {
    /// Show title to search for.
    pub title: String,
    /// Season number; 0 means any.
    pub season: u32,
    /// First-air year, when the caller knows it.
    pub year: Option<String>,
}
