//! Offline provider with canned results for development and demos.

use async_trait::async_trait;

use super::TorrentSearchProvider;
use crate::errors::SearchError;
use crate::types::{MovieQuery, TorrentSearchResult, TvQuery};

/// Provider serving deterministic results without network access.
///
/// Lets the UI and the search endpoints be exercised end to end when no
/// real indexer is configured. Returned magnets are syntactically valid
/// but point at nothing.
#[derive(Debug, Default)]
pub struct DevelopmentProvider;

impl DevelopmentProvider {
    /// Creates the development provider.
    pub fn new() -> Self {
        Self
    }

    fn result(&self, title: &str, quality: &str, size_bytes: u64, seeds: u32) -> TorrentSearchResult {
        let hash: u32 = title
            .bytes()
            .chain(quality.bytes())
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        TorrentSearchResult {
            provider: self.name().to_string(),
            title: format!("{title} [{quality}]"),
            magnet_uri: format!("magnet:?xt=urn:btih:{hash:040x}"),
            quality: quality.to_string(),
            size_bytes,
            size_human: format!("{:.1} GiB", size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)),
            seeds,
            peers: seeds / 2,
        }
    }
}

#[async_trait]
impl TorrentSearchProvider for DevelopmentProvider {
    fn name(&self) -> &'static str {
        "development"
    }

    async fn search_movies(
        &self,
        query: &MovieQuery,
    ) -> Result<Vec<TorrentSearchResult>, SearchError> {
        Ok(vec![
            self.result(&query.title, "2160p", 12 * 1024 * 1024 * 1024, 42),
            self.result(&query.title, "1080p", 4 * 1024 * 1024 * 1024, 187),
            self.result(&query.title, "720p", 1536 * 1024 * 1024, 95),
        ])
    }

    fn supports_tv(&self) -> bool {
        true
    }

    async fn search_tv(&self, query: &TvQuery) -> Result<Vec<TorrentSearchResult>, SearchError> {
        let title = if query.season > 0 {
            format!("{} S{:02}", query.title, query.season)
        } else {
            query.title.clone()
        };
        Ok(vec![
            self.result(&title, "1080p", 18 * 1024 * 1024 * 1024, 64),
            self.result(&title, "720p", 6 * 1024 * 1024 * 1024, 31),
        ])
    }
}
