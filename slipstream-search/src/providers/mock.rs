//! Configurable provider for service tests.

use async_trait::async_trait;

use super::TorrentSearchProvider;
use crate::errors::SearchError;
use crate::types::{MovieQuery, TorrentSearchResult, TvQuery};

/// Test provider with canned results or a canned failure.
#[derive(Debug)]
pub struct MockProvider {
    name: &'static str,
    results: Vec<TorrentSearchResult>,
    fail: bool,
    tv: bool,
}

impl MockProvider {
    pub fn returning(name: &'static str, results: Vec<TorrentSearchResult>) -> Self {
        Self {
            name,
            results,
            fail: false,
            tv: false,
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            results: Vec::new(),
            fail: true,
            tv: false,
        }
    }

    pub fn with_tv(mut self) -> Self {
        self.tv = true;
        self
    }

    fn respond(&self) -> Result<Vec<TorrentSearchResult>, SearchError> {
        if self.fail {
            Err(SearchError::ProviderFailed {
                provider: self.name,
                reason: "mock failure".to_string(),
            })
        } else {
            Ok(self.results.clone())
        }
    }
}

/// Builds a minimal result for assertions.
pub fn result(provider: &str, title: &str, seeds: u32) -> TorrentSearchResult {
    TorrentSearchResult {
        provider: provider.to_string(),
        title: title.to_string(),
        magnet_uri: format!("magnet:?xt=urn:btih:{seeds:040x}"),
        quality: "1080p".to_string(),
        size_bytes: 0,
        size_human: "unknown".to_string(),
        seeds,
        peers: 0,
    }
}

#[async_trait]
impl TorrentSearchProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search_movies(
        &self,
        _query: &MovieQuery,
    ) -> Result<Vec<TorrentSearchResult>, SearchError> {
        self.respond()
    }

    fn supports_tv(&self) -> bool {
        self.tv
    }

    async fn search_tv(&self, _query: &TvQuery) -> Result<Vec<TorrentSearchResult>, SearchError> {
        if !self.tv {
            return Err(SearchError::TvNotSupported {
                provider: self.name,
            });
        }
        self.respond()
    }
}
