//! Concurrent multi-provider search dispatch.

use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use crate::providers::TorrentSearchProvider;
use crate::types::{MovieQuery, TorrentSearchResult, TvQuery};

/// Registry of search providers.
///
/// Queries fan out to every capable provider concurrently; a failing
/// provider is logged and skipped rather than failing the whole search.
/// Merged results are ordered by seeder count.
#[derive(Debug, Clone, Default)]
pub struct SearchService {
    providers: Vec<Arc<dyn TorrentSearchProvider>>,
}

impl SearchService {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider.
    pub fn register(&mut self, provider: Arc<dyn TorrentSearchProvider>) {
        self.providers.push(provider);
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Searches all providers for movie torrents.
    pub async fn search_movies(&self, query: &MovieQuery) -> Vec<TorrentSearchResult> {
        let searches = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let query = query.clone();
            async move {
                match provider.search_movies(&query).await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(provider = provider.name(), error = %e, "torrent search failed");
                        Vec::new()
                    }
                }
            }
        });

        merge(join_all(searches).await)
    }

    /// Searches providers with TV capability for season torrents.
    pub async fn search_tv(&self, query: &TvQuery) -> Vec<TorrentSearchResult> {
        let searches = self
            .providers
            .iter()
            .filter(|provider| provider.supports_tv())
            .map(|provider| {
                let provider = Arc::clone(provider);
                let query = query.clone();
                async move {
                    match provider.search_tv(&query).await {
                        Ok(results) => results,
                        Err(e) => {
                            warn!(provider = provider.name(), error = %e, "tv torrent search failed");
                            Vec::new()
                        }
                    }
                }
            });

        merge(join_all(searches).await)
    }
}

fn merge(batches: Vec<Vec<TorrentSearchResult>>) -> Vec<TorrentSearchResult> {
    let mut merged: Vec<TorrentSearchResult> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.seeds.cmp(&a.seeds));
    merged
}
