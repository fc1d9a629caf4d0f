//! Provider implementations for torrent search.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::{MovieQuery, TorrentSearchResult, TvQuery};

pub mod development;
#[cfg(test)]
pub mod mock;

pub use development::DevelopmentProvider;

/// A torrent search backend.
///
/// Every provider can search movies; TV search is a capability a
/// provider opts into. The service skips providers that lack a
/// requested capability.
#[async_trait]
pub trait TorrentSearchProvider: Send + Sync + std::fmt::Debug {
    /// Stable provider name, used in results and logs.
    fn name(&self) -> &'static str;

    /// Searches for movie torrents.
    ///
    /// # Errors
    ///
    /// - `SearchError::ProviderFailed` - Backend error
    async fn search_movies(
        &self,
        query: &MovieQuery,
    ) -> Result<Vec<TorrentSearchResult>, SearchError>;

    /// Whether this provider can search TV seasons.
    fn supports_tv(&self) -> bool {
        false
    }

    /// Searches for TV season torrents.
    ///
    /// # Errors
    ///
    /// - `SearchError::TvNotSupported` - Provider lacks the capability
    /// - `SearchError::ProviderFailed` - Backend error
    async fn search_tv(&self, _query: &TvQuery) -> Result<Vec<TorrentSearchResult>, SearchError> {
        Err(SearchError::TvNotSupported {
            provider: self.name(),
        })
    }
}
