//! Error types for torrent search.

use thiserror::Error;

/// Errors surfaced by search providers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The provider's backend failed or returned garbage.
    #[error("provider {provider} failed: {reason}")]
    ProviderFailed {
        /// Which provider failed.
        provider: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// TV search requested from a provider without that capability.
    #[error("provider {provider} does not support tv search")]
    TvNotSupported {
        /// The incapable provider.
        provider: &'static str,
    },
}
