//! Torrent search for Slipstream.
//!
//! Providers are pluggable: each one exposes movie search and may
//! additionally support TV search. The [`SearchService`] dispatches a
//! query to every capable provider concurrently and merges the results.

pub mod errors;
pub mod providers;
pub mod service;
pub mod types;

pub use errors::SearchError;
pub use providers::{DevelopmentProvider, TorrentSearchProvider};
pub use service::SearchService;
pub use types::{MovieQuery, TorrentSearchResult, TvQuery};
