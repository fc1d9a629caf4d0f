//! Torrent listing and search endpoints.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use slipstream_core::streaming::human_size;
use slipstream_search::{MovieQuery, TvQuery};

use crate::error::ApiError;
use crate::server::AppState;

/// Body of `POST /torrents/files`.
#[derive(Debug, Deserialize)]
pub struct ListFilesRequest {
    /// Magnet URI whose metadata should be resolved.
    pub magnet_uri: String,
}

/// One file in a listing response.
#[derive(Debug, Serialize)]
pub struct FileEntry {
    /// Zero-based index within the torrent.
    pub index: usize,
    /// Path relative to the torrent root.
    pub path: String,
    /// Length in bytes.
    pub size: u64,
    /// Human-readable length.
    pub size_human: String,
}

/// Lists every file in a magnet's metadata, for UI-driven episode
/// picking. Does not create a session.
pub async fn list_torrent_files(
    State(state): State<AppState>,
    Json(request): Json<ListFilesRequest>,
) -> Result<Json<Value>, ApiError> {
    let files = state.sessions.list_files(&request.magnet_uri).await?;
    let files: Vec<FileEntry> = files
        .into_iter()
        .map(|f| FileEntry {
            index: f.index,
            path: f.path,
            size: f.size,
            size_human: human_size(f.size),
        })
        .collect();
    Ok(Json(json!({"files": files})))
}

/// Query parameters of `GET /torrents/search`.
#[derive(Debug, Deserialize)]
pub struct MovieSearchParams {
    /// Title to search for.
    #[serde(default)]
    pub title: String,
    /// IMDb id hint.
    pub imdb_id: Option<String>,
    /// Release year hint.
    pub year: Option<String>,
}

/// Searches all providers for movie torrents.
pub async fn search_torrents(
    State(state): State<AppState>,
    Query(params): Query<MovieSearchParams>,
) -> Result<Json<Value>, ApiError> {
    if params.title.is_empty() {
        return Err(ApiError::bad_request(
            "query parameter 'title' is required",
            "title must not be empty",
        ));
    }
    let results = state
        .search
        .search_movies(&MovieQuery {
            title: params.title,
            imdb_id: params.imdb_id,
            year: params.year,
        })
        .await;
    Ok(Json(json!({"results": results})))
}

/// Query parameters of `GET /torrents/search/tv`.
#[derive(Debug, Deserialize)]
pub struct TvSearchParams {
    /// Show title to search for.
    #[serde(default)]
    pub title: String,
    /// Season number; 0 means any.
    #[serde(default)]
    pub season: u32,
    /// First-air year hint.
    pub year: Option<String>,
}

/// Searches TV-capable providers for season torrents.
pub async fn search_tv_torrents(
    State(state): State<AppState>,
    Query(params): Query<TvSearchParams>,
) -> Result<Json<Value>, ApiError> {
    if params.title.is_empty() {
        return Err(ApiError::bad_request(
            "query parameter 'title' is required",
            "title must not be empty",
        ));
    }
    let results = state
        .search
        .search_tv(&TvQuery {
            title: params.title,
            season: params.season,
            year: params.year,
        })
        .await;
    Ok(Json(json!({"results": results})))
}
