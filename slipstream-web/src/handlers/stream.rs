//! Streaming session endpoints.
//!
//! One GET turns into either the direct path (range-capable, fresh
//! reader per request) or the remux path (chunked fragmented MP4 from a
//! supervised ffmpeg process). Errors after the first body byte close
//! the connection; a fresh GET against the same session id succeeds
//! independently.

use std::io::SeekFrom;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{Value, json};
use slipstream_core::session::{Session, StartStream, StreamSession, StreamStatus};
use slipstream_core::streaming::remux::seek_byte_offset;
use slipstream_core::torrent::ReaderOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use super::range::{self, ByteRange};
use crate::error::ApiError;
use crate::server::AppState;

/// Body of `POST /stream/start`.
#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    /// TMDB id the client associates with this playback.
    pub tmdb_id: i64,
    /// Display title.
    pub title: String,
    /// Magnet URI to stream.
    pub magnet_uri: String,
    /// Explicit file index; -1 selects the largest video file.
    #[serde(default = "default_file_index")]
    pub file_index: i64,
}

fn default_file_index() -> i64 {
    -1
}

/// Query parameters of `GET /stream/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Seek target in seconds (remux path only).
    pub t: Option<f64>,
    /// Zero-based audio stream index (remux path only).
    pub audio: Option<usize>,
}

/// Starts a streaming session for a magnet URI.
pub async fn start_stream(
    State(state): State<AppState>,
    Json(request): Json<StartStreamRequest>,
) -> Result<Json<StreamSession>, ApiError> {
    let session = state
        .sessions
        .start_stream(StartStream {
            tmdb_id: request.tmdb_id,
            title: request.title,
            magnet_uri: request.magnet_uri,
            file_index: usize::try_from(request.file_index).ok(),
        })
        .await?;
    Ok(Json(session))
}

/// Serves the video bytes of a session.
pub async fn serve_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id = parse_session_id(&id)?;
    let session = state.sessions.session(&id).await?;

    if session.needs_transcode() {
        serve_remuxed(&state, &session, &params).await
    } else {
        serve_direct(&session, &headers).await
    }
}

/// Direct path: the file is browser-native, serve it as a seekable
/// resource with standard range semantics.
async fn serve_direct(session: &Arc<Session>, headers: &HeaderMap) -> Result<Response, ApiError> {
    let file_size = session.file_size();

    let requested = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| range::parse_range_header(value, file_size));

    let range = match requested {
        Some(requested) => match range::validate_bounds(requested, file_size) {
            Ok(range) => Some(range),
            Err(_) => {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
                    .body(Body::empty())
                    .map_err(|e| ApiError::internal("failed to build response", e.to_string()));
            }
        },
        None => None,
    };

    // Fresh reader per request: concurrent ranges must not share a seek
    // position.
    let mut reader = session
        .open_reader(ReaderOptions::streaming())
        .map_err(|e| ApiError::internal("failed to open stream", e.to_string()))?;

    let (status, span) = match range {
        Some(range) => (StatusCode::PARTIAL_CONTENT, range),
        None => (
            StatusCode::OK,
            ByteRange {
                start: 0,
                end: file_size.saturating_sub(1),
            },
        ),
    };
    let content_length = if file_size == 0 { 0 } else { span.length() };

    if span.start > 0 {
        reader
            .seek(SeekFrom::Start(span.start))
            .await
            .map_err(|e| ApiError::internal("seek failed", e.to_string()))?;
    }

    let body = Body::from_stream(ReaderStream::new(reader.take(content_length)));

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, session.content_type())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length);

    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{file_size}", span.start, span.end),
        );
    }

    response
        .body(body)
        .map_err(|e| ApiError::internal("failed to build response", e.to_string()))
}

/// Remux path: pipe the container through the remuxer and stream
/// fragmented MP4 with no length and no range support; seeking is the
/// `t` parameter's job.
async fn serve_remuxed(
    state: &AppState,
    session: &Arc<Session>,
    params: &StreamQuery,
) -> Result<Response, ApiError> {
    let duration = session.duration().await;
    let t = params.t.unwrap_or(0.0);

    // Without a probed duration the time/byte ratio is unknown and a
    // blind byte seek would produce garbage, so the request is ignored.
    let seek = (t > 0.0 && duration > 0.0).then_some(t);

    let mut reader = session
        .open_reader(ReaderOptions::streaming())
        .map_err(|e| ApiError::internal("failed to open stream", e.to_string()))?;

    if let Some(t) = seek {
        let offset = seek_byte_offset(t, duration, session.file_size());
        if offset > 0 {
            reader
                .seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| ApiError::internal("seek failed", e.to_string()))?;
        }
        debug!(session_id = %session.id(), t, offset, "remux seek");
    }

    let stream = state.remuxer.spawn(reader, seek, params.audio)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal("failed to build response", e.to_string()))
}

/// Returns the download status of a session.
pub async fn stream_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.sessions.status(&id).await?))
}

/// Stops a session and releases its torrent.
pub async fn stop_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_session_id(&id)?;
    state.sessions.stop_session(&id).await?;
    Ok(Json(json!({"message": "stream stopped"})))
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(format!("session not found: {raw}")))
}
