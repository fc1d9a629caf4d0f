//! JSON error responses.
//!
//! Errors that occur before the first body byte become JSON documents
//! with the status mapping: bad magnet 400, unknown session 404,
//! everything else 500. Mid-stream failures never reach this type; the
//! connection just closes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use slipstream_core::session::SessionError;
use slipstream_core::streaming::StreamingError;
use slipstream_core::torrent::TorrentError;

/// An error document returned to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: Option<String>,
}

impl ApiError {
    /// 404 with the standard not-found body.
    pub fn not_found(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "session not found",
            details: Some(details.into()),
        }
    }

    /// 400 for malformed client input.
    pub fn bad_request(error: &'static str, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            details: Some(details.into()),
        }
    }

    /// 500 for failures the client cannot fix.
    pub fn internal(error: &'static str, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
            details: Some(details.into()),
        }
    }

    /// Status code this error maps to.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match &e {
            SessionError::NotFound { .. } => Self::not_found(e.to_string()),
            SessionError::Torrent(TorrentError::BadMagnet { .. }) => {
                Self::bad_request("invalid magnet URI", e.to_string())
            }
            SessionError::NoVideoInTorrent | SessionError::Torrent(_) => {
                Self::internal("failed to start stream", e.to_string())
            }
        }
    }
}

impl From<StreamingError> for ApiError {
    fn from(e: StreamingError) -> Self {
        Self::internal("transcoding failed to start", e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({"error": self.error, "details": details}),
            None => json!({"error": self.error}),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_mapping() {
        let e: ApiError = SessionError::NotFound {
            id: "nope".to_string(),
        }
        .into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e: ApiError = SessionError::Torrent(TorrentError::BadMagnet {
            reason: "not a magnet".to_string(),
        })
        .into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ApiError = SessionError::NoVideoInTorrent.into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let e: ApiError = SessionError::Torrent(TorrentError::MetadataTimeout {
            timeout: std::time::Duration::from_secs(60),
        })
        .into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
