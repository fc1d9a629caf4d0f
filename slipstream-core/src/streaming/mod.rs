//! Streaming pipeline: container identification, live remuxing to
//! fragmented MP4, and media probing over partial downloads.

pub mod media_info;
pub mod probe;
pub mod remux;

pub use media_info::{ContainerFormat, human_size};
pub use probe::{AudioTrack, FfprobeProber, MediaProbe, MediaProber, SimulationProber};
pub use remux::{RemuxStream, Remuxer};

/// Errors that can occur in the streaming pipeline.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    /// The remuxer executable could not be invoked.
    #[error("failed to start remuxer `{command}`: {source}")]
    RemuxerStartFailed {
        /// Executable that failed to spawn.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The prober executable could not be invoked.
    #[error("failed to start prober `{command}`: {source}")]
    ProberStartFailed {
        /// Executable that failed to spawn.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The prober produced no usable report within its time budget.
    #[error("media probe timed out after {timeout:?}")]
    ProbeTimeout {
        /// The elapsed budget.
        timeout: std::time::Duration,
    },

    /// The prober exited non-zero or its report could not be parsed.
    #[error("media probe failed: {reason}")]
    ProbeFailed {
        /// What went wrong.
        reason: String,
    },

    /// I/O failure while talking to an external process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;
