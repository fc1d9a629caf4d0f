//! Media probing over partially-downloaded files.
//!
//! Runs once per session, shortly after creation: a throwaway reader
//! feeds the head of the file to ffprobe, which reports container
//! duration and the audio stream layout as JSON. The analyze and probe
//! windows are held small so a partial download is enough.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use super::{StreamingError, StreamingResult};
use crate::config::MediaConfig;
use crate::torrent::FileReader;

/// One audio stream of a probed file, as shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Zero-based index among the file's audio streams.
    pub index: usize,
    /// ISO language code, empty when the container carries none.
    pub language: String,
    /// Displayable title.
    pub title: String,
}

/// Result of probing a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    /// Container duration in seconds; 0 means unknown.
    pub duration: f64,
    /// Audio streams in container order.
    pub audio_tracks: Vec<AudioTrack>,
}

/// Extracts duration and audio-track layout from a media stream.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probes the stream supplied by `reader`.
    ///
    /// # Errors
    ///
    /// - `StreamingError::ProberStartFailed` - Executable missing
    /// - `StreamingError::ProbeTimeout` - No report within the budget
    /// - `StreamingError::ProbeFailed` - Non-zero exit or unparsable
    ///   report
    async fn probe(&self, reader: Box<dyn FileReader>) -> StreamingResult<MediaProbe>;
}

/// Production prober invoking ffprobe over standard input.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    /// Creates a prober using the configured ffprobe executable.
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffprobe_path: config.ffprobe_path.clone(),
            timeout: config.probe_timeout,
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, reader: Box<dyn FileReader>) -> StreamingResult<MediaProbe> {
        let mut child = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "a",
                "-analyzeduration",
                "5000000",
                "-probesize",
                "10000000",
                "-i",
                "pipe:0",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StreamingError::ProberStartFailed {
                command: self.ffprobe_path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().expect("prober stdin is piped");
        let feed_task = tokio::spawn(async move {
            let mut reader = reader;
            let mut stdin = stdin;
            // The prober exits once it has seen enough; the resulting
            // broken pipe ends the copy.
            if let Err(e) = tokio::io::copy(&mut reader, &mut stdin).await {
                debug!(error = %e, "prober input ended");
            }
        });

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        feed_task.abort();

        let output = match result {
            Err(_) => {
                return Err(StreamingError::ProbeTimeout {
                    timeout: self.timeout,
                });
            }
            Ok(output) => output.map_err(StreamingError::Io)?,
        };

        if !output.status.success() {
            return Err(StreamingError::ProbeFailed {
                reason: format!("prober exited with {}", output.status),
            });
        }

        parse_probe_report(&output.stdout)
    }
}

/// Prober returning a canned report, for tests and offline development.
#[derive(Debug, Clone, Default)]
pub struct SimulationProber {
    report: Option<MediaProbe>,
}

impl SimulationProber {
    /// Prober that always fails, like a missing binary would.
    pub fn failing() -> Self {
        Self { report: None }
    }

    /// Prober that reports the given probe result.
    pub fn with_report(report: MediaProbe) -> Self {
        Self {
            report: Some(report),
        }
    }
}

#[async_trait]
impl MediaProber for SimulationProber {
    async fn probe(&self, _reader: Box<dyn FileReader>) -> StreamingResult<MediaProbe> {
        self.report
            .clone()
            .ok_or_else(|| StreamingError::ProbeFailed {
                reason: "no report configured".to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    language: Option<String>,
    title: Option<String>,
}

/// Parses the prober's JSON report.
///
/// An absent or unparsable duration leaves the 0 sentinel in place;
/// audio tracks get a display title, preferring the container's own
/// title tag and falling back to `Track <n+1> (<language|und>)`.
///
/// # Errors
///
/// - `StreamingError::ProbeFailed` - Report is not valid JSON
pub fn parse_probe_report(raw: &[u8]) -> StreamingResult<MediaProbe> {
    let report: ProbeReport =
        serde_json::from_slice(raw).map_err(|e| StreamingError::ProbeFailed {
            reason: format!("unparsable report: {e}"),
        })?;

    let duration = report
        .format
        .duration
        .as_deref()
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .unwrap_or(0.0);

    let audio_tracks = report
        .streams
        .iter()
        .enumerate()
        .map(|(index, stream)| {
            let language = stream.tags.language.clone().unwrap_or_default();
            let title = match stream.tags.title.as_deref() {
                Some(title) if !title.is_empty() => title.to_string(),
                _ => {
                    let lang = if language.is_empty() { "und" } else { &language };
                    format!("Track {} ({lang})", index + 1)
                }
            };
            AudioTrack {
                index,
                language,
                title,
            }
        })
        .collect();

    Ok(MediaProbe {
        duration,
        audio_tracks,
    })
}
