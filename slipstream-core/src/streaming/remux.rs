//! Live remuxing of non-browser containers into fragmented MP4.
//!
//! One remuxer process per request: container bytes are fed from a
//! torrent file reader into ffmpeg's standard input, fragmented MP4
//! comes out of standard output and becomes the HTTP response body.
//! Video is never re-encoded; audio is normalized to AAC. The output
//! has no global index (`frag_keyframe+empty_moov+default_base_moof`),
//! so it decodes as a continuous progressive stream.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{StreamingError, StreamingResult};
use crate::config::MediaConfig;
use crate::torrent::FileReader;

/// Backoff applied to the estimated seek position so that a keyframe
/// lies ahead of where the decoder starts.
pub const SEEK_BACKOFF_BYTES: u64 = 5 * 1024 * 1024;

/// Upper bound on captured remuxer diagnostics.
const STDERR_TAIL_LIMIT: usize = 8 * 1024;

/// Estimates the byte position for a time seek, assuming constant
/// bitrate, and backs off so the decoder finds a keyframe ahead.
/// Clamps to zero for positions within the backoff window.
pub fn seek_byte_offset(seek_seconds: f64, duration: f64, file_size: u64) -> u64 {
    let ratio = seek_seconds / duration;
    let byte_pos = (ratio * file_size as f64) as u64;
    byte_pos.saturating_sub(SEEK_BACKOFF_BYTES)
}

/// Builds the remuxer argument list, in the order the decoder expects:
/// fast-seek before the input, stream maps after it, then the codec and
/// container policy.
pub fn remux_args(
    seek_seconds: Option<f64>,
    audio_track: Option<usize>,
    audio_bitrate: &str,
) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(t) = seek_seconds {
        args.push("-ss".to_string());
        args.push(format!("{t:.3}"));
    }

    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    if let Some(track) = audio_track {
        args.push("-map".to_string());
        args.push("0:v:0".to_string());
        args.push("-map".to_string());
        args.push(format!("0:a:{track}"));
    }

    args.extend(
        [
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            audio_bitrate,
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
            "-f",
            "mp4",
            "-y",
            "pipe:1",
        ]
        .into_iter()
        .map(String::from),
    );

    args
}

/// Spawns and supervises one remuxer process per streaming request.
#[derive(Debug, Clone)]
pub struct Remuxer {
    ffmpeg_path: PathBuf,
    audio_bitrate: String,
}

impl Remuxer {
    /// Creates a remuxer using the configured ffmpeg executable.
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
        }
    }

    /// Spawns the remuxer, wiring `reader` to its standard input, and
    /// returns the fragmented-MP4 byte stream from its standard output.
    ///
    /// The caller must have positioned `reader` already; `seek_seconds`
    /// only tells the decoder to fast-seek within the supplied stream.
    ///
    /// # Errors
    ///
    /// - `StreamingError::RemuxerStartFailed` - The executable could not
    ///   be invoked (usually a missing binary)
    pub fn spawn(
        &self,
        reader: Box<dyn FileReader>,
        seek_seconds: Option<f64>,
        audio_track: Option<usize>,
    ) -> StreamingResult<RemuxStream> {
        let args = remux_args(seek_seconds, audio_track, &self.audio_bitrate);
        debug!(command = %self.ffmpeg_path.display(), ?args, "spawning remuxer");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StreamingError::RemuxerStartFailed {
                command: self.ffmpeg_path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().expect("remuxer stdin is piped");
        let stdout = child.stdout.take().expect("remuxer stdout is piped");
        let stderr = child.stderr.take().expect("remuxer stderr is piped");

        // Supply loop: ends when the reader errors out (session stopped)
        // or the remuxer closes its stdin.
        let feed_task = tokio::spawn(async move {
            let mut reader = reader;
            let mut stdin = stdin;
            if let Err(e) = tokio::io::copy(&mut reader, &mut stdin).await {
                debug!(error = %e, "remuxer input ended");
            }
        });

        let stderr_task = tokio::spawn(capture_stderr_tail(stderr));

        Ok(RemuxStream {
            stdout: ReaderStream::new(stdout),
            child: Some(child),
            feed_task: Some(feed_task),
            stderr_task: Some(stderr_task),
        })
    }
}

/// Fragmented-MP4 byte stream from a live remuxer process.
///
/// Dropping the stream (client disconnect, natural end of output, or
/// reader failure) terminates the process and reaps it exactly once.
pub struct RemuxStream {
    stdout: ReaderStream<ChildStdout>,
    child: Option<Child>,
    feed_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
}

impl std::fmt::Debug for RemuxStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemuxStream").finish_non_exhaustive()
    }
}

impl Stream for RemuxStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stdout).poll_next(cx)
    }
}

impl Drop for RemuxStream {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Some(feed) = self.feed_task.take() {
            feed.abort();
        }
        let stderr_task = self.stderr_task.take();

        // Terminate and reap off the request path; `kill_on_drop` backs
        // this up if the runtime is already tearing down.
        tokio::spawn(async move {
            let _ = child.start_kill();
            let status = child.wait().await;
            let stderr_tail = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => Vec::new(),
            };
            log_remuxer_exit(status, &stderr_tail);
        });
    }
}

/// Drains remuxer diagnostics, keeping only the last
/// [`STDERR_TAIL_LIMIT`] bytes.
async fn capture_stderr_tail(mut stderr: ChildStderr) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_LIMIT {
                    let excess = tail.len() - STDERR_TAIL_LIMIT;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}

/// Logs a remuxer exit unless it was caused by the client going away:
/// a termination signal (we sent it) or a broken output pipe.
fn log_remuxer_exit(status: io::Result<ExitStatus>, stderr_tail: &[u8]) {
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            if exited_on_signal(&status) {
                return;
            }
            let stderr = String::from_utf8_lossy(stderr_tail);
            if stderr.contains("Broken pipe") {
                return;
            }
            warn!(%status, stderr = %stderr, "remuxer exited with error");
        }
        Err(e) => warn!(error = %e, "failed to reap remuxer"),
    }
}

#[cfg(unix)]
fn exited_on_signal(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn exited_on_signal(_status: &ExitStatus) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent::Torrent;

    #[test]
    fn test_args_plain_remux() {
        let args = remux_args(None, None, "192k");
        assert_eq!(
            args,
            vec![
                "-i", "pipe:0", "-c:v", "copy", "-c:a", "aac", "-b:a", "192k", "-movflags",
                "frag_keyframe+empty_moov+default_base_moof", "-f", "mp4", "-y", "pipe:1",
            ]
        );
    }

    #[test]
    fn test_args_with_seek() {
        let args = remux_args(Some(1800.0), None, "192k");
        assert_eq!(&args[..4], &["-ss", "1800.000", "-i", "pipe:0"]);
    }

    #[test]
    fn test_args_seek_precision() {
        let args = remux_args(Some(12.3456), None, "192k");
        assert_eq!(args[1], "12.346");
    }

    #[test]
    fn test_args_with_audio_track() {
        let args = remux_args(None, Some(1), "192k");
        let maps: Vec<_> = args.iter().map(String::as_str).collect();
        assert_eq!(&maps[2..6], &["-map", "0:v:0", "-map", "0:a:1"]);
    }

    #[test]
    fn test_seek_offset_midpoint() {
        // Half of a 2 GiB file, backed off by 5 MiB.
        let offset = seek_byte_offset(1800.0, 3600.0, 2_147_483_648);
        assert_eq!(offset, 1_073_741_824 - SEEK_BACKOFF_BYTES);
    }

    #[test]
    fn test_seek_offset_clamps_small_files() {
        // Files smaller than the backoff window start at zero.
        let offset = seek_byte_offset(10.0, 100.0, 4 * 1024 * 1024);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_seek_offset_near_start_clamps() {
        let offset = seek_byte_offset(1.0, 3600.0, 2_147_483_648);
        assert_eq!(offset, 0);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        use crate::config::MediaConfig;
        use crate::torrent::ReaderOptions;
        use crate::torrent::simulation::{
            SimulationFileSpec, SimulationTorrentClient, SimulationTorrentSpec, patterned_bytes,
        };

        let client = SimulationTorrentClient::new();
        let torrent = client.register(SimulationTorrentSpec {
            magnet_uri: "magnet:?xt=urn:btih:ab".to_string(),
            info_hash: "ab".to_string(),
            files: vec![SimulationFileSpec {
                path: "movie.mkv".to_string(),
                content: patterned_bytes(1, 1024),
            }],
            active_peers: 1,
        });
        let reader = torrent.open_reader(0, ReaderOptions::streaming()).unwrap();

        let media = MediaConfig {
            ffmpeg_path: "/nonexistent/slipstream-test-ffmpeg".into(),
            ..Default::default()
        };
        let err = Remuxer::new(&media).spawn(reader, None, None).unwrap_err();
        assert!(matches!(err, StreamingError::RemuxerStartFailed { .. }));
    }
}
