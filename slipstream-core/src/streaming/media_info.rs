//! Container identification and the direct-vs-remux decision.
//!
//! The decision is made once, from the file extension, at session
//! creation time: MP4 and WebM go straight to the browser, everything
//! else is remuxed to fragmented MP4.

use std::path::Path;

/// Container format of a video file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// MPEG-4 Part 14 container (.mp4, .m4v)
    Mp4,
    /// WebM container (.webm)
    WebM,
    /// Matroska Video container (.mkv)
    Mkv,
    /// Audio Video Interleave container (.avi)
    Avi,
    /// QuickTime movie container (.mov)
    Mov,
    /// Windows Media Video container (.wmv)
    Wmv,
    /// Flash Video container (.flv)
    Flv,
    /// Extension is not a recognized video container
    Unknown,
}

impl ContainerFormat {
    /// Identifies the container from a file path's extension,
    /// case-insensitively.
    pub fn from_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("mp4") | Some("m4v") => ContainerFormat::Mp4,
            Some("webm") => ContainerFormat::WebM,
            Some("mkv") => ContainerFormat::Mkv,
            Some("avi") => ContainerFormat::Avi,
            Some("mov") => ContainerFormat::Mov,
            Some("wmv") => ContainerFormat::Wmv,
            Some("flv") => ContainerFormat::Flv,
            _ => ContainerFormat::Unknown,
        }
    }

    /// Whether the path carries a recognized video extension.
    pub fn is_video(path: &str) -> bool {
        ContainerFormat::from_path(path) != ContainerFormat::Unknown
    }

    /// Whether browsers can play the container without remuxing.
    pub fn is_browser_compatible(self) -> bool {
        matches!(self, ContainerFormat::Mp4 | ContainerFormat::WebM)
    }

    /// Whether delivery must go through the remux path.
    pub fn needs_remux(self) -> bool {
        !self.is_browser_compatible()
    }

    /// MIME type served on the direct path.
    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "video/mp4",
            ContainerFormat::WebM => "video/webm",
            ContainerFormat::Mkv => "video/x-matroska",
            ContainerFormat::Avi => "video/x-msvideo",
            ContainerFormat::Mov | ContainerFormat::Wmv | ContainerFormat::Flv => {
                "application/octet-stream"
            }
            ContainerFormat::Unknown => "application/octet-stream",
        }
    }
}

/// Formats a byte count for listings, e.g. `1.4 GiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ContainerFormat::from_path("movie.mp4"), ContainerFormat::Mp4);
        assert_eq!(ContainerFormat::from_path("clip.M4V"), ContainerFormat::Mp4);
        assert_eq!(
            ContainerFormat::from_path("video.webm"),
            ContainerFormat::WebM
        );
        assert_eq!(
            ContainerFormat::from_path("Season 1/film.MKV"),
            ContainerFormat::Mkv
        );
        assert_eq!(ContainerFormat::from_path("old.avi"), ContainerFormat::Avi);
        assert_eq!(
            ContainerFormat::from_path("notes.txt"),
            ContainerFormat::Unknown
        );
        assert_eq!(
            ContainerFormat::from_path("no_extension"),
            ContainerFormat::Unknown
        );
    }

    #[test]
    fn test_remux_decision() {
        assert!(!ContainerFormat::from_path("a.mp4").needs_remux());
        assert!(!ContainerFormat::from_path("a.webm").needs_remux());
        assert!(ContainerFormat::from_path("a.mkv").needs_remux());
        assert!(ContainerFormat::from_path("a.avi").needs_remux());
        assert!(ContainerFormat::from_path("a.mov").needs_remux());
        assert!(ContainerFormat::from_path("a.wmv").needs_remux());
        assert!(ContainerFormat::from_path("a.flv").needs_remux());
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(ContainerFormat::from_path("a.mp4").mime_type(), "video/mp4");
        assert_eq!(ContainerFormat::from_path("a.m4v").mime_type(), "video/mp4");
        assert_eq!(
            ContainerFormat::from_path("a.webm").mime_type(),
            "video/webm"
        );
        assert_eq!(
            ContainerFormat::from_path("a.mkv").mime_type(),
            "video/x-matroska"
        );
        assert_eq!(
            ContainerFormat::from_path("a.avi").mime_type(),
            "video/x-msvideo"
        );
        assert_eq!(
            ContainerFormat::from_path("a.mov").mime_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_video_extension_set() {
        for path in [
            "a.mp4", "a.mkv", "a.avi", "a.webm", "a.mov", "a.wmv", "a.flv", "a.m4v",
        ] {
            assert!(ContainerFormat::is_video(path), "{path} should be video");
        }
        assert!(!ContainerFormat::is_video("a.srt"));
        assert!(!ContainerFormat::is_video("a.nfo"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(1_048_576), "1.0 MiB");
        assert_eq!(human_size(1_572_864_000), "1.5 GiB");
    }
}
