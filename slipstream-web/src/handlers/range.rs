//! HTTP Range handling for direct video delivery.
//!
//! Single-range `bytes=` requests only, which is what video players
//! send. A malformed header is ignored (the full file is served with
//! 200); a range past the end of the file is unsatisfiable.

/// An inclusive byte range within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte position.
    pub start: u64,
    /// Last byte position, inclusive.
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes the range covers.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parses a `bytes=start-end` header against the resource size.
///
/// Supports open-ended (`bytes=500-`) and suffix (`bytes=-500`) forms.
/// Returns `None` for anything malformed, which callers treat as "no
/// Range header".
pub fn parse_range_header(value: &str, total_size: u64) -> Option<ByteRange> {
    let spec = value.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;

    if start_str.is_empty() {
        // Suffix form: last N bytes.
        let suffix: u64 = end_str.parse().ok()?;
        if suffix == 0 || total_size == 0 {
            return None;
        }
        let start = total_size.saturating_sub(suffix);
        return Some(ByteRange {
            start,
            end: total_size - 1,
        });
    }

    let start: u64 = start_str.parse().ok()?;
    let end: u64 = if end_str.is_empty() {
        total_size.saturating_sub(1)
    } else {
        end_str.parse().ok()?
    };

    if end < start {
        return None;
    }

    Some(ByteRange { start, end })
}

/// Clamps a parsed range to the resource, rejecting ranges that start
/// past the last byte.
pub fn validate_bounds(range: ByteRange, total_size: u64) -> Result<ByteRange, Unsatisfiable> {
    if total_size == 0 || range.start >= total_size {
        return Err(Unsatisfiable);
    }
    Ok(ByteRange {
        start: range.start,
        end: range.end.min(total_size - 1),
    })
}

/// Marker for a range no byte of which exists in the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsatisfiable;
