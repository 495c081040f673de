//! HTTP Range request parsing module
//!
//! Single `bytes=<start>-<end>` ranges as used by video players for seeking.
//! Parsing is lenient: a header that does not match is read as `bytes=0-`,
//! so players always get a partial response starting at the beginning.

use regex::Regex;
use std::sync::LazyLock;

static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bytes=([0-9]+)-([0-9]*)").expect("range pattern compiles"));

/// Requested range as sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeRequest {
    /// First byte, inclusive
    pub start: u64,
    /// Last byte, inclusive; `None` means until end of file
    pub end: Option<u64>,
}

impl RangeRequest {
    /// Parse a `Range` header value.
    ///
    /// Offsets too large for `u64` saturate.
    pub fn parse(header: &str) -> Self {
        let Some(caps) = RANGE_PATTERN.captures(header) else {
            return Self::default();
        };

        let start = caps
            .get(1)
            .map_or(0, |m| m.as_str().parse().unwrap_or(u64::MAX));
        let end = caps
            .get(2)
            .filter(|m| !m.as_str().is_empty())
            .map(|m| m.as_str().parse().unwrap_or(u64::MAX));

        Self { start, end }
    }

    /// Bound the request to a file of `file_size` bytes.
    ///
    /// A missing or oversized `end` is clamped to the last byte. Returns `None`
    /// when nothing of the file can be served.
    pub fn resolve(&self, file_size: u64) -> Option<ByteRange> {
        if self.start >= file_size {
            return None;
        }
        let last = file_size - 1;
        let end = self.end.map_or(last, |e| e.min(last));
        if self.start > end {
            return None;
        }
        Some(ByteRange {
            start: self.start,
            end,
        })
    }
}

/// Satisfiable byte range `[start, end]` within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    #[inline]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// Serve this slice with 206
    Valid(ByteRange),
    /// Start beyond the file or after the end - should return 416
    NotSatisfiable,
    /// No Range header, serve the full file with 200
    None,
}

/// Parse an optional HTTP Range header against a file size
///
/// # Examples
/// ```
/// use vidmon::http::range::{parse_range_header, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=200-299"), 1000);
/// assert!(matches!(result, RangeParseResult::Valid(_)));
///
/// let result = parse_range_header(None, 1000);
/// assert!(matches!(result, RangeParseResult::None));
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> RangeParseResult {
    // An empty header counts as no header
    let Some(header) = range_header.filter(|h| !h.trim().is_empty()) else {
        return RangeParseResult::None;
    };

    match RangeRequest::parse(header).resolve(file_size) {
        Some(range) => RangeParseResult::Valid(range),
        None => RangeParseResult::NotSatisfiable,
    }
}
