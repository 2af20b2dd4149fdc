//! Single byte-range requests (`Range: bytes=...`).
//!
//! Only one range per request is honoured. Multi-range and malformed
//! headers are ignored and the full content is served, which RFC 9110
//! allows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    /// Inclusive on both ends.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl ByteRange {
    #[must_use]
    pub fn resolve(header: Option<&str>, total: u64) -> Self {
        let Some(ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return Self::Full;
        };
        if ranges.contains(',') {
            return Self::Full;
        }
        let Some((first, last)) = ranges.trim().split_once('-') else {
            return Self::Full;
        };
        let (first, last) = (first.trim(), last.trim());

        if first.is_empty() {
            // suffix form: the last N bytes
            let Ok(suffix) = last.parse::<u64>() else {
                return Self::Full;
            };
            if suffix == 0 || total == 0 {
                return Self::Unsatisfiable;
            }
            return Self::Partial {
                start: total.saturating_sub(suffix),
                end: total - 1,
            };
        }

        let Ok(start) = first.parse::<u64>() else {
            return Self::Full;
        };
        let end = if last.is_empty() {
            None
        } else {
            match last.parse::<u64>() {
                Ok(end) if end >= start => Some(end),
                _ => return Self::Full,
            }
        };

        if start >= total {
            return Self::Unsatisfiable;
        }
        let end = end.map_or(total - 1, |end| end.min(total - 1));
        Self::Partial { start, end }
    }

    /// Number of bytes this range selects out of `total`.
    #[must_use]
    pub fn len(&self, total: u64) -> u64 {
        match *self {
            Self::Full => total,
            Self::Partial { start, end } => end - start + 1,
            Self::Unsatisfiable => 0,
        }
    }

    #[must_use]
    pub fn start(&self) -> u64 {
        match *self {
            Self::Partial { start, .. } => start,
            _ => 0,
        }
    }
}
