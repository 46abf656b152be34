use std::{error::Error, fmt::Display};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RangeError {
    /// Not a single `bytes=` range we can interpret.
    Malformed,
    /// Well formed, but starts beyond the end of the resource.
    Unsatisfiable,
}

impl Error for RangeError {}

impl Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeError::Malformed => write!(f, "malformed range header"),
            RangeError::Unsatisfiable => write!(f, "range not satisfiable"),
        }
    }
}

/// Inclusive byte range within a resource of known length.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

fn parse_position(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    s.parse::<u64>().map_err(|_| RangeError::Malformed)
}

impl ByteRange {
    /// The whole resource, `None` when it is empty.
    pub fn full(total: u64) -> Option<Self> {
        total.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Parse the value of a `Range` header against a resource of `total` bytes.
    ///
    /// Accepts `bytes=S-E`, `bytes=S-` and `bytes=-N`. An end past the last
    /// byte is clamped to it.
    pub fn parse(value: &str, total: u64) -> Result<Self, RangeError> {
        let (unit, spec) = value.trim().split_once('=').ok_or(RangeError::Malformed)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || spec.contains(',') {
            return Err(RangeError::Malformed);
        }

        let (start, end) = spec.split_once('-').ok_or(RangeError::Malformed)?;
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            // Suffix range, the last `n` bytes
            let n = parse_position(end)?;
            if n == 0 || total == 0 {
                return Err(RangeError::Unsatisfiable);
            }
            return Ok(Self {
                start: total.saturating_sub(n),
                end: total - 1,
            });
        }

        let start = parse_position(start)?;
        let end = if end.is_empty() {
            None
        } else {
            Some(parse_position(end)?)
        };

        if matches!(end, Some(end) if end < start) {
            return Err(RangeError::Malformed);
        }

        if start >= total {
            return Err(RangeError::Unsatisfiable);
        }

        let last = total - 1;
        Ok(Self {
            start,
            end: end.map_or(last, |end| end.min(last)),
        })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for a `Content-Range` header.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    macro_rules! range {
        ($start:expr, $end:expr) => {
            ByteRange {
                start: $start,
                end: $end,
            }
        };
    }

    #[test]
    fn parse_closed() {
        assert_eq!(ByteRange::parse("bytes=0-0", 10), Ok(range!(0, 0)));
        assert_eq!(ByteRange::parse("bytes=2-5", 10), Ok(range!(2, 5)));
        assert_eq!(
            ByteRange::parse("bytes=500000-599999", 1_000_000),
            Ok(range!(500_000, 599_999))
        );
    }

    #[test]
    fn parse_open_ended() {
        assert_eq!(ByteRange::parse("bytes=0-", 10), Ok(range!(0, 9)));
        assert_eq!(ByteRange::parse("bytes=9-", 10), Ok(range!(9, 9)));
    }

    #[test]
    fn parse_clamps_end() {
        assert_eq!(ByteRange::parse("bytes=5-100", 10), Ok(range!(5, 9)));
    }

    #[test]
    fn parse_suffix() {
        assert_eq!(ByteRange::parse("bytes=-3", 10), Ok(range!(7, 9)));
        assert_eq!(ByteRange::parse("bytes=-30", 10), Ok(range!(0, 9)));
        assert_eq!(
            ByteRange::parse("bytes=-0", 10),
            Err(RangeError::Unsatisfiable)
        );
    }

    #[test]
    fn parse_tolerates_whitespace_and_case() {
        assert_eq!(ByteRange::parse(" Bytes = 1 - 2 ", 10), Ok(range!(1, 2)));
    }

    #[test]
    fn parse_unsatisfiable() {
        assert_eq!(
            ByteRange::parse("bytes=10-", 10),
            Err(RangeError::Unsatisfiable)
        );
        assert_eq!(
            ByteRange::parse("bytes=10-20", 10),
            Err(RangeError::Unsatisfiable)
        );
        assert_eq!(
            ByteRange::parse("bytes=0-", 0),
            Err(RangeError::Unsatisfiable)
        );
    }

    #[test]
    fn parse_malformed() {
        for value in [
            "",
            "bytes",
            "bytes=",
            "bytes=-",
            "bytes=a-b",
            "bytes=+1-2",
            "bytes=5-2",
            "bytes=0-1,4-5",
            "items=0-1",
            "0-1",
        ] {
            assert_eq!(
                ByteRange::parse(value, 10),
                Err(RangeError::Malformed),
                "{value:?}"
            );
        }
    }

    #[test]
    fn full_range() {
        assert_eq!(ByteRange::full(10), Some(range!(0, 9)));
        assert_eq!(ByteRange::full(0), None);
    }

    #[test]
    fn content_range() {
        assert_eq!(
            range!(500_000, 599_999).content_range(1_000_000),
            "bytes 500000-599999/1000000"
        );
        assert_eq!(range!(500_000, 599_999).len(), 100_000);
    }

    #[quickcheck]
    fn parsed_range_stays_in_bounds(a: u32, b: u32, total: u32) -> bool {
        let (start, end) = (a.min(b) as u64, a.max(b) as u64);
        match ByteRange::parse(&format!("bytes={start}-{end}"), total as u64) {
            Ok(range) => {
                range.start == start
                    && range.end == end.min(total as u64 - 1)
                    && range.len() == range.end - range.start + 1
            }
            Err(err) => err == RangeError::Unsatisfiable && start >= total as u64,
        }
    }
}
