use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// chrono format of the `YYYY-MM-DD_HH:MM:SS` timestamps the extraction tool expects.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

const TIMESTAMP_LEN: usize = 19;

/// A calendar timestamp with second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parses a timestamp in exactly the `YYYY-MM-DD_HH:MM:SS` layout.
    ///
    /// The textual layout is checked byte by byte before chrono sees the
    /// string, so single-digit fields, padding or trailing text are rejected
    /// rather than reinterpreted.
    pub fn parse(value: &str) -> Result<Self, String> {
        if value.is_empty() {
            return Err("value is empty".to_string());
        }

        if !has_timestamp_layout(value) {
            return Err(format!(
                "'{}' does not match the format YYYY-MM-DD_HH:MM:SS",
                value
            ));
        }

        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .map(Timestamp)
            .map_err(|e| format!("'{}' is not a valid calendar timestamp: {}", value, e))
    }
}

fn has_timestamp_layout(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != TIMESTAMP_LEN {
        return false;
    }

    bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'_',
        13 | 16 => *b == b':',
        _ => b.is_ascii_digit(),
    })
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
