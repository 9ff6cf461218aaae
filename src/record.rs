//! Log record model.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};

/// Timestamp format of the first bracket group, e.g. `2015-11-19 10:33:54.934+0000`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%z";

/// Minimum number of bracket groups a line must contain: timestamp, host and severity.
const REQUIRED_GROUPS: usize = 3;

/// Log record severity. Variants are declared in sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Error = 0,
    Warn = 1,
    Info = 2,
}

impl Severity {
    /// Returns the severity rank used as a sorting tie-break. Lower ranks sort first.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Returns the severity token as it appears in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
        }
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(Severity::Error),
            "WARN" => Ok(Severity::Warn),
            "INFO" => Ok(Severity::Info),
            other => Err(ParseError::UnknownSeverity(other.to_string())),
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record parsing error.
#[derive(Debug)]
pub enum ParseError {
    /// The line has fewer bracket groups than required.
    MissingGroups { found: usize },
    /// The timestamp group does not match [`TIMESTAMP_FORMAT`].
    InvalidTimestamp { value: String, source: chrono::ParseError },
    /// The severity group is not one of the known severities.
    UnknownSeverity(String),
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            ParseError::InvalidTimestamp { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ParseError::MissingGroups { found } => write!(
                f,
                "expected at least {} bracket groups, found {}",
                REQUIRED_GROUPS, found
            ),
            ParseError::InvalidTimestamp { value, source } => {
                write!(f, "invalid timestamp '{}': {}", value, source)
            }
            ParseError::UnknownSeverity(value) => write!(f, "unknown severity '{}'", value),
        }
    }
}

/// Record sorting key: timestamp first, severity rank second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub timestamp: DateTime<FixedOffset>,
    pub severity: Severity,
}

/// A single parsed log line.
///
/// Records are ordered by [`SortKey`] through [`LogRecord::cmp_key`]. Equality and hashing use the raw line only,
/// so two distinct lines with the same timestamp and severity are different records that sort as equals.
#[derive(Debug, Clone)]
pub struct LogRecord {
    line: String,
    key: SortKey,
}

impl LogRecord {
    /// Parses a raw log line.
    ///
    /// Expected syntax: `[2015-11-19 10:33:54.934+0000] [HOST1] [INFO] [CLASS1] [MESSAGE1 something]`.
    /// Only the first three groups are interpreted, the rest of the line is kept verbatim.
    pub fn parse(line: impl Into<String>) -> Result<Self, ParseError> {
        let line = line.into();

        let mut groups = BracketGroups::new(&line);
        let (timestamp, _host, severity) = match (groups.next(), groups.next(), groups.next()) {
            (Some(timestamp), Some(host), Some(severity)) => (timestamp, host, severity),
            (timestamp, host, _) => {
                let found = [timestamp, host].iter().filter(|g| g.is_some()).count();
                return Err(ParseError::MissingGroups { found });
            }
        };

        let timestamp = DateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|err| {
            ParseError::InvalidTimestamp {
                value: timestamp.to_string(),
                source: err,
            }
        })?;
        let severity = severity.parse()?;

        return Ok(LogRecord {
            key: SortKey { timestamp, severity },
            line,
        });
    }

    /// Returns the original line.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Consumes the record, returning the original line.
    pub fn into_line(self) -> String {
        self.line
    }

    /// Returns the parsed timestamp.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.key.timestamp
    }

    /// Returns the parsed severity.
    pub fn severity(&self) -> Severity {
        self.key.severity
    }

    /// Returns the record sorting key.
    pub fn key(&self) -> SortKey {
        self.key
    }

    /// Compares two records by their sort keys.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl FromStr for LogRecord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogRecord::parse(s)
    }
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

impl PartialEq for LogRecord {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line
    }
}

impl Eq for LogRecord {}

impl Hash for LogRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.line.hash(state);
    }
}

/// Iterator over the contents of `[...]` groups of a line.
struct BracketGroups<'a> {
    rest: &'a str,
}

impl<'a> BracketGroups<'a> {
    fn new(line: &'a str) -> Self {
        BracketGroups { rest: line }
    }
}

impl<'a> Iterator for BracketGroups<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.rest.find('[')? + 1;
        let len = self.rest[start..].find(']')?;

        let group = &self.rest[start..start + len];
        self.rest = &self.rest[start + len + 1..];

        Some(group)
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone, Utc};
    use rstest::*;

    use super::{BracketGroups, LogRecord, ParseError, Severity};

    const LINE1: &str = "[2015-11-19 10:31:55.128+0000] [HOST2] [ERROR] [CLASS2] [MESSAGE2 random]";
    const LINE2: &str = "[2015-11-19 10:31:55.128+0000] [HOST3] [INFO] [CLASS6] [MESSAGE5 from another host]";
    const LINE3: &str = "[2015-11-19 10:33:54.934+0000] [HOST1] [INFO] [CLASS1] [MESSAGE1 something]";
    const LINE4: &str = "[2015-11-19 10:35:55.267+0000] [HOST4] [INFO] [CLASS4] [MESSAGE4 too]";
    const LINE5: &str = "[2015-11-19 10:37:55.246+0000] [HOST2] [WARN] [CLASS9] [MESSAGE9 again]";
    const LINE6: &str = "[2015-11-19 10:37:55.246+0000] [HOST2] [INFO] [CLASS9] [MESSAGE9 again]";

    #[test]
    fn test_parse_line() {
        let record = LogRecord::parse(LINE3).unwrap();

        let expected_timestamp = Utc.with_ymd_and_hms(2015, 11, 19, 10, 33, 54).unwrap() + Duration::milliseconds(934);

        assert_eq!(record.severity(), Severity::Info);
        assert_eq!(record.timestamp(), expected_timestamp);
        assert_eq!(record.line(), LINE3);
    }

    #[test]
    fn test_parse_offset() {
        let utc = LogRecord::parse("[2015-11-19 10:00:00.000+0000] [H] [INFO]").unwrap();
        let shifted = LogRecord::parse("[2015-11-19 12:00:00.000+0200] [H] [INFO]").unwrap();

        assert_eq!(utc.key(), shifted.key());
        assert_ne!(utc, shifted);
    }

    #[rstest]
    #[case(vec![0, 1, 2, 3, 4, 5])]
    #[case(vec![5, 4, 3, 2, 1, 0])]
    #[case(vec![1, 0, 3, 5, 2, 4])]
    fn test_sorting(#[case] order: Vec<usize>) {
        let expected: Vec<LogRecord> = [LINE1, LINE2, LINE3, LINE4, LINE5, LINE6]
            .iter()
            .map(|line| LogRecord::parse(*line).unwrap())
            .collect();

        let mut actual: Vec<LogRecord> = order.iter().map(|&idx| expected[idx].clone()).collect();
        actual.sort_by(LogRecord::cmp_key);

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_severity_rank() {
        assert!(Severity::Error.rank() < Severity::Warn.rank());
        assert!(Severity::Warn.rank() < Severity::Info.rank());
        assert!(Severity::Error < Severity::Info);
    }

    #[test]
    fn test_equality_uses_raw_line() {
        let record = LogRecord::parse(LINE1).unwrap();
        let same_key = LogRecord::parse(LINE1.replace("random", "other")).unwrap();

        assert_eq!(record.cmp_key(&same_key), std::cmp::Ordering::Equal);
        assert_ne!(record, same_key);
        assert_eq!(record, LogRecord::parse(LINE1).unwrap());
    }

    #[rstest]
    #[case("", 0)]
    #[case("no brackets at all", 0)]
    #[case("[2015-11-19 10:31:55.128+0000]", 1)]
    #[case("[2015-11-19 10:31:55.128+0000] [HOST2] ERROR", 2)]
    #[case("[2015-11-19 10:31:55.128+0000] [HOST2] [ERROR", 2)]
    fn test_missing_groups(#[case] line: &str, #[case] expected_found: usize) {
        match LogRecord::parse(line) {
            Err(ParseError::MissingGroups { found }) => assert_eq!(found, expected_found),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[rstest]
    #[case("[yesterday] [HOST] [INFO]")]
    #[case("[2015-11-19] [HOST] [INFO]")]
    #[case("[2015-11-19 10:31:55.128] [HOST] [INFO]")]
    #[case("[2015-13-19 10:31:55.128+0000] [HOST] [INFO]")]
    fn test_invalid_timestamp(#[case] line: &str) {
        assert!(matches!(
            LogRecord::parse(line),
            Err(ParseError::InvalidTimestamp { .. })
        ));
    }

    #[rstest]
    #[case("DEBUG")]
    #[case("info")]
    #[case("")]
    fn test_unknown_severity(#[case] severity: &str) {
        let line = format!("[2015-11-19 10:31:55.128+0000] [HOST] [{}] [CLASS] [msg]", severity);

        match LogRecord::parse(line) {
            Err(ParseError::UnknownSeverity(value)) => assert_eq!(value, severity),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_bracket_groups() {
        let groups: Vec<&str> = BracketGroups::new("x [a] [b [c] d] [] [e").collect();
        assert_eq!(groups, vec!["a", "b [c", ""]);
    }
}
