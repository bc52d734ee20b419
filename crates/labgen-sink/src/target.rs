//! Parsing of `--out` targets.

use crate::csv::CsvSink;
use crate::error::SinkError;
use crate::jsonl::JsonlSink;
use crate::memory::MemorySink;
use crate::sink::Sink;
use crate::sql::SqlSink;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where a batch goes.
///
/// Parsed from `jsonl:<dir>`, `csv:<dir>`, `sql:<dir>`, `memory`, or a bare
/// directory, which means JSONL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Memory,
    Jsonl(PathBuf),
    Csv(PathBuf),
    Sql(PathBuf),
}

impl SinkTarget {
    /// Build the sink for this target.
    pub fn build(&self) -> Box<dyn Sink> {
        match self {
            SinkTarget::Memory => Box::new(MemorySink::new()),
            SinkTarget::Jsonl(dir) => Box::new(JsonlSink::new(dir)),
            SinkTarget::Csv(dir) => Box::new(CsvSink::new(dir)),
            SinkTarget::Sql(dir) => Box::new(SqlSink::new(dir)),
        }
    }
}

impl FromStr for SinkTarget {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SinkError::InvalidTarget {
            target: s.to_string(),
            reason: reason.to_string(),
        };

        if s.is_empty() {
            return Err(invalid("target is empty"));
        }
        if s == "memory" {
            return Ok(SinkTarget::Memory);
        }

        let Some((scheme, rest)) = s.split_once(':') else {
            return Ok(SinkTarget::Jsonl(PathBuf::from(s)));
        };
        let dir = || -> Result<PathBuf, SinkError> {
            if rest.is_empty() {
                Err(invalid("missing output directory"))
            } else {
                Ok(PathBuf::from(rest))
            }
        };
        match scheme {
            "jsonl" => Ok(SinkTarget::Jsonl(dir()?)),
            "csv" => Ok(SinkTarget::Csv(dir()?)),
            "sql" => Ok(SinkTarget::Sql(dir()?)),
            // Single letters are drive prefixes, not schemes
            other if other.len() > 1 && other.chars().all(|c| c.is_ascii_alphanumeric()) => Err(
                invalid("unknown format; expected jsonl, csv, sql or memory"),
            ),
            _ => Ok(SinkTarget::Jsonl(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Memory => write!(f, "memory"),
            SinkTarget::Jsonl(dir) => write!(f, "jsonl:{}", dir.display()),
            SinkTarget::Csv(dir) => write!(f, "csv:{}", dir.display()),
            SinkTarget::Sql(dir) => write!(f, "sql:{}", dir.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!("memory".parse::<SinkTarget>().unwrap(), SinkTarget::Memory);
        assert_eq!(
            "csv:out/data".parse::<SinkTarget>().unwrap(),
            SinkTarget::Csv(PathBuf::from("out/data"))
        );
        assert_eq!(
            "sql:/tmp/x".parse::<SinkTarget>().unwrap(),
            SinkTarget::Sql(PathBuf::from("/tmp/x"))
        );
        assert_eq!(
            "./out".parse::<SinkTarget>().unwrap(),
            SinkTarget::Jsonl(PathBuf::from("./out"))
        );
        assert_eq!(
            "jsonl:out".parse::<SinkTarget>().unwrap(),
            SinkTarget::Jsonl(PathBuf::from("out"))
        );
    }

    #[test]
    fn test_rejects_unknown_or_empty() {
        assert!(matches!(
            "parquet:out".parse::<SinkTarget>(),
            Err(SinkError::InvalidTarget { .. })
        ));
        assert!("".parse::<SinkTarget>().is_err());
        assert!("csv:".parse::<SinkTarget>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let target = SinkTarget::Csv(PathBuf::from("out"));
        assert_eq!(target.to_string().parse::<SinkTarget>().unwrap(), target);
        assert_eq!(target.build().name(), "csv");
    }
}
