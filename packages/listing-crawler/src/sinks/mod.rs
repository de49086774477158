//! Output sinks for the final record list.
//!
//! - `JsonSink` - pretty-printed JSON array
//! - `JsonLinesSink` - one JSON object per line
//! - `CsvSink` - RFC 4180 CSV with a fixed header

mod csv;
mod json;

pub use self::csv::{CsvSink, CSV_HEADER};
pub use self::json::{JsonLinesSink, JsonSink};

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::SinkResult;
use crate::types::record::ExtractedRecord;

/// Writes a batch of records somewhere.
pub trait RecordSink {
    /// Write all records, in order, and flush.
    fn write_records(&mut self, records: &[ExtractedRecord]) -> SinkResult<()>;
}

/// Supported output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

impl OutputFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::JsonLines => "jsonl",
            OutputFormat::Csv => "csv",
        }
    }

    /// Box a sink of this format around `writer`.
    pub fn sink<'a, W: Write + 'a>(&self, writer: W) -> Box<dyn RecordSink + 'a> {
        match self {
            OutputFormat::Json => Box::new(JsonSink::new(writer)),
            OutputFormat::JsonLines => Box::new(JsonLinesSink::new(writer)),
            OutputFormat::Csv => Box::new(CsvSink::new(writer)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "ndjson" | "json-lines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Serialize `records` into a byte buffer in the given format.
pub fn render(format: OutputFormat, records: &[ExtractedRecord]) -> SinkResult<Vec<u8>> {
    let mut buffer = Vec::new();
    format.sink(&mut buffer).write_records(records)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::JsonLines);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::JsonLines.to_string(), "jsonl");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(OutputFormat::Json, &[]).unwrap(), b"[]\n");
        assert!(render(OutputFormat::JsonLines, &[]).unwrap().is_empty());
        assert_eq!(
            String::from_utf8(render(OutputFormat::Csv, &[]).unwrap()).unwrap(),
            format!("{}\r\n", CSV_HEADER.join(","))
        );
    }
}
