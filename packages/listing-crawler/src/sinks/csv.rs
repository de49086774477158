use std::io::Write;

use super::RecordSink;
use crate::error::SinkResult;
use crate::types::record::ExtractedRecord;

/// Column order of every CSV file.
pub const CSV_HEADER: [&str; 12] = [
    "title",
    "category",
    "description",
    "link",
    "image",
    "location",
    "kind",
    "published",
    "extracted_at",
    "phone",
    "price",
    "details",
];

/// RFC 4180 CSV writer with CRLF line endings.
///
/// `published` holds the normalized date when known, else the raw date text.
pub struct CsvSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_row<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) -> SinkResult<()> {
        let row: Vec<String> = fields.into_iter().map(quote).collect();
        self.writer.write_all(row.join(",").as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        Ok(())
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_records(&mut self, records: &[ExtractedRecord]) -> SinkResult<()> {
        self.write_row(CSV_HEADER)?;

        for record in records {
            let published = match (&record.published, &record.published_raw) {
                (Some(date), _) => date.format("%Y-%m-%d").to_string(),
                (None, Some(raw)) => raw.clone(),
                (None, None) => String::new(),
            };
            let extracted_at = record.extracted_at.to_rfc3339();

            self.write_row([
                record.title.as_str(),
                record.category.as_str(),
                record.description.as_str(),
                record.link.as_str(),
                record.image.as_deref().unwrap_or(""),
                record.location.as_str(),
                record.kind.as_str(),
                published.as_str(),
                extracted_at.as_str(),
                record.phone.as_deref().unwrap_or(""),
                record.price.as_deref().unwrap_or(""),
                record.details.as_deref().unwrap_or(""),
            ])?;
        }

        self.writer.flush()?;
        Ok(())
    }
}

/// Quote a field if it contains a separator, quote, or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
