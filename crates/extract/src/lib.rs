//! Turns uploaded title lists into `(raw line, normalized title, year)` records.
//!
//! Plain text is split on newlines, spreadsheets are walked cell by cell,
//! and PDFs are read page by page. Every candidate line then goes through
//! [`parser::parse_line`].

pub mod parser;
pub mod source;

use std::path::Path;

use thiserror::Error;

pub use parser::{ExtractedRecord, parse_line};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("pdf error: {0}")]
    Pdf(String),
}

/// Decode uploaded bytes as UTF-8, dropping invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Extract records from an in-memory text blob.
pub fn extract_from_text(text: &str) -> Vec<ExtractedRecord> {
    text.lines().filter_map(parse_line).collect()
}

/// Extract records from a file, choosing the reader by extension.
///
/// Unknown extensions are read as line-delimited text.
pub fn extract_from_file(path: &Path) -> Result<Vec<ExtractedRecord>, ExtractError> {
    let lines = source::read_lines(path)?;
    let records: Vec<ExtractedRecord> = lines.iter().filter_map(|l| parse_line(l)).collect();
    tracing::debug!(
        path = %path.display(),
        lines = lines.len(),
        records = records.len(),
        "extracted titles from file"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_bytes_are_dropped() {
        assert_eq!(decode_text(b"Am\xe9lie"), "Amlie");
        assert_eq!(decode_text(b"\xff\xfeHeat\xc3"), "Heat");
        assert_eq!(decode_text("Amélie".as_bytes()), "Amélie");
    }
}
