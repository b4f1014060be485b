//! Readers that turn an uploaded file into candidate lines.

use std::path::Path;

use crate::ExtractError;

/// Input format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Delimited(u8),
    Spreadsheet,
    Pdf,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Self::Delimited(b','),
            "tsv" => Self::Delimited(b'\t'),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Self::Spreadsheet,
            "pdf" => Self::Pdf,
            // .txt, .log and anything unrecognised
            _ => Self::Text,
        }
    }

    /// Formats that must reach the extractor as a file rather than as text.
    pub fn is_binary(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// Read every candidate line from `path`. Lines are untrimmed; the parser trims.
pub fn read_lines(path: &Path) -> Result<Vec<String>, ExtractError> {
    match SourceFormat::from_path(path) {
        SourceFormat::Text => read_text_lines(path),
        SourceFormat::Delimited(delimiter) => read_delimited_cells(path, delimiter),
        SourceFormat::Spreadsheet => read_spreadsheet_cells(path),
        SourceFormat::Pdf => read_pdf_lines(path),
    }
}

fn read_text_lines(path: &Path) -> Result<Vec<String>, ExtractError> {
    let bytes = std::fs::read(path)?;
    Ok(crate::decode_text(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

/// CSV/TSV: the first row is a header; every remaining cell is a line, column by column.
fn read_delimited_cells(path: &Path, delimiter: u8) -> Result<Vec<String>, ExtractError> {
    let bytes = std::fs::read(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes.as_slice());

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(crate::decode_text)
                .collect(),
        );
    }

    Ok(cells_column_major(&rows))
}

/// Spreadsheets: first worksheet, first row as header, cells column by column.
fn read_spreadsheet_cells(path: &Path) -> Result<Vec<String>, ExtractError> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| ExtractError::Spreadsheet(e.to_string()))?,
        None => return Ok(Vec::new()),
    };

    let rows: Vec<Vec<String>> = range
        .rows()
        .skip(1)
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    Ok(cells_column_major(&rows))
}

fn read_pdf_lines(path: &Path) -> Result<Vec<String>, ExtractError> {
    let mut document =
        lopdf::Document::load(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let pages: Vec<(u32, lopdf::ObjectId)> = document.get_pages().into_iter().collect();
    let mut lines = Vec::new();
    for (page_number, page_id) in pages {
        let text = break_text_lines(&mut document, page_id)
            .and_then(|_| document.extract_text(&[page_number]));
        match text {
            Ok(text) => lines.extend(text.lines().map(str::to_string)),
            Err(e) => {
                // One unreadable page should not lose the rest of the document.
                tracing::warn!(path = %path.display(), page = page_number, error = %e, "skipping pdf page");
            }
        }
    }

    Ok(lines)
}

/// `extract_text` only breaks lines at `ET` and only reads `Tj`/`TJ`, so
/// close and reopen the text object wherever the content stream moves to a
/// new line inside one, and turn the next-line show operators into `Tj`.
fn break_text_lines(
    document: &mut lopdf::Document,
    page_id: lopdf::ObjectId,
) -> Result<(), lopdf::Error> {
    use lopdf::content::{Content, Operation};

    let content = Content::decode(&document.get_page_content(page_id)?)?;
    let mut operations = Vec::with_capacity(content.operations.len());
    let mut in_text = false;
    let mut last_tm_y = None;

    for mut op in content.operations {
        match op.operator.as_str() {
            "BT" => in_text = true,
            "ET" => in_text = false,
            _ if in_text && starts_new_line(&op, &mut last_tm_y) => {
                operations.push(Operation::new("ET", vec![]));
                operations.push(Operation::new("BT", vec![]));
            }
            _ => {}
        }
        if matches!(op.operator.as_str(), "'" | "\"") {
            // The string is always the last operand of ' and ".
            let text: Vec<_> = op.operands.pop().into_iter().collect();
            op = Operation::new("Tj", text);
        }
        operations.push(op);
    }

    let encoded = Content { operations }.encode()?;
    document.change_page_content(page_id, encoded)
}

/// Text-positioning operators that move down (or up) a line. Horizontal
/// moves within a line do not count.
fn starts_new_line(op: &lopdf::content::Operation, last_tm_y: &mut Option<f32>) -> bool {
    let operand = |i: usize| op.operands.get(i).and_then(|o| o.as_float().ok());
    match op.operator.as_str() {
        "T*" | "'" | "\"" => true,
        "Td" | "TD" => operand(1).is_some_and(|ty| ty != 0.0),
        "Tm" => {
            let y = operand(5);
            let moved = last_tm_y.is_some() && y != *last_tm_y;
            *last_tm_y = y;
            moved
        }
        _ => false,
    }
}

/// Flatten rows into a single sequence, walking each column top to bottom.
/// Ragged rows are allowed; missing cells are skipped.
pub fn cells_column_major(rows: &[Vec<String>]) -> Vec<String> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut cells = Vec::new();
    for col in 0..width {
        for row in rows {
            if let Some(cell) = row.get(col) {
                cells.push(cell.clone());
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn column_major_walks_each_column_in_turn() {
        let rows = vec![row(&["Alien", "Lost"]), row(&["Heat"]), row(&["Up", "Fargo"])];
        assert_eq!(
            cells_column_major(&rows),
            vec!["Alien", "Heat", "Up", "Lost", "Fargo"]
        );
    }

    #[test]
    fn column_major_of_nothing_is_empty() {
        assert!(cells_column_major(&[]).is_empty());
    }

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a.TXT")), SourceFormat::Text);
        assert_eq!(SourceFormat::from_path(Path::new("a.csv")), SourceFormat::Delimited(b','));
        assert_eq!(SourceFormat::from_path(Path::new("a.tsv")), SourceFormat::Delimited(b'\t'));
        assert_eq!(SourceFormat::from_path(Path::new("a.xlsx")), SourceFormat::Spreadsheet);
        assert_eq!(SourceFormat::from_path(Path::new("a.Pdf")), SourceFormat::Pdf);
        assert_eq!(SourceFormat::from_path(Path::new("a.md")), SourceFormat::Text);
        assert_eq!(SourceFormat::from_path(Path::new("no_extension")), SourceFormat::Text);
        assert!(!SourceFormat::Text.is_binary());
        assert!(SourceFormat::Pdf.is_binary());
    }
}
