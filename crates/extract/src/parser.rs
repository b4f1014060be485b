use regex::Regex;
use std::sync::LazyLock;

/// One candidate title parsed from a single input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub raw_text: String,
    pub normalized_title: String,
    pub year: Option<i32>,
}

// "Title" or "Title (Year)" with the year in 1900-2099.
static RE_TITLE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<title>.+?)(?:\s*\((?P<year>19\d{2}|20\d{2})\))?$").unwrap()
});

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_title(raw: &str) -> String {
    RE_WHITESPACE.replace_all(raw, " ").trim().to_string()
}

/// Parse one line. Blank lines and lines without a usable title yield `None`.
pub fn parse_line(line: &str) -> Option<ExtractedRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let caps = RE_TITLE_YEAR.captures(line)?;
    let title = normalize_title(caps.name("title")?.as_str());
    if title.is_empty() {
        return None;
    }

    let year = caps.name("year").and_then(|y| y.as_str().parse().ok());

    Some(ExtractedRecord {
        raw_text: line.to_string(),
        normalized_title: title,
        year,
    })
}
