//! Minimal RFC 4180 style CSV reader.
//!
//! # Invariants
//! - Fields are comma separated; double quotes wrap fields that contain
//!   commas, quotes (`""`) or line breaks.
//! - `\r\n` and `\n` both end a record; a trailing line break does not
//!   produce an empty record.
//! - A leading UTF-8 BOM is ignored.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    /// Input ended inside a quoted field opened on `line` (1-based).
    UnterminatedQuote { line: usize },
}

impl Display for CsvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote { line } => {
                write!(f, "unterminated quoted field starting on line {line}")
            }
        }
    }
}

impl Error for CsvError {}

/// Parses CSV text into rows of raw field strings.
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_line = 0;
    let mut line = 1;
    let mut row_has_content = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                other => field.push(other),
            }
            continue;
        }

        match ch {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
                row_has_content = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                row_has_content = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                line += 1;
                if row_has_content || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                } else {
                    rows.push(Vec::new());
                }
                row_has_content = false;
            }
            other => {
                field.push(other);
                row_has_content = true;
            }
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote { line: quote_line });
    }
    if row_has_content || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}
