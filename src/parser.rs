// Statement Parser
// Semicolon-delimited bank export (Latin-1, "1.234,56" amounts) → per-line outcomes

use std::fmt;

use crate::db::{NewTransaction, TransactionKind};

/// Lines of metadata at the top of every export, skipped without looking at them
pub const HEADER_LINES: usize = 8;

/// Minimum number of `;`-separated fields a data row must have
pub const MIN_FIELDS: usize = 5;

const DATE_COLUMN: usize = 0;
const DESCRIPTION_COLUMN: usize = 2;
const AMOUNT_COLUMN: usize = 4;

// ============================================================================
// CORE TYPES
// ============================================================================

/// A data row that produced a valid amount
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRow {
    /// 1-based line number in the decoded file
    pub line_number: usize,
    /// Operation date exactly as exported. Never parsed.
    pub date: String,
    pub concept: String,
    /// Magnitude of the parsed amount
    pub amount: f64,
    pub kind: TransactionKind,
}

impl StatementRow {
    pub fn to_new_transaction(&self) -> NewTransaction {
        NewTransaction {
            concept: self.concept.clone(),
            amount: self.amount,
            kind: self.kind,
        }
    }
}

/// Why a data line was left out of the import
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    TooFewFields { found: usize },
    EmptyAmount,
    UnparsableAmount { raw: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewFields { found } => {
                write!(f, "se esperaban al menos {} campos, hay {}", MIN_FIELDS, found)
            }
            SkipReason::EmptyAmount => f.write_str("importe vacío"),
            SkipReason::UnparsableAmount { raw } => write!(f, "importe no numérico: '{}'", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Row(StatementRow),
    Skipped { line_number: usize, reason: SkipReason },
}

// ============================================================================
// TEXT HANDLING
// ============================================================================

/// Decode ISO-8859-1. Every byte is the code point of the same value, so this
/// cannot fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split on universal newlines (`\r\n` counts once). A trailing break does
/// not yield an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }

        lines.push(&text[start..idx]);
        start = idx + c.len_utf8();

        if c == '\r' {
            if let Some(&(next_idx, '\n')) = chars.peek() {
                chars.next();
                start = next_idx + 1;
            }
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// Trim whitespace, including the ASCII separator controls exports sometimes carry
fn trim_field(field: &str) -> &str {
    field.trim_matches(|c: char| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
}

// ============================================================================
// AMOUNTS
// ============================================================================

/// "100.000,50" → "100000.50"
///
/// Dots go first: they are thousands separators, and after the comma becomes
/// the decimal point it would be indistinguishable from one.
pub fn normalize_amount(raw: &str) -> String {
    raw.replace('.', "").replace(',', ".")
}

/// Normalize and parse a signed amount. `None` for anything that is not a
/// finite number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    normalize_amount(raw)
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

// ============================================================================
// STATEMENT
// ============================================================================

/// Parse one data line. `line_number` is 1-based.
pub fn parse_line(line_number: usize, line: &str) -> ParsedLine {
    let fields: Vec<&str> = line.split(';').collect();

    if fields.len() < MIN_FIELDS {
        return ParsedLine::Skipped {
            line_number,
            reason: SkipReason::TooFewFields { found: fields.len() },
        };
    }

    let date = trim_field(fields[DATE_COLUMN]).to_string();
    let concept = trim_field(fields[DESCRIPTION_COLUMN]).to_string();
    let amount_raw = trim_field(fields[AMOUNT_COLUMN]);

    if amount_raw.is_empty() {
        return ParsedLine::Skipped {
            line_number,
            reason: SkipReason::EmptyAmount,
        };
    }

    match parse_amount(amount_raw) {
        Some(value) => ParsedLine::Row(StatementRow {
            line_number,
            date,
            concept,
            amount: value.abs(),
            kind: TransactionKind::from_signed(value),
        }),
        None => ParsedLine::Skipped {
            line_number,
            reason: SkipReason::UnparsableAmount {
                raw: amount_raw.to_string(),
            },
        },
    }
}

/// Decode a raw export and parse every line after the header block
pub fn parse_statement(bytes: &[u8]) -> Vec<ParsedLine> {
    let text = decode_latin1(bytes);

    split_lines(&text)
        .into_iter()
        .enumerate()
        .skip(HEADER_LINES)
        .map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}
