//! Record decoding: raw bytes → rows of trimmed string fields.
//!
//! Encoding and delimiter are resolved defensively: a bad byte stream or an
//! unusable delimiter hint degrades to warnings, never to a failed parse.

use csv::{ReaderBuilder, Trim};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::{debug, warn};

use crate::core::customer::Row;
use crate::error::{ErrorKind, ErrorRecord};

/// Delimiters the sniffer is allowed to pick.
pub const SUPPORTED_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Upper bound on the decoded-text prefix inspected while sniffing.
const SNIFF_WINDOW: usize = 8192;

/// Everything one decode pass produces: the parsed rows, the header names in
/// column order, and any non-fatal warnings or row-level parse failures.
#[derive(Debug, Default)]
pub struct DecodeOutput {
    pub rows: Vec<Row>,
    pub headers: Vec<String>,
    pub errors: Vec<ErrorRecord>,
}

impl DecodeOutput {
    /// Rows not referenced by any row-correlated error.
    pub fn valid_rows(&self) -> usize {
        let flagged = self
            .errors
            .iter()
            .filter(|error| error.row_number.is_some())
            .count();
        self.rows.len().saturating_sub(flagged)
    }
}

/// Decodes CSV byte buffers into [`Row`]s.
///
/// # Examples
///
/// ```
/// use customer_import::decoder::RecordDecoder;
///
/// let decoder = RecordDecoder::new();
/// let output = decoder.decode(b"name,email\nAcme,sales@acme.com", Some(","));
///
/// assert_eq!(output.headers, vec!["name", "email"]);
/// assert_eq!(output.rows[0]["email"], "sales@acme.com");
/// assert!(output.errors.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RecordDecoder {}

impl RecordDecoder {
    pub fn new() -> Self {
        Self {}
    }

    /// Parses `bytes` into rows keyed by the header line.
    ///
    /// The first line is the header (row 1); each subsequent line becomes a
    /// row (first data row = 2). Short rows are padded with empty strings,
    /// long rows are truncated to the header width. A malformed row yields a
    /// `row_parsing_error` and the parse continues.
    pub fn decode(&self, bytes: &[u8], delimiter: Option<&str>) -> DecodeOutput {
        let mut output = DecodeOutput::default();

        let (text, encoding_warning) = decode_text(bytes);
        if let Some(warning) = encoding_warning {
            output.errors.push(warning);
        }

        let (resolved, delimiter_warning) = resolve_delimiter(delimiter, &text);
        if let Some(warning) = delimiter_warning {
            output.errors.push(warning);
        }

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .delimiter(resolved)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        match reader.headers() {
            Ok(headers) => {
                output.headers = headers.iter().map(str::to_string).collect();
            }
            Err(err) => {
                output.errors.push(ErrorRecord::new(
                    ErrorKind::FileParsingError,
                    format!("Failed to parse CSV file: {err}"),
                ));
                return output;
            }
        }

        for (index, result) in reader.records().enumerate() {
            // Header is row 1, so the first data row is row 2.
            let row_number = index + 2;
            match result {
                Ok(record) => {
                    let row: Row = output
                        .headers
                        .iter()
                        .enumerate()
                        .map(|(column, name)| {
                            let value = record.get(column).unwrap_or("").trim().to_string();
                            (name.clone(), value)
                        })
                        .collect();
                    output.rows.push(row);
                }
                Err(err) => {
                    output.errors.push(
                        ErrorRecord::new(
                            ErrorKind::RowParsingError,
                            format!("Error parsing row: {err}"),
                        )
                        .with_row(row_number),
                    );
                }
            }
        }

        debug!(
            "decoded {} rows, {} columns, {} errors",
            output.rows.len(),
            output.headers.len(),
            output.errors.len()
        );
        output
    }

    /// Structural validation of an already-decoded row set.
    ///
    /// An empty row set yields a single `empty_file` error and short-circuits
    /// the remaining checks.
    pub fn validate_structure(&self, rows: &[Row], required_fields: &[String]) -> Vec<ErrorRecord> {
        if rows.is_empty() {
            return vec![ErrorRecord::new(
                ErrorKind::EmptyFile,
                "CSV file is empty or contains no data rows",
            )];
        }

        let mut errors = Vec::new();

        let first_row = &rows[0];
        let missing: Vec<&str> = required_fields
            .iter()
            .filter(|field| !first_row.contains_key(field.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            errors.push(ErrorRecord::new(
                ErrorKind::MissingRequiredFields,
                format!("Missing required fields: {}", missing.join(", ")),
            ));
        }

        for (index, row) in rows.iter().enumerate() {
            if row.values().all(String::is_empty) {
                errors.push(
                    ErrorRecord::new(ErrorKind::EmptyRow, "Row is completely empty")
                        .with_row(index + 2),
                );
            }
        }

        errors
    }
}

/// Resolves the byte encoding and decodes to text.
///
/// BOM-marked UTF-8/UTF-16 streams decode as marked; unmarked streams decode
/// as UTF-8 when valid and as Windows-1252 (covering the latin-1/cp1252 range)
/// otherwise. A stream the chosen decoder cannot fully represent degrades to
/// lossy replacement characters plus a non-fatal `encoding_warning`.
fn decode_text(bytes: &[u8]) -> (String, Option<ErrorRecord>) {
    let encoding: &'static Encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None if std::str::from_utf8(bytes).is_ok() => UTF_8,
        None => WINDOWS_1252,
    };

    let (text, _, had_errors) = encoding.decode(bytes);
    let warning = if had_errors {
        warn!("encoding issues in input, characters were replaced");
        Some(ErrorRecord::new(
            ErrorKind::EncodingWarning,
            "Encoding issues detected, some characters may be replaced",
        ))
    } else {
        None
    };

    (text.into_owned(), warning)
}

/// Resolves the delimiter from the caller hint, sniffing when the hint is
/// unusable. The hint is accepted verbatim only when it is exactly one ASCII
/// character; anything else triggers a sniff and a `delimiter_warning`.
fn resolve_delimiter(hint: Option<&str>, text: &str) -> (u8, Option<ErrorRecord>) {
    if let Some(hint) = hint {
        let mut chars = hint.chars();
        if let (Some(delimiter), None) = (chars.next(), chars.next()) {
            if delimiter.is_ascii() {
                return (delimiter as u8, None);
            }
        }

        let resolved = sniff_delimiter(text).unwrap_or(',');
        let warning = ErrorRecord::new(
            ErrorKind::DelimiterWarning,
            format!("Provided delimiter was invalid; using {resolved:?} instead"),
        );
        return (resolved as u8, Some(warning));
    }

    (sniff_delimiter(text).unwrap_or(',') as u8, None)
}

/// Picks the supported delimiter occurring most often in the text prefix.
/// Ties resolve in `SUPPORTED_DELIMITERS` order.
fn sniff_delimiter(text: &str) -> Option<char> {
    let window = text
        .char_indices()
        .nth(SNIFF_WINDOW)
        .map_or(text, |(offset, _)| &text[..offset]);

    let mut best: Option<(char, usize)> = None;
    for candidate in SUPPORTED_DELIMITERS {
        let count = window.matches(candidate).count();
        if count > 0 && best.map_or(true, |(_, max)| count > max) {
            best = Some((candidate, count));
        }
    }
    best.map(|(delimiter, _)| delimiter)
}
