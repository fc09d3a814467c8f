use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::customer::Row;

/// Fatal error raised while constructing or driving pipeline components.
///
/// Row-scoped failures are never `Err` values: they are captured as
/// [`ErrorRecord`]s and processing continues.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("rule set error: {0}")]
    Rules(String),

    #[error("api client error: {0}")]
    Client(String),
}

/// Closed taxonomy of everything that can go wrong across the pipeline.
///
/// Serialized as the snake_case tag the report format uses (`row_parsing_error`,
/// `api_error`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // decode / structural stage
    EncodingWarning,
    DelimiterWarning,
    RowParsingError,
    FileParsingError,
    EmptyFile,
    MissingRequiredFields,
    EmptyRow,
    // transform stage
    ValidationError,
    TransformationError,
    // delivery stage
    Timeout,
    ConnectionError,
    UnexpectedError,
    ApiError,
    HttpError,
    InvalidInput,
}

impl ErrorKind {
    /// The snake_case tag used in serialized reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::EncodingWarning => "encoding_warning",
            ErrorKind::DelimiterWarning => "delimiter_warning",
            ErrorKind::RowParsingError => "row_parsing_error",
            ErrorKind::FileParsingError => "file_parsing_error",
            ErrorKind::EmptyFile => "empty_file",
            ErrorKind::MissingRequiredFields => "missing_required_fields",
            ErrorKind::EmptyRow => "empty_row",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::TransformationError => "transformation_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::UnexpectedError => "unexpected_error",
            ErrorKind::ApiError => "api_error",
            ErrorKind::HttpError => "http_error",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }

    /// Human label used in the detailed error report.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::EncodingWarning => "Encoding Warning",
            ErrorKind::DelimiterWarning => "Delimiter Warning",
            ErrorKind::RowParsingError | ErrorKind::FileParsingError => "CSV Parsing Error",
            ErrorKind::EmptyFile => "Empty File Error",
            ErrorKind::MissingRequiredFields => "Missing Required Fields",
            ErrorKind::EmptyRow => "Empty Row Error",
            ErrorKind::ValidationError => "Data Validation Error",
            ErrorKind::TransformationError => "Data Transformation Error",
            ErrorKind::Timeout => "Timeout Error",
            ErrorKind::ConnectionError => "Connection Error",
            ErrorKind::UnexpectedError => "Unexpected Error",
            ErrorKind::ApiError | ErrorKind::HttpError => "API Integration Error",
            ErrorKind::InvalidInput => "Invalid Input Error",
        }
    }

    /// Fixed severity split: the parsing family, missing required fields and
    /// API failures are critical, everything else is a warning.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            ErrorKind::RowParsingError
                | ErrorKind::FileParsingError
                | ErrorKind::MissingRequiredFields
                | ErrorKind::ApiError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged, row-correlated description of one failure, produced by any stage
/// and consumed only by the aggregator and report synthesizer. Append-only:
/// records accumulate across stages and are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Row>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorRecord {
            kind,
            message: message.into(),
            row_number: None,
            field: None,
            value: None,
            raw_data: None,
        }
    }

    pub fn with_row(mut self, row_number: usize) -> Self {
        self.row_number = Some(row_number);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_raw_data(mut self, row: Row) -> Self {
        self.raw_data = Some(row);
        self
    }

    /// Display form used by the detailed error report: `Row N: message` when
    /// the record is row-correlated, the bare message otherwise.
    pub fn display_message(&self) -> String {
        match self.row_number {
            Some(row_number) => format!("Row {}: {}", row_number, self.message),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ErrorRecord};

    #[test]
    fn kind_serializes_to_its_snake_case_tag() {
        let json = serde_json::to_string(&ErrorKind::RowParsingError).unwrap();
        assert_eq!(json, r#""row_parsing_error""#);
        assert_eq!(ErrorKind::ApiError.to_string(), "api_error");
    }

    #[test]
    fn severity_split_is_fixed() {
        assert!(ErrorKind::RowParsingError.is_critical());
        assert!(ErrorKind::MissingRequiredFields.is_critical());
        assert!(ErrorKind::ApiError.is_critical());
        assert!(!ErrorKind::ValidationError.is_critical());
        assert!(!ErrorKind::EmptyRow.is_critical());
        assert!(!ErrorKind::Timeout.is_critical());
    }

    #[test]
    fn display_message_prefixes_the_row_number() {
        let record =
            ErrorRecord::new(ErrorKind::ValidationError, "Invalid email format: x").with_row(3);
        assert_eq!(record.display_message(), "Row 3: Invalid email format: x");

        let record = ErrorRecord::new(ErrorKind::EmptyFile, "CSV file is empty");
        assert_eq!(record.display_message(), "CSV file is empty");
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let record = ErrorRecord::new(ErrorKind::EmptyFile, "empty");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "empty_file");
        assert!(json.get("row_number").is_none());
        assert!(json.get("raw_data").is_none());
    }
}
