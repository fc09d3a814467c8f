//! Error aggregation: categorize, summarize and tie failures back to the
//! rows that caused them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::Serialize;

use crate::core::customer::Row;
use crate::error::{ErrorKind, ErrorRecord};

/// Groups errors by kind. Insertion order is preserved within each group.
pub fn categorize(errors: &[ErrorRecord]) -> BTreeMap<ErrorKind, Vec<ErrorRecord>> {
    let mut categorized: BTreeMap<ErrorKind, Vec<ErrorRecord>> = BTreeMap::new();
    for error in errors {
        categorized.entry(error.kind).or_default().push(error.clone());
    }
    categorized
}

/// Summary statistics over the full error list.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub error_types: BTreeMap<ErrorKind, usize>,
    pub rows_with_errors: Vec<usize>,
    pub critical_errors: usize,
    pub warning_errors: usize,
}

/// Computes counts per kind, the distinct affected row numbers and the fixed
/// critical/warning split. Zero errors yield zero counts and empty
/// collections, not an error.
pub fn summarize(errors: &[ErrorRecord]) -> ErrorSummary {
    let mut summary = ErrorSummary {
        total_errors: errors.len(),
        ..ErrorSummary::default()
    };

    let mut rows: BTreeSet<usize> = BTreeSet::new();
    for error in errors {
        *summary.error_types.entry(error.kind).or_insert(0) += 1;
        if let Some(row_number) = error.row_number {
            rows.insert(row_number);
        }
        if error.kind.is_critical() {
            summary.critical_errors += 1;
        } else {
            summary.warning_errors += 1;
        }
    }
    summary.rows_with_errors = rows.into_iter().collect();

    summary
}

/// One failed input row with everything that went wrong on it.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRow {
    pub row_number: usize,
    pub data: Row,
    pub errors: Vec<ErrorRecord>,
}

/// Reconstructs the original payload of every row referenced by an error.
/// Row numbers index 1-based into `rows`; out-of-range numbers are skipped.
pub fn failed_rows(errors: &[ErrorRecord], rows: &[Row]) -> Vec<FailedRow> {
    let referenced: BTreeSet<usize> = errors.iter().filter_map(|error| error.row_number).collect();

    referenced
        .into_iter()
        .filter(|row_number| (1..=rows.len()).contains(row_number))
        .map(|row_number| FailedRow {
            row_number,
            data: rows[row_number - 1].clone(),
            errors: errors
                .iter()
                .filter(|error| error.row_number == Some(row_number))
                .cloned()
                .collect(),
        })
        .collect()
}

/// One entry of the detailed error listing.
#[derive(Debug, Serialize)]
pub struct DetailedError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub type_label: &'static str,
    pub message: String,
    pub details: ErrorRecord,
    pub timestamp: String,
}

/// The full error report: summary, detailed listing, reconstructed rows.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub summary: ErrorSummary,
    pub detailed_errors: Vec<DetailedError>,
    pub failed_rows: Vec<FailedRow>,
    pub generated_at: String,
    pub total_rows_processed: usize,
}

pub fn error_report(errors: &[ErrorRecord], rows: &[Row]) -> ErrorReport {
    let generated_at = Utc::now().to_rfc3339();

    let detailed_errors = categorize(errors)
        .into_values()
        .flatten()
        .map(|error| DetailedError {
            kind: error.kind,
            type_label: error.kind.label(),
            message: error.display_message(),
            timestamp: generated_at.clone(),
            details: error,
        })
        .collect();

    ErrorReport {
        summary: summarize(errors),
        detailed_errors,
        failed_rows: failed_rows(errors, rows),
        generated_at,
        total_rows_processed: rows.len(),
    }
}
