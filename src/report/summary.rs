//! Report synthesis: processing counts, data-quality scores, delivery
//! outcomes and recommendations combined into one serializable report.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;

use crate::client::BatchReport;
use crate::core::customer::Customer;
use crate::error::{ErrorKind, ErrorRecord};

const REPORT_VERSION: &str = "1.0";
const SYSTEM_NAME: &str = "customer-import";

/// API error details retained in the report, to bound its size.
const MAX_API_ERROR_DETAILS: usize = 10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub success_rate: f64,
    pub processing_time_seconds: f64,
    pub rows_per_second: f64,
}

/// Success rate and throughput never divide by zero: both default to 0.
pub fn processing_summary(
    total_rows: usize,
    successful_rows: usize,
    failed_rows: usize,
    processing_time_seconds: f64,
) -> ProcessingSummary {
    let success_rate = if total_rows > 0 {
        successful_rows as f64 / total_rows as f64 * 100.0
    } else {
        0.0
    };
    let rows_per_second = if processing_time_seconds > 0.0 {
        total_rows as f64 / processing_time_seconds
    } else {
        0.0
    };

    ProcessingSummary {
        total_rows,
        successful_rows,
        failed_rows,
        success_rate: round2(success_rate),
        processing_time_seconds: round2(processing_time_seconds),
        rows_per_second: round2(rows_per_second),
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct DataQuality {
    pub completeness_score: f64,
    pub validity_score: f64,
    pub quality_issues: Vec<String>,
    pub validation_errors_count: usize,
}

/// Completeness is the fraction of non-empty leaf field values across all
/// transformed records; validity discounts one point per validation error.
pub fn data_quality(customers: &[Customer], errors: &[ErrorRecord]) -> DataQuality {
    let validation_errors_count = errors
        .iter()
        .filter(|error| error.kind == ErrorKind::ValidationError)
        .count();

    if customers.is_empty() {
        return DataQuality {
            completeness_score: 0.0,
            validity_score: 0.0,
            quality_issues: Vec::new(),
            validation_errors_count,
        };
    }

    let mut filled = 0usize;
    let mut total = 0usize;
    for customer in customers {
        for value in customer.leaf_values() {
            total += 1;
            if !value.trim().is_empty() {
                filled += 1;
            }
        }
    }
    let completeness_score = round2(filled as f64 / total as f64 * 100.0);

    let records = customers.len() as f64;
    let validity_score = round2((records - validation_errors_count as f64) / records * 100.0);

    let mut quality_issues = Vec::new();
    if completeness_score < 80.0 {
        quality_issues.push("Low data completeness - many fields are empty".to_string());
    }
    if validity_score < 90.0 {
        quality_issues.push("Data validation issues detected".to_string());
    }

    DataQuality {
        completeness_score,
        validity_score,
        quality_issues,
        validation_errors_count,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiErrorDetail {
    pub customer_email: String,
    pub error_type: String,
    pub message: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ApiResults {
    pub total_api_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub success_rate: f64,
    pub api_errors: Vec<ApiErrorDetail>,
}

/// Pass-through counts from the batch report; at most the first
/// [`MAX_API_ERROR_DETAILS`] failure details are retained.
pub fn api_results(delivery: Option<&BatchReport>) -> ApiResults {
    let Some(delivery) = delivery else {
        return ApiResults {
            total_api_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            success_rate: 0.0,
            api_errors: Vec::new(),
        };
    };

    let success_rate = if delivery.total_processed > 0 {
        delivery.total_successful as f64 / delivery.total_processed as f64 * 100.0
    } else {
        0.0
    };

    let api_errors = delivery
        .failed
        .iter()
        .take(MAX_API_ERROR_DETAILS)
        .map(|failure| ApiErrorDetail {
            customer_email: failure
                .customer
                .as_ref()
                .map(|customer| customer.email.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            error_type: failure.error_details.error.clone(),
            message: failure.error_details.message.clone(),
        })
        .collect();

    ApiResults {
        total_api_calls: delivery.total_processed,
        successful_calls: delivery.total_successful,
        failed_calls: delivery.total_failed,
        success_rate: round2(success_rate),
        api_errors,
    }
}

/// Deterministic, threshold-driven recommendations in fixed order:
/// processing → completeness → validity → API → error-kind-specific.
pub fn recommendations(
    processing: &ProcessingSummary,
    quality: &DataQuality,
    api: &ApiResults,
    errors: &[ErrorRecord],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if processing.success_rate < 80.0 {
        recommendations
            .push("Consider reviewing and improving data quality before upload".to_string());
    }
    if quality.completeness_score < 80.0 {
        recommendations
            .push("Improve data completeness by filling missing required fields".to_string());
    }
    if quality.validity_score < 90.0 {
        recommendations
            .push("Review data validation rules and fix invalid data formats".to_string());
    }
    if api.success_rate < 90.0 {
        recommendations.push("Check API connectivity and authentication settings".to_string());
    }

    let parsing_errors = errors
        .iter()
        .filter(|error| {
            matches!(
                error.kind,
                ErrorKind::RowParsingError | ErrorKind::FileParsingError
            )
        })
        .count();
    if parsing_errors > 0 {
        recommendations.push("Review CSV format and encoding issues".to_string());
    }

    let missing_fields = errors
        .iter()
        .filter(|error| error.kind == ErrorKind::MissingRequiredFields)
        .count();
    if missing_fields > 0 {
        recommendations.push("Ensure all required fields are present in CSV header".to_string());
    }

    recommendations
}

#[derive(Debug, Serialize)]
pub struct ErrorOverview {
    pub total_errors: usize,
    pub error_summary: BTreeMap<ErrorKind, usize>,
}

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub report_version: String,
    pub system: String,
}

/// The complete processing report. Purely derived and safe to serialize;
/// the field names are part of the output contract.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub processing_summary: ProcessingSummary,
    pub data_quality: DataQuality,
    pub api_results: ApiResults,
    pub errors: ErrorOverview,
    pub recommendations: Vec<String>,
    pub metadata: ReportMetadata,
}

pub fn build_report(
    processing: ProcessingSummary,
    customers: &[Customer],
    delivery: Option<&BatchReport>,
    errors: &[ErrorRecord],
) -> ImportReport {
    let quality = data_quality(customers, errors);
    let api = api_results(delivery);
    let recommendations = recommendations(&processing, &quality, &api, errors);

    let mut error_summary: BTreeMap<ErrorKind, usize> = BTreeMap::new();
    for error in errors {
        *error_summary.entry(error.kind).or_insert(0) += 1;
    }

    ImportReport {
        processing_summary: processing,
        data_quality: quality,
        api_results: api,
        errors: ErrorOverview {
            total_errors: errors.len(),
            error_summary,
        },
        recommendations,
        metadata: ReportMetadata {
            generated_at: Utc::now().to_rfc3339(),
            report_version: REPORT_VERSION.to_string(),
            system: SYSTEM_NAME.to_string(),
        },
    }
}
