use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::build_name;
use crate::client::{
    BatchReport, CustomerApiClientBuilder, CustomerGateway, DEFAULT_BATCH_SIZE, DEFAULT_TIMEOUT,
    Payload, deliver,
};
use crate::core::customer::{Customer, Row};
use crate::core::rules::{RuleSet, default_required_fields};
use crate::decoder::RecordDecoder;
use crate::error::{ErrorKind, ErrorRecord};
use crate::report::aggregate::{ErrorReport, error_report};
use crate::report::summary::{ImportReport, build_report, processing_summary};
use crate::transform::Transformer;

/// Totals of one pipeline run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total_rows_processed: usize,
    pub successful_transformations: usize,
    pub successful_api_calls: usize,
    pub failed_api_calls: usize,
    pub total_errors: usize,
    pub processing_time_seconds: f64,
    pub success_rate: f64,
}

/// Everything one run produced. The pipeline never raises past its own
/// boundary: fatal conditions surface as `success: false` plus whatever
/// partial results were built before the failure.
#[derive(Debug, Serialize)]
pub struct PipelineOutcome {
    pub success: bool,
    /// Short description of the fatal condition, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub errors: Vec<ErrorRecord>,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub customers: Vec<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_report: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ImportReport>,
    pub processing_time_seconds: f64,
}

/// The import pipeline: decode → transform → deliver → aggregate → report.
///
/// Owns nothing beyond configuration and call order; every stage-local
/// failure is captured as an [`ErrorRecord`] and processing continues.
///
/// # Examples
///
/// ```no_run
/// use customer_import::core::pipeline::ImportPipelineBuilder;
///
/// # #[tokio::main]
/// # async fn main() {
/// let pipeline = ImportPipelineBuilder::new("https://api.example.com")
///     .api_key("secret")
///     .batch_size(25)
///     .build();
///
/// let outcome = pipeline.run(b"company_name,contact_email\nAcme,a@b.com").await;
/// assert!(outcome.success);
/// # }
/// ```
pub struct ImportPipeline {
    name: String,
    rules: RuleSet,
    required_fields: Vec<String>,
    delimiter: Option<String>,
    base_url: String,
    api_key: Option<String>,
    batch_size: usize,
    delay_between_batches: Duration,
    timeout: Duration,
}

/// Builder for [`ImportPipeline`]. All options are pass-through
/// configuration; defaults mirror the standard company/contact upload.
pub struct ImportPipelineBuilder {
    name: Option<String>,
    rules: RuleSet,
    required_fields: Vec<String>,
    delimiter: Option<String>,
    base_url: String,
    api_key: Option<String>,
    batch_size: usize,
    delay_between_batches: Duration,
    timeout: Duration,
}

impl ImportPipelineBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            name: None,
            rules: RuleSet::customer_defaults(),
            required_fields: default_required_fields(),
            delimiter: None,
            base_url: base_url.into(),
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            delay_between_batches: Duration::from_millis(100),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Human-readable run name; a random one is generated if not set.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn required_fields(mut self, required_fields: Vec<String>) -> Self {
        self.required_fields = required_fields;
        self
    }

    /// Delimiter hint forwarded to the decoder.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn delay_between_batches(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ImportPipeline {
        ImportPipeline {
            name: self.name.unwrap_or_else(build_name),
            rules: self.rules,
            required_fields: self.required_fields,
            delimiter: self.delimiter,
            base_url: self.base_url,
            api_key: self.api_key,
            batch_size: self.batch_size,
            delay_between_batches: self.delay_between_batches,
            timeout: self.timeout,
        }
    }
}

impl ImportPipeline {
    /// Runs the pipeline against the configured API endpoint.
    pub async fn run(&self, file_content: &[u8]) -> PipelineOutcome {
        let mut builder =
            CustomerApiClientBuilder::new(&self.base_url).timeout(self.timeout);
        if let Some(api_key) = &self.api_key {
            builder = builder.api_key(api_key);
        }

        match builder.build() {
            Ok(client) => self.run_with_gateway(file_content, &client).await,
            Err(err) => PipelineOutcome {
                success: false,
                error: Some(err.to_string()),
                errors: vec![ErrorRecord::new(ErrorKind::UnexpectedError, err.to_string())],
                headers: Vec::new(),
                rows: Vec::new(),
                customers: Vec::new(),
                summary: None,
                delivery: None,
                error_report: None,
                report: None,
                processing_time_seconds: 0.0,
            },
        }
    }

    /// Runs the pipeline against an explicit gateway. Used by tests and by
    /// callers that manage their own client.
    pub async fn run_with_gateway<G>(&self, file_content: &[u8], gateway: &G) -> PipelineOutcome
    where
        G: CustomerGateway + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        info!("Start of import run: {}, id: {}", self.name, run_id);

        // Decode and structural validation.
        let decoder = RecordDecoder::new();
        let decoded = decoder.decode(file_content, self.delimiter.as_deref());
        let mut errors = decoded.errors;
        errors.extend(decoder.validate_structure(&decoded.rows, &self.required_fields));

        if decoded.rows.is_empty() {
            warn!("import run {run_id} aborted: no data rows survived decoding");
            return PipelineOutcome {
                success: false,
                error: Some("No valid data to process".to_string()),
                errors,
                headers: decoded.headers,
                rows: Vec::new(),
                customers: Vec::new(),
                summary: None,
                delivery: None,
                error_report: None,
                report: None,
                processing_time_seconds: start.elapsed().as_secs_f64(),
            };
        }

        // Transform.
        let transformer = Transformer::new(self.rules.clone());
        let (customers, transform_errors) = transformer.transform_batch(&decoded.rows);
        let failed_transformations = transform_errors.len();
        errors.extend(transform_errors);

        // Pre-flight connectivity check: nothing is sent when it fails.
        if let Err(detail) = gateway.ping().await {
            warn!("import run {run_id} aborted: {}", detail.message);
            errors.push(ErrorRecord::new(
                ErrorKind::ConnectionError,
                detail.message.clone(),
            ));
            let elapsed = start.elapsed().as_secs_f64();
            return PipelineOutcome {
                success: false,
                error: Some(format!("connection_failed: {}", detail.message)),
                error_report: Some(error_report(&errors, &decoded.rows)),
                errors,
                headers: decoded.headers,
                rows: decoded.rows,
                customers,
                summary: None,
                delivery: None,
                report: None,
                processing_time_seconds: elapsed,
            };
        }

        // Deliver.
        let payloads: Vec<Payload> = customers.iter().cloned().map(Payload::Customer).collect();
        let delivery = deliver(
            gateway,
            &payloads,
            self.batch_size,
            self.delay_between_batches,
        )
        .await;

        for failure in &delivery.failed {
            let email = failure
                .customer
                .as_ref()
                .map(|customer| customer.email.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            errors.push(
                ErrorRecord::new(ErrorKind::ApiError, failure.error_details.message.clone())
                    .with_value(email),
            );
        }

        // Aggregate and report.
        let elapsed = start.elapsed().as_secs_f64();
        let total_rows = decoded.rows.len();
        let processing = processing_summary(
            total_rows,
            total_rows.saturating_sub(failed_transformations),
            failed_transformations,
            elapsed,
        );
        let report = build_report(processing, &customers, Some(&delivery), &errors);

        let summary = RunSummary {
            total_rows_processed: total_rows,
            successful_transformations: customers.len(),
            successful_api_calls: delivery.total_successful,
            failed_api_calls: delivery.total_failed,
            total_errors: errors.len(),
            processing_time_seconds: elapsed,
            success_rate: if total_rows > 0 {
                delivery.total_successful as f64 / total_rows as f64 * 100.0
            } else {
                0.0
            },
        };

        info!(
            "End of import run: {}, id: {} ({} rows, {} delivered, {} errors)",
            self.name,
            run_id,
            total_rows,
            delivery.total_successful,
            errors.len()
        );

        PipelineOutcome {
            success: true,
            error: None,
            error_report: Some(error_report(&errors, &decoded.rows)),
            errors,
            headers: decoded.headers,
            rows: decoded.rows,
            customers,
            summary: Some(summary),
            delivery: Some(delivery),
            report: Some(report),
            processing_time_seconds: elapsed,
        }
    }
}
