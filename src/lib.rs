/*!
 # customer-import

 A batch pipeline that turns CSV files of company/contact records into
 canonical customer records and delivers them to a remote HTTP API, collecting
 every failure along the way into a structured report.

 ## Core Concepts

 - **RecordDecoder:** turns raw bytes into rows of trimmed string fields,
   resolving text encoding and field delimiter defensively.
 - **Transformer:** applies a declarative [`RuleSet`](core::rules::RuleSet)
   (field mapping, per-field transform, per-field validation) to each row,
   producing a canonical [`Customer`](core::customer::Customer) plus
   field-level errors. Validation flags data, it never discards it.
 - **CustomerGateway / CustomerApiClient:** submits customer records in
   fixed-size batches with per-call retry/backoff and a pre-flight
   connectivity check, keeping success/failure bookkeeping per record.
 - **Error aggregation & reporting:** every stage appends
   [`ErrorRecord`](error::ErrorRecord)s; the report modules categorize them,
   reconstruct failed input rows and synthesize one serializable report with
   data-quality scores and recommendations.
 - **ImportPipeline:** wires the stages in sequence (decode → transform →
   deliver → aggregate → report) and never raises past its own boundary.

 ## Getting Started

 ```no_run
 use customer_import::core::pipeline::ImportPipelineBuilder;

 #[tokio::main]
 async fn main() {
     let csv = b"company_name,contact_email,contact_first_name,contact_last_name\n\
                 acme corp,SALES@ACME.COM,jane,doe";

     let pipeline = ImportPipelineBuilder::new("https://api.example.com")
         .api_key("secret")
         .batch_size(10)
         .build();

     let outcome = pipeline.run(csv).await;

     println!(
         "delivered {} of {} rows",
         outcome.summary.as_ref().map_or(0, |s| s.successful_api_calls),
         outcome.rows.len(),
     );
     for error in &outcome.errors {
         eprintln!("{}", error.display_message());
     }
 }
 ```

 Per-row problems (a malformed line, an invalid email, a rejected API call)
 never abort a run. Only two conditions are fatal: zero rows surviving the
 decode, and a failed pre-flight connectivity check.
 */

/// Core module: configuration, canonical records and the pipeline
/// orchestrator.
pub mod core;

/// Error types: the fatal [`ImportError`] and the per-item error taxonomy.
pub mod error;

#[doc(inline)]
pub use error::*;

/// CSV byte decoding and structural validation.
pub mod decoder;

/// Rule-driven row transformation.
pub mod transform;

/// Batched HTTP delivery of customer records.
pub mod client;

/// Error aggregation and report synthesis.
pub mod report;
