/// Error aggregation: categorization, summary statistics and failed-row
/// reconstruction.
pub mod aggregate;

/// Report synthesis: processing, quality and delivery summaries plus
/// recommendations.
pub mod summary;
