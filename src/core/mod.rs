use rand::distr::{Alphanumeric, SampleString};

pub mod customer;

pub mod pipeline;

pub mod rules;

/// Generates a random name for unnamed pipeline runs.
fn build_name() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 8)
}
