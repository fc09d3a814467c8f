//! Rule-driven transformation: rows → canonical customer records.
//!
//! Each field is mapped, transformed, then validated in that order. Validation
//! is observational: a failing value is flagged but still kept in the output
//! record.

use std::collections::HashMap;

use chrono::Utc;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::customer::{Customer, Row};
use crate::core::rules::{RuleSet, TransformKind, ValidationKind};
use crate::error::{ErrorKind, ErrorRecord};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

/// Capitalizes the first letter of each whitespace-separated word and
/// lowercases the rest, preserving the original separators.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Normalizes North American phone numbers to `+1-DDD-DDD-DDDD`.
///
/// Exactly 10 digits format directly; 11 digits with a leading `1` drop it
/// first; anything else is returned unchanged. Idempotent on already
/// normalized input.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|ch| ch.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!("+1-{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("+1-{}-{}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => phone.to_string(),
    }
}

/// Trims and collapses internal whitespace runs to a single space.
pub fn clean_string(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn apply_transform(kind: TransformKind, value: &str) -> String {
    match kind {
        TransformKind::TitleCase => title_case(value),
        TransformKind::NormalizePhone => normalize_phone(value),
        TransformKind::CleanString => clean_string(value),
        TransformKind::Lowercase => value.to_lowercase(),
        TransformKind::Uppercase => value.to_uppercase(),
    }
}

fn validate_value(kind: ValidationKind, field: &str, value: &str) -> Result<(), String> {
    match kind {
        ValidationKind::EmailFormat if !EMAIL_PATTERN.is_match(value) => {
            Err(format!("Invalid email format: {value}"))
        }
        ValidationKind::PhoneFormat
            if value.chars().filter(|ch| ch.is_ascii_digit()).count() < 10 =>
        {
            Err(format!("Invalid phone format: {value}"))
        }
        ValidationKind::Required if value.trim().is_empty() => {
            Err(format!("Required field is empty: {field}"))
        }
        _ => Ok(()),
    }
}

/// Applies a [`RuleSet`] to decoded rows, producing canonical customer
/// records plus field-level validation errors.
///
/// # Examples
///
/// ```
/// use customer_import::core::rules::RuleSet;
/// use customer_import::transform::Transformer;
///
/// let transformer = Transformer::new(RuleSet::customer_defaults());
/// let row = [("company_name".to_string(), "acme corp".to_string())]
///     .into_iter()
///     .collect();
///
/// let (customer, errors) = transformer.transform_row(&row, 1);
/// assert_eq!(customer.name, "Acme Corp");
/// assert!(errors.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Transformer {
    rules: RuleSet,
}

impl Transformer {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Transforms one row. `row_number` is 1-based over the data rows of this
    /// stage and is echoed into every validation error.
    ///
    /// Per field: empty values are skipped entirely (exempt from validation),
    /// the source name is mapped to its canonical name, the registered
    /// transform runs, then the registered validation checks the
    /// post-transform value. A failing value is flagged and kept.
    pub fn transform_row(&self, row: &Row, row_number: usize) -> (Customer, Vec<ErrorRecord>) {
        let mut errors = Vec::new();
        let mut canonical: HashMap<String, String> = HashMap::new();

        for (source_field, value) in row {
            if value.is_empty() {
                continue;
            }

            let target = self
                .rules
                .field_mappings
                .get(source_field)
                .cloned()
                .unwrap_or_else(|| source_field.clone());

            let mut transformed = value.clone();
            if let Some(kind) = self.rules.transformations.get(&target) {
                transformed = apply_transform(*kind, &transformed);
            }

            if let Some(kind) = self.rules.validations.get(&target) {
                if let Err(message) = validate_value(*kind, &target, &transformed) {
                    errors.push(
                        ErrorRecord::new(ErrorKind::ValidationError, message)
                            .with_row(row_number)
                            .with_field(target.clone())
                            .with_value(transformed.clone()),
                    );
                }
            }

            canonical.insert(target, transformed);
        }

        let customer = Customer::from_fields(&canonical, Utc::now().to_rfc3339());
        (customer, errors)
    }

    /// Transforms a whole row set. Returns one customer per input row (rows
    /// are numbered from 1 in this stage) and the full accumulated error
    /// list. Per-row failures never abort the batch.
    pub fn transform_batch(&self, rows: &[Row]) -> (Vec<Customer>, Vec<ErrorRecord>) {
        let mut customers = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let (customer, row_errors) = self.transform_row(row, index + 1);
            customers.push(customer);
            errors.extend(row_errors);
        }

        debug!(
            "transformed {} rows with {} validation errors",
            customers.len(),
            errors.len()
        );
        (customers, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::{Transformer, clean_string, normalize_phone, title_case};
    use crate::core::customer::Row;
    use crate::core::rules::{RuleSet, TransformKind, ValidationKind};
    use crate::error::ErrorKind;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn title_case_handles_mixed_input() {
        assert_eq!(title_case("john DOE"), "John Doe");
        assert_eq!(title_case("  acme  corp "), "  Acme  Corp ");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn normalize_phone_formats_ten_digits() {
        assert_eq!(normalize_phone("5551234567"), "+1-555-123-4567");
        assert_eq!(normalize_phone("(555) 123-4567"), "+1-555-123-4567");
    }

    #[test]
    fn normalize_phone_drops_a_leading_one() {
        assert_eq!(normalize_phone("15551234567"), "+1-555-123-4567");
    }

    #[test]
    fn normalize_phone_leaves_everything_else_alone() {
        assert_eq!(normalize_phone("12345"), "12345");
        assert_eq!(normalize_phone("25551234567"), "25551234567");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn normalize_phone_is_idempotent() {
        let once = normalize_phone("5551234567");
        assert_eq!(normalize_phone(&once), once);
    }

    #[test]
    fn clean_string_collapses_whitespace() {
        assert_eq!(clean_string("  1   Main \t St  "), "1 Main St");
        assert_eq!(clean_string(""), "");
    }

    #[test]
    fn lowercase_transform_and_email_validation_scenario() {
        let mut rules = RuleSet::default();
        rules
            .transformations
            .insert("email".to_string(), TransformKind::Lowercase);
        rules
            .validations
            .insert("email".to_string(), ValidationKind::EmailFormat);

        let transformer = Transformer::new(rules);
        let (customer, errors) =
            transformer.transform_row(&row(&[("email", "JOHN@EXAMPLE.COM")]), 1);

        assert_eq!(customer.email, "john@example.com");
        assert!(errors.is_empty());
    }

    #[test]
    fn failing_validation_keeps_the_transformed_value() {
        let mut rules = RuleSet::default();
        rules
            .transformations
            .insert("email".to_string(), TransformKind::Lowercase);
        rules
            .validations
            .insert("email".to_string(), ValidationKind::EmailFormat);

        let transformer = Transformer::new(rules);
        let (customer, errors) = transformer.transform_row(&row(&[("email", "NOT-AN-EMAIL")]), 4);

        assert_eq!(customer.email, "not-an-email");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::ValidationError);
        assert_eq!(errors[0].row_number, Some(4));
        assert_eq!(errors[0].field.as_deref(), Some("email"));
        assert_eq!(errors[0].value.as_deref(), Some("not-an-email"));
    }

    #[test]
    fn empty_values_are_skipped_and_exempt_from_validation() {
        let mut rules = RuleSet::default();
        rules
            .validations
            .insert("email".to_string(), ValidationKind::EmailFormat);

        let transformer = Transformer::new(rules);
        let (customer, errors) = transformer.transform_row(&row(&[("email", "")]), 1);

        assert_eq!(customer.email, "");
        assert!(errors.is_empty());
    }

    #[test]
    fn unmapped_fields_keep_their_original_name() {
        let transformer = Transformer::new(RuleSet::default());
        let (customer, errors) = transformer.transform_row(&row(&[("city", "paris")]), 1);

        assert_eq!(customer.address.city, "paris");
        assert!(errors.is_empty());
    }

    #[test]
    fn default_rules_map_and_normalize_contact_columns() {
        let transformer = Transformer::new(RuleSet::customer_defaults());
        let (customer, errors) = transformer.transform_row(
            &row(&[
                ("company_name", "acme corp"),
                ("contact_email", "Sales@ACME.com"),
                ("contact_first_name", "jane"),
                ("contact_last_name", "DOE"),
                ("phone_number", "555.123.4567"),
                ("address", "  1   Main St "),
            ]),
            1,
        );

        assert_eq!(customer.name, "Acme Corp");
        assert_eq!(customer.email, "sales@acme.com");
        assert_eq!(customer.first_name, "Jane");
        assert_eq!(customer.last_name, "Doe");
        assert_eq!(customer.phone, "+1-555-123-4567");
        assert_eq!(customer.address.street, "1 Main St");
        assert!(errors.is_empty());
    }

    #[test]
    fn batch_output_length_tracks_input_length() {
        let transformer = Transformer::new(RuleSet::customer_defaults());
        let rows = vec![
            row(&[("company_name", "acme")]),
            row(&[("contact_email", "bad-email")]),
            row(&[]),
        ];

        let (customers, errors) = transformer.transform_batch(&rows);

        assert_eq!(customers.len(), 3);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row_number, Some(2));
    }

    #[test]
    fn phone_format_requires_ten_digits_post_transform() {
        let mut rules = RuleSet::default();
        rules
            .validations
            .insert("phone".to_string(), ValidationKind::PhoneFormat);

        let transformer = Transformer::new(rules);
        let (_, errors) = transformer.transform_row(&row(&[("phone", "555-1234")]), 1);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Invalid phone format"));
    }
}
