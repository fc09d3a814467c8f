use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Per-field transform applied after field mapping.
///
/// The set of recognized kinds is closed: a rule file naming an unknown kind
/// is rejected when the rule set is deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    TitleCase,
    NormalizePhone,
    CleanString,
    Lowercase,
    Uppercase,
}

/// Per-field validation applied to the post-transform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    EmailFormat,
    PhoneFormat,
    Required,
}

/// Declarative rule set driving the transformation engine.
///
/// Three maps: source column name → canonical field name, canonical field →
/// transform, canonical field → validation. A source column absent from
/// `field_mappings` keeps its original name; a canonical field absent from the
/// other two maps passes through untouched.
///
/// # Examples
///
/// ```
/// use customer_import::core::rules::RuleSet;
///
/// let rules = RuleSet::from_json(
///     r#"{
///         "field_mappings": {"contact_email": "email"},
///         "transformations": {"email": "lowercase"},
///         "validations": {"email": "email_format"}
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(rules.field_mappings["contact_email"], "email");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub field_mappings: HashMap<String, String>,
    pub transformations: HashMap<String, TransformKind>,
    pub validations: HashMap<String, ValidationKind>,
}

impl RuleSet {
    /// Loads a rule set from a JSON document. Unknown transform or validation
    /// kinds are a configuration error, not a silent passthrough.
    pub fn from_json(json: &str) -> Result<Self, ImportError> {
        serde_json::from_str(json).map_err(|err| ImportError::Rules(err.to_string()))
    }

    /// The default company/contact rule set used when the caller does not
    /// supply one.
    pub fn customer_defaults() -> Self {
        let field_mappings = [
            ("company_name", "name"),
            ("contact_email", "email"),
            ("contact_first_name", "firstName"),
            ("contact_last_name", "lastName"),
            ("phone_number", "phone"),
            ("address", "address"),
            ("city", "city"),
            ("country", "country"),
            ("postal_code", "postalCode"),
            ("tax_id", "taxId"),
            ("company_size", "companySize"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let transformations = [
            ("name", TransformKind::TitleCase),
            ("firstName", TransformKind::TitleCase),
            ("lastName", TransformKind::TitleCase),
            ("phone", TransformKind::NormalizePhone),
            ("email", TransformKind::Lowercase),
            ("address", TransformKind::CleanString),
            ("city", TransformKind::TitleCase),
        ]
        .into_iter()
        .map(|(field, kind)| (field.to_string(), kind))
        .collect();

        let validations = [
            ("email", ValidationKind::EmailFormat),
            ("phone", ValidationKind::PhoneFormat),
            ("name", ValidationKind::Required),
            ("firstName", ValidationKind::Required),
            ("lastName", ValidationKind::Required),
        ]
        .into_iter()
        .map(|(field, kind)| (field.to_string(), kind))
        .collect();

        RuleSet {
            field_mappings,
            transformations,
            validations,
        }
    }
}

/// Source columns that must appear in the header for a structurally valid
/// upload.
pub fn default_required_fields() -> Vec<String> {
    [
        "company_name",
        "contact_email",
        "contact_first_name",
        "contact_last_name",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::{RuleSet, TransformKind, ValidationKind};

    #[test]
    fn defaults_cover_the_contact_columns() {
        let rules = RuleSet::customer_defaults();

        assert_eq!(rules.field_mappings["company_name"], "name");
        assert_eq!(rules.field_mappings["postal_code"], "postalCode");
        assert_eq!(rules.transformations["phone"], TransformKind::NormalizePhone);
        assert_eq!(rules.validations["email"], ValidationKind::EmailFormat);
    }

    #[test]
    fn unknown_transform_kind_is_a_configuration_error() {
        let result = RuleSet::from_json(r#"{"transformations": {"email": "rot13"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let rules = RuleSet::from_json("{}").unwrap();
        assert!(rules.field_mappings.is_empty());
        assert!(rules.transformations.is_empty());
        assert!(rules.validations.is_empty());
    }

    #[test]
    fn rule_sets_load_from_json() -> anyhow::Result<()> {
        let rules = RuleSet::from_json(
            r#"{
                "field_mappings": {"kundenname": "name"},
                "transformations": {"name": "title_case"},
                "validations": {"name": "required"}
            }"#,
        )?;

        assert_eq!(rules.field_mappings["kundenname"], "name");
        assert_eq!(rules.transformations["name"], TransformKind::TitleCase);
        assert_eq!(rules.validations["name"], ValidationKind::Required);
        Ok(())
    }
}
