use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One parsed CSV data line, keyed by header name. Values are already
/// whitespace-trimmed by the decoder; missing cells are empty strings.
pub type Row = BTreeMap<String, String>;

/// Literal stamped into every record's `metadata.source`.
pub const IMPORT_SOURCE: &str = "csv_upload";

/// The canonical customer record delivered to the remote API.
///
/// The wire field names (`firstName`, `postalCode`, `importDate`, ...) are part
/// of the API contract and must not change. Every record carries the full
/// fixed shape; canonical fields that were absent from the source row default
/// to empty strings.
///
/// # Examples
///
/// ```
/// use customer_import::core::customer::Customer;
///
/// let customer = Customer::default();
/// let json = serde_json::to_value(&customer).unwrap();
/// assert!(json.get("firstName").is_some());
/// assert!(json["address"].get("postalCode").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: Address,
    pub metadata: CustomerMetadata,
}

/// Nested address block of a [`Customer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}

/// Nested metadata block of a [`Customer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMetadata {
    pub tax_id: String,
    pub company_size: String,
    pub import_date: String,
    pub source: String,
}

impl Customer {
    /// Assembles the full canonical shape from a map of canonical field name
    /// to transformed value. Absent fields default to empty strings. The
    /// canonical `address` field feeds `address.street`.
    pub fn from_fields(fields: &HashMap<String, String>, import_date: String) -> Self {
        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();

        Customer {
            name: get("name"),
            email: get("email"),
            first_name: get("firstName"),
            last_name: get("lastName"),
            phone: get("phone"),
            address: Address {
                street: get("address"),
                city: get("city"),
                country: get("country"),
                postal_code: get("postalCode"),
            },
            metadata: CustomerMetadata {
                tax_id: get("taxId"),
                company_size: get("companySize"),
                import_date,
                source: IMPORT_SOURCE.to_string(),
            },
        }
    }

    /// An empty record carrying only the import stamp. Appended by the batch
    /// driver when a row cannot be transformed, so that output length keeps
    /// tracking input length.
    pub fn placeholder(import_date: String) -> Self {
        Customer {
            metadata: CustomerMetadata {
                import_date,
                source: IMPORT_SOURCE.to_string(),
                ..CustomerMetadata::default()
            },
            ..Customer::default()
        }
    }

    /// Every leaf field value, used for completeness scoring.
    pub fn leaf_values(&self) -> [&str; 13] {
        [
            &self.name,
            &self.email,
            &self.first_name,
            &self.last_name,
            &self.phone,
            &self.address.street,
            &self.address.city,
            &self.address.country,
            &self.address.postal_code,
            &self.metadata.tax_id,
            &self.metadata.company_size,
            &self.metadata.import_date,
            &self.metadata.source,
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Customer, IMPORT_SOURCE};

    #[test]
    fn from_fields_builds_the_full_shape_with_defaults() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "Acme Corp".to_string());
        fields.insert("email".to_string(), "sales@acme.com".to_string());
        fields.insert("address".to_string(), "1 Main St".to_string());

        let customer = Customer::from_fields(&fields, "2024-01-01T00:00:00Z".to_string());

        assert_eq!(customer.name, "Acme Corp");
        assert_eq!(customer.email, "sales@acme.com");
        assert_eq!(customer.address.street, "1 Main St");
        assert_eq!(customer.first_name, "");
        assert_eq!(customer.address.postal_code, "");
        assert_eq!(customer.metadata.source, IMPORT_SOURCE);
        assert_eq!(customer.metadata.import_date, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn wire_names_are_preserved() {
        let customer = Customer::from_fields(&HashMap::new(), "now".to_string());
        let json = serde_json::to_value(&customer).unwrap();

        assert!(json.get("firstName").is_some());
        assert!(json.get("lastName").is_some());
        assert!(json["address"].get("postalCode").is_some());
        assert!(json["metadata"].get("taxId").is_some());
        assert!(json["metadata"].get("companySize").is_some());
        assert_eq!(json["metadata"]["importDate"], "now");
        assert_eq!(json["metadata"]["source"], IMPORT_SOURCE);
    }

    #[test]
    fn placeholder_only_carries_the_import_stamp() {
        let customer = Customer::placeholder("now".to_string());

        assert_eq!(customer.name, "");
        assert_eq!(customer.phone, "");
        assert_eq!(customer.metadata.import_date, "now");
        assert_eq!(customer.metadata.source, IMPORT_SOURCE);
    }
}
