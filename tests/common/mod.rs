//! Shared fixtures: a mockall gateway and sample CSV payloads.

use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;

use customer_import::client::{CustomerGateway, FailureDetail};
use customer_import::core::customer::Customer;

mock! {
    pub Gateway {}

    #[async_trait]
    impl CustomerGateway for Gateway {
        async fn ping(&self) -> Result<(), FailureDetail>;
        async fn create(&self, customer: &Customer) -> Result<Value, FailureDetail>;
    }
}

/// A well-formed two-row contact file.
pub fn sample_csv() -> &'static [u8] {
    b"company_name,contact_email,contact_first_name,contact_last_name,phone_number\n\
      acme corp,SALES@ACME.COM,jane,doe,5551234567\n\
      globex,info@globex.com,homer,simpson,15559876543"
}

/// A connectivity failure detail as the reqwest client would report it.
pub fn connection_refused() -> FailureDetail {
    FailureDetail {
        error: "connection_failed".to_string(),
        message: "Connection failed: connection refused".to_string(),
        status_code: None,
        endpoint: Some("https://api.example.com/customers".to_string()),
    }
}
