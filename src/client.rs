//! Batched delivery of canonical customer records to the remote API.
//!
//! The network seam is the [`CustomerGateway`] trait; [`CustomerApiClient`] is
//! its reqwest implementation. Batching, pacing and partial-failure
//! bookkeeping live in [`deliver`], which works against any gateway.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::core::customer::Customer;
use crate::error::{ErrorRecord, ImportError};

/// Records per batch unless the caller overrides it.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Per-call timeout for record submission.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shorter bound for the pre-flight connectivity probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ATTEMPTS: u32 = 3;
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// What delivery is asked to send. The `Invalid` variant exists so a
/// misordered pipeline that feeds error records into delivery fails loudly as
/// `invalid_input` instead of hitting the network.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Customer(Customer),
    Invalid(ErrorRecord),
}

/// Structured detail for one failed submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    /// Tag from the response body's `error` field when present, otherwise
    /// `http_error` / `timeout` / `connection_error` / `unexpected_error` /
    /// `invalid_input`.
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliverySuccess {
    #[serde(rename = "customer_data")]
    pub customer: Customer,
    pub api_response: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    #[serde(rename = "customer_data", skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    pub error_details: FailureDetail,
}

/// Outcome of one batched delivery run. Both lists are in processing order
/// and the counters always satisfy
/// `total_processed == total_successful + total_failed`.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub successful: Vec<DeliverySuccess>,
    pub failed: Vec<DeliveryFailure>,
    pub total_processed: usize,
    pub total_successful: usize,
    pub total_failed: usize,
}

/// The network seam: a connectivity probe plus per-record submission.
#[async_trait]
pub trait CustomerGateway: Send + Sync {
    /// Pre-flight connectivity check. Only a 2xx response counts as
    /// connected; any other outcome blocks delivery entirely.
    async fn ping(&self) -> Result<(), FailureDetail>;

    /// Submits one customer record. `Ok` carries the parsed response body.
    async fn create(&self, customer: &Customer) -> Result<Value, FailureDetail>;
}

/// Reqwest-backed [`CustomerGateway`] for the customer endpoint.
///
/// # Examples
///
/// ```no_run
/// use customer_import::client::CustomerApiClientBuilder;
///
/// let client = CustomerApiClientBuilder::new("https://api.example.com")
///     .api_key("secret")
///     .build()
///     .unwrap();
/// ```
pub struct CustomerApiClient {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry_backoff: Duration,
    client: reqwest::Client,
}

/// Builder for [`CustomerApiClient`].
#[derive(Debug, Clone)]
pub struct CustomerApiClientBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry_backoff: Duration,
}

impl CustomerApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Bearer token sent as `Authorization` on every call.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Per-call timeout for record submission (default 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base delay of the exponential backoff between retry attempts.
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn build(self) -> Result<CustomerApiClient, ImportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("customer-import/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ImportError::Client(err.to_string()))?;

        Ok(CustomerApiClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key,
            timeout: self.timeout,
            retry_backoff: self.retry_backoff,
            client,
        })
    }
}

impl CustomerApiClient {
    fn customers_url(&self) -> String {
        format!("{}/customers", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl CustomerGateway for CustomerApiClient {
    async fn ping(&self) -> Result<(), FailureDetail> {
        let url = self.customers_url();
        let request = self.authorize(self.client.get(&url).timeout(PROBE_TIMEOUT));

        match request.send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(FailureDetail {
                error: "connection_failed".to_string(),
                message: format!("API returned status {}", response.status().as_u16()),
                status_code: Some(response.status().as_u16()),
                endpoint: Some(url),
            }),
            Err(err) => Err(FailureDetail {
                error: "connection_failed".to_string(),
                message: format!("Connection failed: {err}"),
                status_code: None,
                endpoint: Some(url),
            }),
        }
    }

    async fn create(&self, customer: &Customer) -> Result<Value, FailureDetail> {
        let url = self.customers_url();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = self.authorize(
                self.client
                    .post(&url)
                    .timeout(self.timeout)
                    .json(customer),
            );

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        let body = response.json::<Value>().await.unwrap_or(Value::Null);
                        return Ok(body);
                    }

                    if RETRY_STATUSES.contains(&status) && attempt < MAX_ATTEMPTS {
                        let backoff = self.retry_backoff * 2u32.pow(attempt - 1);
                        warn!(
                            "transient status {status} from {url}, retrying in {backoff:?} \
                             (attempt {attempt}/{MAX_ATTEMPTS})"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(failure_from_response(status, &url, &body));
                }
                Err(err) if err.is_timeout() => {
                    return Err(FailureDetail {
                        error: "timeout".to_string(),
                        message: "API request timed out".to_string(),
                        status_code: None,
                        endpoint: Some(url),
                    });
                }
                Err(err) if err.is_connect() => {
                    return Err(FailureDetail {
                        error: "connection_error".to_string(),
                        message: "Failed to connect to API".to_string(),
                        status_code: None,
                        endpoint: Some(url),
                    });
                }
                Err(err) => {
                    return Err(FailureDetail {
                        error: "unexpected_error".to_string(),
                        message: err.to_string(),
                        status_code: None,
                        endpoint: Some(url),
                    });
                }
            }
        }
    }
}

/// Maps a terminal non-2xx response to a [`FailureDetail`], preferring the
/// body's `message`/`error` fields over the raw text.
fn failure_from_response(status: u16, endpoint: &str, body: &str) -> FailureDetail {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    let error = parsed
        .as_ref()
        .and_then(|value| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "http_error".to_string());

    FailureDetail {
        error,
        message,
        status_code: Some(status),
        endpoint: Some(endpoint.to_string()),
    }
}

/// Submits payloads in fixed-size batches through `gateway`.
///
/// Records are sent sequentially inside each batch; `delay_between_batches`
/// is applied between batches only, never after the last one. An `Invalid`
/// payload is recorded as an `invalid_input` failure without a network call.
pub async fn deliver<G>(
    gateway: &G,
    payloads: &[Payload],
    batch_size: usize,
    delay_between_batches: Duration,
) -> BatchReport
where
    G: CustomerGateway + ?Sized,
{
    let batch_size = batch_size.max(1);
    let mut report = BatchReport::default();

    for (batch_index, batch) in payloads.chunks(batch_size).enumerate() {
        debug!("delivering batch {} ({} records)", batch_index + 1, batch.len());

        for payload in batch {
            match payload {
                Payload::Invalid(record) => {
                    report.failed.push(DeliveryFailure {
                        customer: None,
                        error_details: FailureDetail {
                            error: "invalid_input".to_string(),
                            message: format!(
                                "Received an error record instead of customer data: {}",
                                record.message
                            ),
                            status_code: None,
                            endpoint: None,
                        },
                    });
                    report.total_failed += 1;
                }
                Payload::Customer(customer) => match gateway.create(customer).await {
                    Ok(api_response) => {
                        report.successful.push(DeliverySuccess {
                            customer: customer.clone(),
                            api_response,
                        });
                        report.total_successful += 1;
                    }
                    Err(error_details) => {
                        report.failed.push(DeliveryFailure {
                            customer: Some(customer.clone()),
                            error_details,
                        });
                        report.total_failed += 1;
                    }
                },
            }
            report.total_processed += 1;
        }

        let sent = (batch_index + 1) * batch_size;
        if sent < payloads.len() {
            tokio::time::sleep(delay_between_batches).await;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::{
        CustomerGateway, DEFAULT_BATCH_SIZE, FailureDetail, Payload, deliver,
        failure_from_response,
    };
    use crate::core::customer::Customer;
    use crate::error::{ErrorKind, ErrorRecord};

    /// Gateway that records call order and fails every email it is told to.
    struct ScriptedGateway {
        calls: Mutex<Vec<String>>,
        failing_emails: Vec<String>,
    }

    impl ScriptedGateway {
        fn new(failing_emails: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing_emails: failing_emails.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl CustomerGateway for ScriptedGateway {
        async fn ping(&self) -> Result<(), FailureDetail> {
            Ok(())
        }

        async fn create(&self, customer: &Customer) -> Result<Value, FailureDetail> {
            self.calls.lock().unwrap().push(customer.email.clone());
            if self.failing_emails.contains(&customer.email) {
                Err(FailureDetail {
                    error: "http_error".to_string(),
                    message: "boom".to_string(),
                    status_code: Some(422),
                    endpoint: None,
                })
            } else {
                Ok(json!({"id": customer.email}))
            }
        }
    }

    fn customer(email: &str) -> Customer {
        Customer {
            email: email.to_string(),
            ..Customer::default()
        }
    }

    #[tokio::test]
    async fn counters_always_balance() {
        let gateway = ScriptedGateway::new(&["b@x.com"]);
        let payloads = vec![
            Payload::Customer(customer("a@x.com")),
            Payload::Customer(customer("b@x.com")),
            Payload::Customer(customer("c@x.com")),
        ];

        let report = deliver(&gateway, &payloads, DEFAULT_BATCH_SIZE, Duration::ZERO).await;

        assert_eq!(report.total_processed, 3);
        assert_eq!(report.total_successful, 2);
        assert_eq!(report.total_failed, 1);
        assert_eq!(
            report.total_processed,
            report.successful.len() + report.failed.len()
        );
        assert_eq!(report.failed[0].customer.as_ref().unwrap().email, "b@x.com");
    }

    #[tokio::test]
    async fn error_records_are_rejected_without_a_network_call() {
        let gateway = ScriptedGateway::new(&[]);
        let payloads = vec![
            Payload::Invalid(
                ErrorRecord::new(ErrorKind::ValidationError, "Invalid email").with_row(2),
            ),
            Payload::Customer(customer("a@x.com")),
        ];

        let report = deliver(&gateway, &payloads, DEFAULT_BATCH_SIZE, Duration::ZERO).await;

        assert_eq!(report.total_processed, 2);
        assert_eq!(report.total_failed, 1);
        assert_eq!(report.failed[0].error_details.error, "invalid_input");
        assert!(report.failed[0].customer.is_none());
        // Only the real customer reached the gateway.
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_five_records_make_three_batches_with_two_pauses() {
        let gateway = ScriptedGateway::new(&[]);
        let payloads: Vec<Payload> = (0..25)
            .map(|i| Payload::Customer(customer(&format!("c{i}@x.com"))))
            .collect();
        let delay = Duration::from_millis(100);

        let started = tokio::time::Instant::now();
        let report = deliver(&gateway, &payloads, 10, delay).await;

        assert_eq!(report.total_processed, 25);
        assert_eq!(report.total_successful, 25);
        // The inter-batch delay ran exactly twice: after batch 1 and batch 2.
        assert_eq!(started.elapsed(), delay * 2);

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 25);
        assert_eq!(calls[0], "c0@x.com");
        assert_eq!(calls[24], "c24@x.com");
    }

    #[tokio::test]
    async fn zero_batch_size_falls_back_to_one_record_batches() {
        let gateway = ScriptedGateway::new(&[]);
        let payloads = vec![Payload::Customer(customer("a@x.com"))];

        let report = deliver(&gateway, &payloads, 0, Duration::ZERO).await;
        assert_eq!(report.total_successful, 1);
    }

    #[test]
    fn failure_detail_prefers_the_body_fields() {
        let detail = failure_from_response(
            422,
            "https://api/customers",
            r#"{"error": "duplicate_email", "message": "Email already exists"}"#,
        );

        assert_eq!(detail.error, "duplicate_email");
        assert_eq!(detail.message, "Email already exists");
        assert_eq!(detail.status_code, Some(422));
        assert_eq!(detail.endpoint.as_deref(), Some("https://api/customers"));
    }

    #[test]
    fn failure_detail_falls_back_to_raw_text() {
        let detail = failure_from_response(500, "https://api/customers", "Internal Server Error");

        assert_eq!(detail.error, "http_error");
        assert_eq!(detail.message, "Internal Server Error");
    }
}
