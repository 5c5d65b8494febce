//! HTTP client for the remote back-office services.
//!
//! Talks to the branch gateway, which fronts both the calculation service
//! and the commit service behind the resilient network client. A `503`
//! with code `circuit_open` means the gateway's breaker refused the call.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::session::{OperationType, PaymentRecord};
use crate::ticket::TicketNo;

use super::{
    CalculationResult, CalculationService, CommitRequest, CommitService, ServiceError,
    TransactionResult, ValidationResult,
};

fn default_timeout() -> u32 {
    30
}

/// Connection settings for the remote back-office gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteServiceConfig {
    /// Gateway base URL, e.g. "http://head-office:9200".
    pub base_url: String,
    /// Terminal API key, sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// HTTP implementation of both remote service contracts.
pub struct HttpBackOfficeClient {
    client: Client,
    config: RemoteServiceConfig,
}

#[derive(Serialize)]
struct ValidateBody<'a> {
    operation: OperationType,
    tickets: &'a [TicketNo],
    #[serde(skip_serializing_if = "Option::is_none")]
    payment: Option<&'a PaymentRecord>,
}

#[derive(Serialize)]
struct CalculateBody<'a> {
    operation: OperationType,
    tickets: &'a [TicketNo],
    #[serde(skip_serializing_if = "Option::is_none")]
    as_of: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RemoteErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpBackOfficeClient {
    /// Create a new client for the given gateway.
    pub fn new(config: RemoteServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let url = self.url(path);
        debug!(url = %url, "Calling back-office gateway");

        let mut request = self.client.post(&url).json(body);
        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Network("request timed out".to_string())
            } else {
                ServiceError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| ServiceError::InvalidResponse(e.to_string()));
        }

        let error_body: RemoteErrorBody = response.json().await.unwrap_or(RemoteErrorBody {
            code: None,
            message: None,
        });

        Err(classify_error(status.as_u16(), error_body))
    }
}

/// Map a non-success gateway response to a service error.
fn classify_error(status: u16, body: RemoteErrorBody) -> ServiceError {
    let message = body.message.unwrap_or_else(|| "no message".to_string());
    match status {
        503 if body.code.as_deref() == Some("circuit_open") => ServiceError::CircuitOpen,
        401 | 403 => ServiceError::Unauthorized(message),
        _ => ServiceError::Remote { status, message },
    }
}

#[async_trait]
impl CalculationService for HttpBackOfficeClient {
    async fn validate(
        &self,
        operation: OperationType,
        tickets: &[TicketNo],
        payment: Option<&PaymentRecord>,
    ) -> Result<ValidationResult, ServiceError> {
        self.post_json(
            "/api/v1/calc/validate",
            &ValidateBody {
                operation,
                tickets,
                payment,
            },
        )
        .await
    }

    async fn calculate(
        &self,
        operation: OperationType,
        tickets: &[TicketNo],
        as_of: Option<NaiveDate>,
    ) -> Result<CalculationResult, ServiceError> {
        self.post_json(
            "/api/v1/calc/calculate",
            &CalculateBody {
                operation,
                tickets,
                as_of,
            },
        )
        .await
    }
}

#[async_trait]
impl CommitService for HttpBackOfficeClient {
    async fn commit_renewal(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.post_json("/api/v1/commit/renewal", request).await
    }

    async fn commit_redemption(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.post_json("/api/v1/commit/redemption", request).await
    }

    async fn commit_lost_report(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.post_json("/api/v1/commit/lost-report", request).await
    }

    async fn commit_combined(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.post_json("/api/v1/commit/combined", request).await
    }
}
