//! Stripe charges API client.
//!
//! Creates charges with `POST /v1/charges` from a card token. Every request
//! carries an `Idempotency-Key`, so a retry after a timeout returns the
//! original charge instead of creating a second one.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use sick_fits_core::Money;

use super::{Charge, ChargeRequest, PaymentError, PaymentProcessor};
use crate::config::StripeConfig;

/// Errors building the client.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP client failed to build.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration is unusable.
    #[error("invalid Stripe configuration: {0}")]
    Config(String),
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    id: String,
    amount: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    code: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    charges_url: Url,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("charges_url", &self.charges_url.as_str())
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Config(format!("invalid secret key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let charges_url = config
            .api_base
            .join("/v1/charges")
            .map_err(|e| StripeError::Config(format!("invalid API base: {e}")))?;

        Ok(Self {
            client,
            charges_url,
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[tracing::instrument(
        skip(self, request),
        fields(amount = %request.amount, idempotency_key = %request.idempotency_key)
    )]
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        let response = self
            .client
            .post(self.charges_url.clone())
            .header("Idempotency-Key", request.idempotency_key.to_string())
            .form(&charge_params(request))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_status(status, error_message(&body));
            tracing::warn!(status = status.as_u16(), error = %error, "Stripe rejected charge");
            return Err(error);
        }

        let charge: StripeCharge = response.json().await.map_err(|e| {
            PaymentError::StatusUnknown(format!("unreadable charge response: {e}"))
        })?;

        match charge.status.as_str() {
            "succeeded" => {
                tracing::info!(charge_id = %charge.id, "Charge succeeded");
                Ok(Charge {
                    id: charge.id,
                    amount: Money::from_minor(charge.amount),
                })
            }
            "pending" => Err(PaymentError::StatusUnknown(format!(
                "charge {} is still pending",
                charge.id
            ))),
            other => Err(PaymentError::Declined(format!(
                "charge {} ended {other}",
                charge.id
            ))),
        }
    }
}

fn charge_params(request: &ChargeRequest) -> [(&'static str, String); 4] {
    [
        ("amount", request.amount.minor_units().to_string()),
        ("currency", request.currency.code().to_ascii_lowercase()),
        ("source", request.token.clone()),
        ("description", "Sick Fits order".to_string()),
    ]
}

/// Whether a failed send may still have reached Stripe.
fn classify_transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        return PaymentError::StatusUnknown(format!("request timed out: {err}"));
    }
    if err.is_connect() || err.is_builder() {
        return PaymentError::Failed(format!("could not reach Stripe: {err}"));
    }
    PaymentError::StatusUnknown(err.to_string())
}

fn classify_status(status: StatusCode, message: String) -> PaymentError {
    if status == StatusCode::PAYMENT_REQUIRED {
        PaymentError::Declined(message)
    } else if status.is_client_error() {
        PaymentError::Failed(message)
    } else {
        PaymentError::StatusUnknown(format!("Stripe returned {status}: {message}"))
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => match (parsed.error.message, parsed.error.code) {
            (Some(message), _) => message,
            (None, Some(code)) => code,
            (None, None) => "unknown error".to_string(),
        },
        Err(_) if body.is_empty() => "empty response".to_string(),
        Err(_) => body.to_string(),
    }
}
