//! Bridge to the external payment provider.

use std::time::Duration;

use rocket::http::Status;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::resp::problem::Problem;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider isn't configured")]
    Unconfigured,
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
    #[error("payment provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

impl From<PaymentError> for Problem {
    fn from(e: PaymentError) -> Self {
        tracing::error!("payment intent creation failed: {}", e);

        match e {
            PaymentError::InvalidAmount(_) => Problem::new(Status::BadRequest, "Invalid price."),
            _ => Problem::new(
                Status::InternalServerError,
                "Payment provider failed while processing request.",
            ),
        }
    }
}

/// A payment the client still has to confirm with the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[rocket::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a card payment intent for `amount` minor units of `currency`.
    async fn create_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct IntentForm<'a> {
    amount: i64,
    currency: &'a str,
    #[serde(rename = "payment_method_types[]")]
    payment_method_types: &'a str,
}

/// Stripe PaymentIntents API client.
pub struct StripeGateway {
    api_base: String,
    secret_key: Option<String>,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(api_base: impl ToString, secret_key: Option<String>) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(StripeGateway {
            api_base: api_base.to_string().trim_end_matches('/').to_string(),
            secret_key,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, PaymentError> {
        if config.payment_secret_key.is_none() {
            tracing::warn!("PAYMENT_SECRET_KEY isn't set. Payment intents will fail.");
        }
        StripeGateway::new(&config.payment_api_base, config.payment_secret_key.clone())
    }
}

#[rocket::async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, amount: i64, currency: &str) -> Result<PaymentIntent, PaymentError> {
        let secret_key = self.secret_key.as_ref().ok_or(PaymentError::Unconfigured)?;
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount(amount));
        }

        tracing::debug!("creating payment intent for {} {}", amount, currency);
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(secret_key)
            .form(&IntentForm {
                amount,
                currency,
                payment_method_types: "card",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "no error message".to_string());
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntent = response.json().await?;
        tracing::info!("created payment intent {}", intent.id);
        Ok(intent)
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeGateway;
    use super::*;

    #[rocket::async_test]
    async fn unconfigured_stripe_fails_without_network() {
        let gateway = StripeGateway::new("http://127.0.0.1:9/", None).unwrap();

        match gateway.create_intent(1000, "usd").await {
            Err(PaymentError::Unconfigured) => {}
            other => panic!("expected unconfigured gateway, got {:?}", other),
        }
    }

    #[rocket::async_test]
    async fn fake_gateway_issues_secrets() {
        let gateway = FakeGateway::default();
        let intent = gateway.create_intent(2500, "usd").await.unwrap();

        assert!(intent.client_secret.contains("2500"));
        assert!(gateway.create_intent(0, "usd").await.is_err());
    }

    #[test]
    fn provider_errors_become_server_errors() {
        let problem = Problem::from(PaymentError::Provider {
            status: 402,
            message: "card declined".to_string(),
        });
        assert_eq!(problem.status, Status::InternalServerError);

        let problem = Problem::from(PaymentError::InvalidAmount(0));
        assert_eq!(problem.status, Status::BadRequest);
    }
}
