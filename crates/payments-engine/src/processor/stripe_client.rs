//! Stripe Payment Intents
//!
//! Implements the "Stripe Elements (Embedded)" flow: the server mints a
//! PaymentIntent and hands its client secret to the browser, which confirms
//! the payment directly with Stripe.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use stripe::{
    CancelPaymentIntent, Client, CreatePaymentIntent,
    CreatePaymentIntentAutomaticPaymentMethods, PaymentIntent, PaymentIntentId,
    RequestStrategy,
};

use super::{NewIntent, PaymentProcessor, ProcessorIntent, ProcessorStatus};
use crate::error::{PaymentError, Result};
use crate::intent::{ClientSecret, IntentId};

/// Stripe client wrapper
pub struct StripeProcessor {
    client: Client,
}

impl StripeProcessor {
    /// Create a new Stripe processor
    pub fn new(secret_key: &SecretString) -> Self {
        Self {
            client: Client::new(secret_key.expose_secret()),
        }
    }

    fn parse_id(id: &IntentId) -> Result<PaymentIntentId> {
        id.as_str()
            .parse::<PaymentIntentId>()
            .map_err(|e| PaymentError::Processor(format!("Invalid payment intent id: {e}")))
    }
}

fn stripe_error(e: &stripe::StripeError) -> PaymentError {
    PaymentError::Processor(e.to_string())
}

impl From<PaymentIntent> for ProcessorIntent {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: IntentId::new(intent.id.to_string()),
            client_secret: intent.client_secret.map(ClientSecret::new),
            amount: intent.amount,
            currency: intent.currency.to_string(),
            description: intent.description,
            metadata: intent.metadata.into_iter().collect(),
            // Stripe statuses are a closed set; unknown ones mean "still in flight"
            status: ProcessorStatus::parse(intent.status.as_str())
                .unwrap_or(ProcessorStatus::Processing),
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_intent(&self, request: &NewIntent) -> Result<ProcessorIntent> {
        let currency = request
            .currency
            .as_str()
            .parse::<stripe::Currency>()
            .map_err(|_| PaymentError::InvalidCurrency(format!(
                "Currency '{}' is not supported by Stripe.",
                request.currency
            )))?;

        let mut params = CreatePaymentIntent::new(request.amount, currency);
        params.description = Some(request.description.as_str());
        params.metadata = Some(request.metadata.clone());
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            allow_redirects: None,
        });

        // Idempotent requests let Stripe collapse caller retries into one intent
        let client = match &request.idempotency_key {
            Some(key) => self.client.clone().with_strategy(RequestStrategy::Idempotent(key.clone())),
            None => self.client.clone(),
        };

        let intent = PaymentIntent::create(&client, params)
            .await
            .map_err(|e| stripe_error(&e))?;

        Ok(intent.into())
    }

    async fn retrieve_intent(&self, id: &IntentId) -> Result<ProcessorIntent> {
        let id = Self::parse_id(id)?;

        let intent = PaymentIntent::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| stripe_error(&e))?;

        Ok(intent.into())
    }

    async fn cancel_intent(&self, id: &IntentId) -> Result<ProcessorIntent> {
        let id = Self::parse_id(id)?;

        let intent = PaymentIntent::cancel(&self.client, &id, CancelPaymentIntent::default())
            .await
            .map_err(|e| stripe_error(&e))?;

        Ok(intent.into())
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}
