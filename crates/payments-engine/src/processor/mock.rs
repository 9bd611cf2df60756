//! Mock Payment Processor
//!
//! For testing and demo purposes. Keeps intents in memory and lets callers
//! play the processor's part (confirming, failing, slowing down).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{NewIntent, PaymentProcessor, ProcessorIntent, ProcessorStatus};
use crate::error::{PaymentError, Result};
use crate::intent::{ClientSecret, IntentId};

/// In-memory processor with scriptable behaviour
pub struct MockProcessor {
    intents: Mutex<HashMap<IntentId, ProcessorIntent>>,

    /// Idempotency key -> intent minted for it
    idempotency: Mutex<HashMap<String, IntentId>>,

    /// Number of outbound calls received
    calls: AtomicUsize,

    /// When set, every call fails with this message
    failure: Mutex<Option<String>>,

    /// Artificial latency per call
    delay: Mutex<Option<Duration>>,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessor {
    pub fn new() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            idempotency: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
        }
    }

    /// Create a processor whose calls all fail with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        let processor = Self::new();
        processor.fail_with(Some(message.into()));
        processor
    }

    /// Set or clear the failure message
    pub fn fail_with(&self, message: Option<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = message;
        }
    }

    /// Delay every call (for timeout tests)
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut current) = self.delay.lock() {
            *current = delay;
        }
    }

    /// Play the processor side of a confirmation
    pub fn set_status(&self, id: &IntentId, status: ProcessorStatus) -> Result<()> {
        let mut intents = self.lock_intents()?;
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| PaymentError::Processor(format!("No such payment_intent: '{id}'")))?;
        intent.status = status;
        Ok(())
    }

    /// Number of outbound calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_intents(&self) -> Result<std::sync::MutexGuard<'_, HashMap<IntentId, ProcessorIntent>>> {
        self.intents
            .lock()
            .map_err(|_| PaymentError::Processor("mock processor lock poisoned".into()))
    }

    async fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        match failure {
            Some(message) => Err(PaymentError::Processor(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_intent(&self, request: &NewIntent) -> Result<ProcessorIntent> {
        self.begin_call().await?;

        if let Some(key) = &request.idempotency_key {
            let existing = self
                .idempotency
                .lock()
                .ok()
                .and_then(|keys| keys.get(key).cloned());
            if let Some(id) = existing {
                if let Some(intent) = self.lock_intents()?.get(&id) {
                    return Ok(intent.clone());
                }
            }
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        let id = IntentId::new(format!("pi_mock_{}", &token[..24]));
        let intent = ProcessorIntent {
            id: id.clone(),
            client_secret: Some(ClientSecret::new(format!("{id}_secret_{}", &token[24..]))),
            amount: request.amount,
            currency: request.currency.as_str().to_string(),
            description: Some(request.description.clone()),
            metadata: request.metadata.clone(),
            status: ProcessorStatus::RequiresPaymentMethod,
        };

        self.lock_intents()?.insert(id.clone(), intent.clone());
        if let (Some(key), Ok(mut keys)) = (&request.idempotency_key, self.idempotency.lock()) {
            keys.insert(key.clone(), id);
        }

        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &IntentId) -> Result<ProcessorIntent> {
        self.begin_call().await?;

        self.lock_intents()?
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::Processor(format!("No such payment_intent: '{id}'")))
    }

    async fn cancel_intent(&self, id: &IntentId) -> Result<ProcessorIntent> {
        self.begin_call().await?;

        let mut intents = self.lock_intents()?;
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| PaymentError::Processor(format!("No such payment_intent: '{id}'")))?;

        if intent.status == ProcessorStatus::Succeeded {
            return Err(PaymentError::Processor(
                "You cannot cancel this PaymentIntent because it has a status of succeeded.".into(),
            ));
        }

        intent.status = ProcessorStatus::Canceled;
        Ok(intent.clone())
    }

    fn name(&self) -> &str {
        "MockProcessor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Currency;

    fn request(key: Option<&str>) -> NewIntent {
        NewIntent {
            amount: 2999,
            currency: Currency::parse(None, "usd").unwrap(),
            description: "Payment".into(),
            metadata: HashMap::new(),
            idempotency_key: key.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_mock_processor() {
        let processor = MockProcessor::new();

        let intent = processor.create_intent(&request(None)).await.unwrap();
        assert!(intent.id.as_str().starts_with("pi_mock_"));
        assert!(intent.client_secret.is_some());

        processor.set_status(&intent.id, ProcessorStatus::Succeeded).unwrap();
        let fetched = processor.retrieve_intent(&intent.id).await.unwrap();
        assert_eq!(fetched.status, ProcessorStatus::Succeeded);
        assert_eq!(processor.calls(), 2);
    }

    #[tokio::test]
    async fn test_idempotency_key_reuses_intent() {
        let processor = MockProcessor::new();

        let first = processor.create_intent(&request(Some("order-42"))).await.unwrap();
        let second = processor.create_intent(&request(Some("order-42"))).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_failing_processor() {
        let processor = MockProcessor::failing("card_declined");
        let err = processor.create_intent(&request(None)).await.unwrap_err();
        assert!(matches!(err, PaymentError::Processor(msg) if msg == "card_declined"));
    }
}
