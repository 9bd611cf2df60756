//! End-to-end intent lifecycle: create, confirm, webhook, settle.

use std::sync::Arc;
use std::time::Duration;

use payments_engine::processor::ProcessorStatus;
use payments_engine::signature::signature_header;
use payments_engine::{
    CreateIntentRequest, IntentId, IntentOrchestrator, IntentState, IntentStore, MemoryIntentStore,
    MockProcessor, PaymentError, PaymentsConfig, ReconcileOutcome, SignatureVerifier,
    WebhookReconciler,
};
use secrecy::SecretString;
use serde_json::json;

const SECRET: &str = "whsec_lifecycle_secret";

struct Harness {
    processor: Arc<MockProcessor>,
    orchestrator: Arc<IntentOrchestrator<MemoryIntentStore>>,
    verifier: SignatureVerifier,
    reconciler: WebhookReconciler<MemoryIntentStore>,
}

fn harness() -> Harness {
    let config = PaymentsConfig::default().with_webhook_secret(SECRET);
    let processor = Arc::new(MockProcessor::new());
    let orchestrator = Arc::new(IntentOrchestrator::new(
        Arc::new(MemoryIntentStore::new()),
        processor.clone(),
        &config,
    ));

    Harness {
        processor,
        orchestrator: orchestrator.clone(),
        verifier: SignatureVerifier::new(
            Some(SecretString::new(SECRET.into())),
            config.webhook_tolerance,
        ),
        reconciler: WebhookReconciler::new(orchestrator),
    }
}

fn payload(event_type: &str, id: &IntentId, amount: i64) -> Vec<u8> {
    json!({
        "id": format!("evt_{}", event_type.len()),
        "object": "event",
        "type": event_type,
        "data": { "object": {
            "id": id.as_str(),
            "object": "payment_intent",
            "amount": amount,
            "currency": "usd",
            "metadata": { "productId": "prod_1" }
        }}
    })
    .to_string()
    .into_bytes()
}

async fn deliver(h: &Harness, secret: &str, body: &[u8]) -> payments_engine::Result<ReconcileOutcome> {
    let now = chrono::Utc::now().timestamp();
    let header = signature_header(secret, now, body)?;
    let event = h.verifier.verify(body, &header)?;
    Ok(h.reconciler.reconcile(&event).await?.outcome)
}

#[tokio::test]
async fn scenario_a_create_confirm_webhook_succeeds() {
    let h = harness();

    let created = h
        .orchestrator
        .create_intent(CreateIntentRequest::new(2999, "usd"))
        .await
        .unwrap();
    assert!(!created.client_secret.expose().is_empty());

    let status = h.orchestrator.get_status(&created.id).await.unwrap();
    assert_eq!(status.state, IntentState::Created);

    // Processor confirms with the client, then notifies us
    h.processor.set_status(&created.id, ProcessorStatus::Succeeded).unwrap();
    let outcome = deliver(&h, SECRET, &payload("payment_intent.succeeded", &created.id, 2999))
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Applied { to: IntentState::Succeeded, .. }));

    let status = h.orchestrator.get_status(&created.id).await.unwrap();
    assert_eq!(status.state, IntentState::Succeeded);

    // The status view never carries the client secret
    let json = serde_json::to_string(&status).unwrap();
    assert!(!json.contains(created.client_secret.expose()));
}

#[tokio::test]
async fn scenario_b_amount_below_minimum() {
    let h = harness();

    let err = h
        .orchestrator
        .create_intent(CreateIntentRequest::new(49, "usd"))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::InvalidAmount(_)));
    assert_eq!(h.processor.calls(), 0);
    assert!(h.orchestrator.store().is_empty().unwrap());
}

#[tokio::test]
async fn scenario_c_wrong_secret_leaves_state_unchanged() {
    let h = harness();
    let created = h
        .orchestrator
        .create_intent(CreateIntentRequest::new(2999, "usd"))
        .await
        .unwrap();

    let err = deliver(
        &h,
        "whsec_attacker",
        &payload("payment_intent.succeeded", &created.id, 2999),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PaymentError::Verification));
    let local = h.orchestrator.get(&created.id).unwrap().unwrap();
    assert_eq!(local.state, IntentState::Created);
}

#[tokio::test]
async fn reused_idempotency_key_keeps_settled_intent() {
    let h = harness();
    let request = || {
        let mut request = CreateIntentRequest::new(2999, "usd");
        request.idempotency_key = Some("order-42".into());
        request
    };

    let created = h.orchestrator.create_intent(request()).await.unwrap();
    deliver(&h, SECRET, &payload("payment_intent.succeeded", &created.id, 2999))
        .await
        .unwrap();

    let err = h.orchestrator.create_intent(request()).await.unwrap_err();
    assert!(matches!(err, PaymentError::Duplicate(_)));
    assert!(!err.user_message().contains(created.client_secret.expose()));

    let local = h.orchestrator.get(&created.id).unwrap().unwrap();
    assert_eq!(local.state, IntentState::Succeeded);
    assert_eq!(h.orchestrator.store().len().unwrap(), 1);
}

#[tokio::test]
async fn replayed_old_webhook_rejected() {
    let h = harness();
    let created = h
        .orchestrator
        .create_intent(CreateIntentRequest::new(2999, "usd"))
        .await
        .unwrap();

    let body = payload("payment_intent.succeeded", &created.id, 2999);
    let stale = chrono::Utc::now().timestamp() - 3600;
    let header = signature_header(SECRET, stale, &body).unwrap();

    assert!(h.verifier.verify(&body, &header).is_err());
    assert_eq!(
        h.orchestrator.get(&created.id).unwrap().unwrap().state,
        IntentState::Created
    );
}

#[tokio::test]
async fn terminal_state_is_order_independent() {
    for order in [["payment_intent.succeeded", "payment_intent.payment_failed"],
                  ["payment_intent.payment_failed", "payment_intent.succeeded"]] {
        let h = harness();
        let created = h
            .orchestrator
            .create_intent(CreateIntentRequest::new(2999, "usd"))
            .await
            .unwrap();

        for event_type in order {
            deliver(&h, SECRET, &payload(event_type, &created.id, 2999))
                .await
                .unwrap();
        }

        let expected = if order[0] == "payment_intent.succeeded" {
            IntentState::Succeeded
        } else {
            IntentState::Failed
        };
        assert_eq!(h.orchestrator.get(&created.id).unwrap().unwrap().state, expected);
    }
}

#[tokio::test]
async fn direct_confirmation_beats_late_failure_webhook() {
    let h = harness();
    let created = h
        .orchestrator
        .create_intent(CreateIntentRequest::new(2999, "usd"))
        .await
        .unwrap();

    // Poll observes success first
    h.processor.set_status(&created.id, ProcessorStatus::Succeeded).unwrap();
    h.orchestrator.get_status(&created.id).await.unwrap();

    // Then a stale failure arrives
    let outcome = deliver(&h, SECRET, &payload("payment_intent.payment_failed", &created.id, 2999))
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Unchanged { state: IntentState::Succeeded, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_settle_once() {
    let h = Arc::new(harness());
    let created = h
        .orchestrator
        .create_intent(CreateIntentRequest::new(2999, "usd"))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let h = h.clone();
        let id = created.id.clone();
        tasks.push(tokio::spawn(async move {
            let event_type = if i % 2 == 0 {
                "payment_intent.succeeded"
            } else {
                "payment_intent.payment_failed"
            };
            deliver(&h, SECRET, &payload(event_type, &id, 2999)).await.unwrap()
        }));
    }

    let mut applied = 0;
    for task in tasks {
        if matches!(task.await.unwrap(), ReconcileOutcome::Applied { .. }) {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert!(h.orchestrator.get(&created.id).unwrap().unwrap().state.is_terminal());
}

#[tokio::test]
async fn unconfigured_secret_rejects_webhooks() {
    let verifier = SignatureVerifier::new(None, Duration::from_secs(300));
    let body = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;
    let header = signature_header(SECRET, chrono::Utc::now().timestamp(), body).unwrap();

    assert!(matches!(verifier.verify(body, &header), Err(PaymentError::Verification)));
}
