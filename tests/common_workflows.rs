//! Integration tests for common relay workflows.
//!
//! Producer and consumer run against one in-process broker, the way the two
//! processes share RabbitMQ in production.

use std::sync::Arc;

use contacts_relay::contacts_messaging::{
    DEAD_LETTER_QUEUE_NAME, DispatchOutcome, QUEUE_NAME, decode,
};
use contacts_relay::prelude::*;

fn ana() -> ContactPayload {
    ContactPayload::new("Ana", "11999999999", "a@b.com", "011")
}

async fn run_until(worker: &ConsumerWorker, received: u64) {
    let stats = worker.stats();
    worker
        .run(async move {
            while stats.snapshot().received < received {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
}

// =============================================================================
// Producer / Consumer
// =============================================================================

#[tokio::test]
async fn test_create_update_delete_lifecycle() {
    let broker = InMemoryBroker::new();
    let session = BrokerSession::new(Arc::new(broker.clone()));
    let producer_channel = session.channel().await.unwrap();
    ensure_topology(producer_channel.as_ref()).await.unwrap();
    let publisher = CommandPublisher::new(producer_channel);

    let store = Arc::new(InMemoryContacts::new());
    let worker = ConsumerWorker::new(
        session.channel().await.unwrap(),
        Dispatcher::new(store.clone()),
    );

    publisher
        .publish(Method::Create, "contacts", Some(ana()))
        .await
        .unwrap();
    run_until(&worker, 1).await;
    let created = store.list(Some("011")).await.unwrap();
    assert_eq!(created.len(), 1);
    let id = created[0].id;

    let mut moved = ana();
    moved.region_code = "021".to_string();
    publisher
        .publish(Method::Update, &format!("contacts/{}", id), Some(moved))
        .await
        .unwrap();
    run_until(&worker, 2).await;
    assert!(store.list(Some("011")).await.unwrap().is_empty());
    assert_eq!(store.list(Some("021")).await.unwrap().len(), 1);

    publisher
        .publish(Method::Delete, &format!("contacts/{}", id), None)
        .await
        .unwrap();
    run_until(&worker, 3).await;
    assert!(store.is_empty().await);

    let stats = worker.stats().snapshot();
    assert_eq!(stats.applied, 3);
    assert_eq!(broker.unacked_count().await, 0);

    session.shutdown().await.unwrap();
    assert!(!session.is_healthy().await);
}

#[tokio::test]
async fn test_malformed_messages_only_reach_dead_letter_queue() {
    let broker = InMemoryBroker::new();
    let channel = broker.open_channel().unwrap();
    ensure_topology(&channel).await.unwrap();

    let garbage = br#"{"route":"contacts"}"#;
    channel
        .publish_bytes(
            &contacts_relay::contacts_messaging::PublishOptions::new("create")
                .exchange("contacts-exchange"),
            garbage,
        )
        .await
        .unwrap();

    let store = Arc::new(InMemoryContacts::new());
    let worker = ConsumerWorker::new(Arc::new(channel), Dispatcher::new(store.clone()));
    run_until(&worker, 1).await;

    assert_eq!(broker.queue_depth(QUEUE_NAME).await, 0);
    assert_eq!(
        broker.queued_bodies(DEAD_LETTER_QUEUE_NAME).await,
        vec![garbage.to_vec()]
    );
    assert!(store.is_empty().await);
}

// =============================================================================
// Envelope wire format
// =============================================================================

#[test]
fn test_envelope_wire_format_is_stable() {
    let envelope = Envelope::new(Method::Create, "contacts", Some(ana()));
    let bytes = contacts_relay::contacts_messaging::encode(&envelope).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["method"], "POST");
    assert_eq!(json["route"], "contacts");
    assert_eq!(json["message"]["regionCode"], "011");

    assert_eq!(decode(&bytes).unwrap(), envelope);
}

#[tokio::test]
async fn test_dispatch_without_broker() {
    let store = Arc::new(InMemoryContacts::new());
    let dispatcher = Dispatcher::new(store.clone());

    let outcome = dispatcher
        .dispatch(br#"{"method":"GET","route":"contacts/region/011","message":null}"#)
        .await;

    assert_eq!(outcome, DispatchOutcome::Applied(Method::Read));
}
