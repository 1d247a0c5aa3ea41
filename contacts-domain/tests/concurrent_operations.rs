//! Concurrent use of the in-memory store through the operation port.

use std::collections::HashSet;
use std::sync::Arc;

use contacts_domain::prelude::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_ids() {
    let store: Arc<dyn ContactOperations> = Arc::new(InMemoryContacts::new());

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create(ContactPayload::new(
                    format!("Contact {}", i),
                    "11999999999",
                    "c@example.com",
                    "011",
                ))
                .await
                .unwrap()
                .id
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }

    assert_eq!(ids.len(), 32);
    assert_eq!(store.list(None).await.unwrap().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_on_distinct_ids() {
    let store = Arc::new(InMemoryContacts::new());
    for i in 0..8 {
        store
            .create(ContactPayload::new(
                format!("Contact {}", i),
                "11999999999",
                "c@example.com",
                "011",
            ))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for id in 1..=8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .update(
                    id,
                    ContactPayload::new(format!("Updated {}", id), "11888888888", "u@example.com", "021"),
                )
                .await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(store.list(Some("021")).await.unwrap().len(), 8);
}
