//! In-memory contact store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ContactOperations;
use crate::contact::{Contact, ContactPayload};
use crate::error::{DomainError, DomainResult};

/// Contact store backed by an ordered map.
///
/// Ids are assigned sequentially from 1 and never reused. Once the id space
/// is spent, creation fails with [`DomainError::Unavailable`].
#[derive(Debug)]
pub struct InMemoryContacts {
    contacts: RwLock<BTreeMap<i32, Contact>>,
    next_id: AtomicI32,
}

impl InMemoryContacts {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            contacts: RwLock::new(BTreeMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    #[cfg(test)]
    fn with_next_id(next_id: i32) -> Self {
        Self {
            contacts: RwLock::new(BTreeMap::new()),
            next_id: AtomicI32::new(next_id),
        }
    }

    /// Number of stored contacts
    pub async fn len(&self) -> usize {
        self.contacts.read().await.len()
    }

    /// Whether the store holds no contacts
    pub async fn is_empty(&self) -> bool {
        self.contacts.read().await.is_empty()
    }
}

impl Default for InMemoryContacts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactOperations for InMemoryContacts {
    async fn create(&self, payload: ContactPayload) -> DomainResult<Contact> {
        payload.ensure_complete()?;

        let id = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| DomainError::Unavailable("contact ids exhausted".to_string()))?;
        let contact = Contact::from_payload(id, payload);
        self.contacts.write().await.insert(id, contact.clone());

        debug!(contact_id = id, "Contact stored");
        Ok(contact)
    }

    async fn update(&self, id: i32, payload: ContactPayload) -> DomainResult<Contact> {
        payload.ensure_complete()?;

        let mut contacts = self.contacts.write().await;
        let contact = contacts.get_mut(&id).ok_or(DomainError::NotFound(id))?;
        contact.apply(payload);

        debug!(contact_id = id, "Contact updated");
        Ok(contact.clone())
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        let mut contacts = self.contacts.write().await;
        if contacts.remove(&id).is_none() {
            return Err(DomainError::NotFound(id));
        }

        debug!(contact_id = id, "Contact removed");
        Ok(())
    }

    async fn list(&self, region_code: Option<&str>) -> DomainResult<Vec<Contact>> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .values()
            .filter(|c| region_code.is_none_or(|code| c.region_code == code))
            .cloned()
            .collect())
    }

    async fn get(&self, id: i32) -> DomainResult<Option<Contact>> {
        Ok(self.contacts.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str, region: &str) -> ContactPayload {
        ContactPayload::new(name, "11999999999", "someone@example.com", region)
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = InMemoryContacts::new();
        let first = store.create(payload("Ana", "011")).await.unwrap();
        let second = store.create(payload("Bia", "021")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let store = InMemoryContacts::new();
        let result = store.create(payload("", "011")).await;

        assert!(matches!(result, Err(DomainError::Invalid(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_fails_once_ids_run_out() {
        let store = InMemoryContacts::with_next_id(i32::MAX - 1);
        let last = store.create(payload("Ana", "011")).await.unwrap();
        assert_eq!(last.id, i32::MAX - 1);

        for _ in 0..2 {
            let result = store.create(payload("Bia", "011")).await;
            assert!(matches!(result, Err(DomainError::Unavailable(_))));
        }
        assert_eq!(store.len().await, 1);
        assert!(store.get(i32::MIN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_contact() {
        let store = InMemoryContacts::new();
        let result = store.update(999, payload("Ana", "011")).await;

        assert_eq!(result, Err(DomainError::NotFound(999)));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryContacts::new();
        let created = store.create(payload("Ana", "011")).await.unwrap();

        store.delete(created.id).await.unwrap();
        assert_eq!(store.get(created.id).await.unwrap(), None);
        assert_eq!(
            store.delete(created.id).await,
            Err(DomainError::NotFound(created.id))
        );
    }

    #[tokio::test]
    async fn test_list_by_region() {
        let store = InMemoryContacts::new();
        store.create(payload("Ana", "011")).await.unwrap();
        store.create(payload("Bia", "021")).await.unwrap();
        store.create(payload("Caio", "011")).await.unwrap();

        let all = store.list(None).await.unwrap();
        let sp = store.list(Some("011")).await.unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(sp.len(), 2);
        assert!(sp.iter().all(|c| c.region_code == "011"));
    }
}
