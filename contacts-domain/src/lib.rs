//! # Contacts Domain
//!
//! The domain operation port consumed by the contacts command dispatcher.
//!
//! The dispatcher only knows the [`ContactOperations`] trait; how contacts are
//! stored is up to the implementation. [`InMemoryContacts`] is provided as a
//! reference adapter for tests and local runs.
//!
//! ## Example
//!
//! ```rust
//! use contacts_domain::{ContactOperations, ContactPayload, InMemoryContacts};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryContacts::new();
//! let created = store
//!     .create(ContactPayload::new("Ana", "11999999999", "a@b.com", "011"))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(created.id, 1);
//! assert_eq!(store.list(Some("011")).await.unwrap().len(), 1);
//! # });
//! ```

use async_trait::async_trait;

pub mod contact;
pub mod error;
pub mod memory;

pub use contact::{Contact, ContactPayload};
pub use error::{DomainError, DomainResult};
pub use memory::InMemoryContacts;

/// Domain operations invoked by the command dispatcher.
///
/// Implementations must tolerate concurrent calls for distinct ids; the
/// dispatcher does not serialize operations on the same id.
#[async_trait]
pub trait ContactOperations: Send + Sync {
    /// Store a new contact and return it with its assigned id
    async fn create(&self, payload: ContactPayload) -> DomainResult<Contact>;

    /// Replace the contact's fields, failing with [`DomainError::NotFound`] if absent
    async fn update(&self, id: i32, payload: ContactPayload) -> DomainResult<Contact>;

    /// Remove the contact, failing with [`DomainError::NotFound`] if absent
    async fn delete(&self, id: i32) -> DomainResult<()>;

    /// List contacts, optionally restricted to one region code
    async fn list(&self, region_code: Option<&str>) -> DomainResult<Vec<Contact>>;

    /// Look up a single contact
    async fn get(&self, id: i32) -> DomainResult<Option<Contact>>;
}

#[async_trait]
impl<T: ContactOperations + ?Sized> ContactOperations for std::sync::Arc<T> {
    async fn create(&self, payload: ContactPayload) -> DomainResult<Contact> {
        (**self).create(payload).await
    }

    async fn update(&self, id: i32, payload: ContactPayload) -> DomainResult<Contact> {
        (**self).update(id, payload).await
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        (**self).delete(id).await
    }

    async fn list(&self, region_code: Option<&str>) -> DomainResult<Vec<Contact>> {
        (**self).list(region_code).await
    }

    async fn get(&self, id: i32) -> DomainResult<Option<Contact>> {
        (**self).get(id).await
    }
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ContactOperations;
    pub use crate::contact::{Contact, ContactPayload};
    pub use crate::error::{DomainError, DomainResult};
    pub use crate::memory::InMemoryContacts;
}
