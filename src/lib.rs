// contacts-relay - asynchronous command relay for contact CRUD operations
//
// Producers publish method/route/message envelopes to RabbitMQ; consumers
// route them to a domain port and acknowledge each delivery.

// Re-export the domain port
pub use contacts_domain;

// Re-export messaging
pub use contacts_messaging;

// Re-export optional crates
#[cfg(feature = "config")]
pub use contacts_config;

/// Re-export commonly used types
pub mod prelude {
    pub use contacts_domain::prelude::*;
    pub use contacts_messaging::prelude::*;

    #[cfg(feature = "config")]
    pub use contacts_config::RelayConfig;
}
