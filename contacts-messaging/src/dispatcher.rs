//! Routing of decoded envelopes to domain operations.

use std::fmt;
use std::sync::Arc;

use contacts_domain::{ContactOperations, ContactPayload, DomainError};
use tracing::{debug, error, info, warn};

use crate::envelope::{self, Envelope, Method};
use crate::error::{MessagingError, MessagingResult};
use crate::message::Disposition;
use crate::route::{RouteTarget, parse_route};

/// Result of handling one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The domain operation ran and succeeded
    Applied(Method),
    /// Method not handled by this consumer
    Ignored(String),
    /// The route did not name a usable target
    RoutingFailed(String),
    /// The domain operation ran and failed
    DomainFailed(DomainError),
    /// The body is not a well-formed envelope
    Malformed(String),
}

impl DispatchOutcome {
    /// How the delivery should be settled.
    ///
    /// Only undecodable bodies are rejected (and dead-lettered); routing and
    /// domain failures are acknowledged so the message is not redelivered.
    pub fn disposition(&self) -> Disposition {
        match self {
            DispatchOutcome::Malformed(_) => Disposition::Reject,
            _ => Disposition::Ack,
        }
    }

    /// Whether the domain operation succeeded
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchOutcome::Applied(_))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Applied(method) => write!(f, "applied {}", method),
            DispatchOutcome::Ignored(verb) => write!(f, "ignored method {}", verb),
            DispatchOutcome::RoutingFailed(reason) => write!(f, "routing failed: {}", reason),
            DispatchOutcome::DomainFailed(err) => write!(f, "domain failed: {}", err),
            DispatchOutcome::Malformed(reason) => write!(f, "malformed: {}", reason),
        }
    }
}

/// Decodes message bodies and invokes the matching [`ContactOperations`] call.
#[derive(Clone)]
pub struct Dispatcher {
    operations: Arc<dyn ContactOperations>,
}

impl Dispatcher {
    /// Create a dispatcher over a domain port
    pub fn new(operations: Arc<dyn ContactOperations>) -> Self {
        Self { operations }
    }

    /// Handle a raw message body
    pub async fn dispatch(&self, body: &[u8]) -> DispatchOutcome {
        match envelope::decode(body) {
            Ok(envelope) => self.dispatch_envelope(envelope).await,
            Err(e) => {
                error!(error = %e, bytes = body.len(), "Discarding undecodable message");
                DispatchOutcome::Malformed(e.to_string())
            }
        }
    }

    /// Handle a decoded envelope
    pub async fn dispatch_envelope(&self, envelope: Envelope) -> DispatchOutcome {
        let Envelope {
            method,
            route,
            message,
        } = envelope;
        let method = method.canonical();

        debug!(method = %method, route = %route, "Dispatching command");

        let result = match &method {
            Method::Create => self.create(message).await,
            Method::Update => self.update(&route, message).await,
            Method::Delete => self.delete(&route).await,
            Method::Read => self.read(&route).await,
            Method::Unrecognized(verb) => {
                warn!(method = %verb, route = %route, "Unrecognized method");
                return DispatchOutcome::Ignored(verb.clone());
            }
        };

        match result {
            Ok(()) => DispatchOutcome::Applied(method),
            Err(MessagingError::Routing(reason)) => {
                error!(method = %method, route = %route, reason = %reason, "Invalid route");
                DispatchOutcome::RoutingFailed(reason)
            }
            Err(MessagingError::Domain(err)) => {
                error!(method = %method, route = %route, error = %err, "Domain operation failed");
                DispatchOutcome::DomainFailed(err)
            }
            Err(other) => {
                error!(method = %method, route = %route, error = %other, "Malformed command");
                DispatchOutcome::Malformed(other.to_string())
            }
        }
    }

    async fn create(&self, message: Option<ContactPayload>) -> MessagingResult<()> {
        let payload = required(message, &Method::Create)?;
        let contact = self.operations.create(payload).await?;
        info!(id = contact.id, "Contact created");
        Ok(())
    }

    async fn update(&self, route: &str, message: Option<ContactPayload>) -> MessagingResult<()> {
        let id = target_id(route)?;
        let payload = required(message, &Method::Update)?;
        self.operations.update(id, payload).await?;
        info!(id, "Contact updated");
        Ok(())
    }

    async fn delete(&self, route: &str) -> MessagingResult<()> {
        let id = target_id(route)?;
        self.operations.delete(id).await?;
        info!(id, "Contact deleted");
        Ok(())
    }

    async fn read(&self, route: &str) -> MessagingResult<()> {
        match parse_route(route)?.target {
            RouteTarget::Collection => {
                let contacts = self.operations.list(None).await?;
                info!(count = contacts.len(), "Contacts listed");
            }
            RouteTarget::Region(code) => {
                let contacts = self.operations.list(Some(&code)).await?;
                info!(region_code = %code, count = contacts.len(), "Contacts listed by region");
            }
            RouteTarget::Id(id) => match self.operations.get(id).await? {
                Some(contact) => info!(id, name = %contact.name, "Contact found"),
                None => return Err(DomainError::NotFound(id).into()),
            },
        }
        Ok(())
    }
}

fn target_id(route: &str) -> MessagingResult<i32> {
    parse_route(route)?.id().ok_or_else(|| {
        MessagingError::Routing(format!("invalid route '{}': missing identifier", route))
    })
}

fn required(message: Option<ContactPayload>, method: &Method) -> MessagingResult<ContactPayload> {
    message.ok_or_else(|| MessagingError::Malformed(format!("{} envelope has no message", method)))
}
