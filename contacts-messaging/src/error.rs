//! Error types for messaging operations

use contacts_domain::DomainError;
use thiserror::Error;

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Errors that can occur while publishing, routing or consuming commands
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Envelope could not be serialized
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Bytes taken off the queue are not a well-formed envelope
    #[error("Decoding failed: {0}")]
    Decode(String),

    /// Envelope violates the payload invariant (CREATE/UPDATE without a message)
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// A broker resource already exists with different parameters
    #[error("Topology conflict: {0}")]
    TopologyConflict(String),

    /// The broker did not accept a published message
    #[error("Publish failed: {0}")]
    Publish(String),

    /// The route does not name a usable target
    #[error("Routing failed: {0}")]
    Routing(String),

    /// The domain operation port reported a failure
    #[error("Domain operation failed: {0}")]
    Domain(#[from] DomainError),

    /// Failed to connect to the broker, or the connection is gone
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Channel is closed
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Failed to subscribe to a queue
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// Failed to acknowledge or reject a delivery
    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Internal broker error
    #[error("Broker error: {0}")]
    Broker(String),
}

impl MessagingError {
    /// Check if this error indicates a connection issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MessagingError::Connection(_) | MessagingError::ChannelClosed(_)
        )
    }

    /// Check if this error must stop the process instead of being handled per message
    pub fn is_fatal(&self) -> bool {
        matches!(self, MessagingError::TopologyConflict(_))
    }

    /// Fold a broker-side failure into [`MessagingError::Publish`].
    ///
    /// Envelope errors keep their own kind so callers can tell a bad command
    /// from an unreachable broker.
    pub fn into_publish_error(self) -> Self {
        match self {
            MessagingError::Publish(_)
            | MessagingError::Encoding(_)
            | MessagingError::Malformed(_) => self,
            other => MessagingError::Publish(other.to_string()),
        }
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        use lapin::protocol::{AMQPErrorKind, AMQPSoftError};

        match err.kind() {
            lapin::ErrorKind::IOError(_) => MessagingError::Connection(err.to_string()),
            lapin::ErrorKind::InvalidChannelState(..) => {
                MessagingError::ChannelClosed(err.to_string())
            }
            lapin::ErrorKind::InvalidConnectionState(_) => {
                MessagingError::Connection(err.to_string())
            }
            lapin::ErrorKind::ProtocolError(amqp)
                if *amqp.kind() == AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED) =>
            {
                MessagingError::TopologyConflict(err.to_string())
            }
            _ => MessagingError::Broker(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_folding() {
        let err = MessagingError::Connection("refused".to_string()).into_publish_error();
        assert!(matches!(err, MessagingError::Publish(ref m) if m.contains("refused")));

        let err = MessagingError::Malformed("no message".to_string()).into_publish_error();
        assert!(matches!(err, MessagingError::Malformed(_)));
    }

    #[test]
    fn test_only_topology_conflicts_are_fatal() {
        assert!(MessagingError::TopologyConflict("x".to_string()).is_fatal());
        assert!(!MessagingError::Decode("x".to_string()).is_fatal());
        assert!(!MessagingError::Domain(DomainError::NotFound(1)).is_fatal());
    }

    #[cfg(feature = "rabbitmq")]
    #[test]
    fn test_precondition_failed_maps_to_topology_conflict() {
        use lapin::protocol::{AMQPError, AMQPSoftError};

        let amqp = AMQPError::new(
            AMQPSoftError::PRECONDITIONFAILED.into(),
            "PRECONDITION_FAILED - inequivalent arg 'durable'".into(),
        );
        let err: MessagingError = lapin::Error::from(lapin::ErrorKind::ProtocolError(amqp)).into();

        assert!(matches!(err, MessagingError::TopologyConflict(_)));
        assert!(err.is_fatal());
    }

    #[cfg(feature = "rabbitmq")]
    #[test]
    fn test_other_protocol_errors_are_not_fatal() {
        use lapin::protocol::{AMQPError, AMQPSoftError};

        let amqp = AMQPError::new(AMQPSoftError::NOTFOUND.into(), "NOT_FOUND - no queue".into());
        let err: MessagingError = lapin::Error::from(lapin::ErrorKind::ProtocolError(amqp)).into();

        assert!(matches!(err, MessagingError::Broker(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_domain_error_conversion() {
        let err: MessagingError = DomainError::NotFound(999).into();
        assert_eq!(err.to_string(), "Domain operation failed: Contact not found: 999");
    }
}
