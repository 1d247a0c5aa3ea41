//! Command publishing

use std::fs;
use std::path::Path;

use contacts_config::RelayConfig;
use contacts_domain::ContactPayload;
use contacts_messaging::{CommandPublisher, Envelope, Method, ensure_topology};

use crate::error::{CliError, CliResult};

/// Build the envelope from command-line input, failing before any broker
/// connection is attempted.
pub fn envelope(
    method: &str,
    route: &str,
    message: Option<&str>,
    message_file: Option<&Path>,
) -> CliResult<Envelope> {
    let raw = match (message, message_file) {
        (Some(_), Some(_)) => {
            return Err(CliError::InvalidArgument(
                "use either --message or --message-file".to_string(),
            ));
        }
        (Some(inline), None) => Some(inline.to_string()),
        (None, Some(path)) => Some(fs::read_to_string(path)?),
        (None, None) => None,
    };

    let payload = raw
        .map(|json| {
            serde_json::from_str::<ContactPayload>(&json)
                .map_err(|e| CliError::InvalidArgument(format!("message is not a contact: {}", e)))
        })
        .transpose()?;

    let envelope = Envelope::new(Method::parse(method), route, payload);
    envelope.validate()?;
    Ok(envelope)
}

/// Publish one envelope and wait for the broker to accept it.
pub async fn run(config: &RelayConfig, envelope: &Envelope) -> CliResult<()> {
    let session = super::connect(config).await?;
    let channel = session.channel().await?;
    ensure_topology(channel.as_ref()).await?;

    let publisher =
        CommandPublisher::new(channel).with_confirms(config.broker.publisher_confirms);
    let published = publisher.publish_envelope(envelope).await;

    let closed = session.shutdown().await;
    published?;
    Ok(closed?)
}
