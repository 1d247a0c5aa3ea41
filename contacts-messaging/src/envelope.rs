//! Command envelope and its JSON codec.
//!
//! Wire format: `{ "method": string, "route": string, "message": object | null }`.
//! Field names are matched case-insensitively on decode, at the envelope and
//! the payload level, so producers emitting `Method`/`RegionCode` interoperate
//! with ones emitting `method`/`regionCode`.

use std::fmt;

use contacts_domain::ContactPayload;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MessagingError, MessagingResult};

/// Command kind carried by an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// Create a contact (`POST`)
    Create,
    /// Replace a contact (`PUT`)
    Update,
    /// Remove a contact (`DELETE`)
    Delete,
    /// Query contacts (`GET`)
    Read,
    /// Any other verb, upper-cased. Acknowledged without action by consumers.
    Unrecognized(String),
}

impl Method {
    /// Parse a wire verb. Accepts HTTP verbs and command names, ignoring case.
    pub fn parse(raw: &str) -> Self {
        let verb = raw.trim().to_ascii_uppercase();
        match verb.as_str() {
            "POST" | "CREATE" => Method::Create,
            "PUT" | "UPDATE" => Method::Update,
            "DELETE" => Method::Delete,
            "GET" | "READ" => Method::Read,
            _ => Method::Unrecognized(verb),
        }
    }

    /// The verb written on the wire
    pub fn as_wire(&self) -> &str {
        match self {
            Method::Create => "POST",
            Method::Update => "PUT",
            Method::Delete => "DELETE",
            Method::Read => "GET",
            Method::Unrecognized(verb) => verb,
        }
    }

    /// Normalise a hand-built `Unrecognized` verb, mapping known verbs back to
    /// their variant.
    pub fn canonical(&self) -> Self {
        match self {
            Method::Unrecognized(verb) => Method::parse(verb),
            known => known.clone(),
        }
    }

    /// Whether envelopes of this kind must carry a message
    pub fn requires_payload(&self) -> bool {
        matches!(self, Method::Create | Method::Update)
    }
}

impl From<&str> for Method {
    fn from(raw: &str) -> Self {
        Method::parse(raw)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// The unit of transit between the publisher and the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Command kind
    pub method: Method,
    /// Logical resource path, e.g. `contacts/42`
    pub route: String,
    /// Command data; required for CREATE and UPDATE
    pub message: Option<ContactPayload>,
}

impl Envelope {
    /// Create a new envelope
    pub fn new(method: Method, route: impl Into<String>, message: Option<ContactPayload>) -> Self {
        Self {
            method: method.canonical(),
            route: route.into(),
            message,
        }
    }

    /// Check the payload invariant.
    pub fn validate(&self) -> MessagingResult<()> {
        if self.method.canonical().requires_payload() && self.message.is_none() {
            return Err(MessagingError::Malformed(format!(
                "{} envelope for route '{}' has no message",
                self.method, self.route
            )));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    method: &'a str,
    route: &'a str,
    message: Option<&'a ContactPayload>,
}

/// Payload as read off the wire, after key folding.
#[derive(Deserialize)]
struct WirePayload {
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    regioncode: Option<String>,
}

impl From<WirePayload> for ContactPayload {
    fn from(wire: WirePayload) -> Self {
        ContactPayload {
            name: wire.name.unwrap_or_default(),
            phone: wire.phone.unwrap_or_default(),
            email: wire.email.unwrap_or_default(),
            region_code: wire.regioncode.unwrap_or_default(),
        }
    }
}

/// Serialize an envelope to JSON bytes.
pub fn encode(envelope: &Envelope) -> MessagingResult<Vec<u8>> {
    let method = envelope.method.canonical();
    let wire = WireEnvelope {
        method: method.as_wire(),
        route: &envelope.route,
        message: envelope.message.as_ref(),
    };
    serde_json::to_vec(&wire).map_err(|e| MessagingError::Encoding(e.to_string()))
}

/// Parse JSON bytes into an envelope, enforcing the payload invariant.
pub fn decode(bytes: &[u8]) -> MessagingResult<Envelope> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| MessagingError::Decode(e.to_string()))?;

    let Value::Object(fields) = fold_keys(value) else {
        return Err(MessagingError::Decode(
            "envelope must be a JSON object".to_string(),
        ));
    };

    let method = required_str(&fields, "method")?;
    let route = required_str(&fields, "route")?;
    let message = match fields.get("message") {
        None | Some(Value::Null) => None,
        Some(payload @ Value::Object(_)) => {
            let wire: WirePayload = serde_json::from_value(payload.clone())
                .map_err(|e| MessagingError::Decode(format!("message: {}", e)))?;
            Some(ContactPayload::from(wire))
        }
        Some(_) => {
            return Err(MessagingError::Decode(
                "message must be an object or null".to_string(),
            ));
        }
    };

    let envelope = Envelope::new(Method::parse(method), route, message);
    envelope
        .validate()
        .map_err(|e| MessagingError::Decode(e.to_string()))?;
    Ok(envelope)
}

fn required_str<'a>(fields: &'a Map<String, Value>, name: &str) -> MessagingResult<&'a str> {
    match fields.get(name) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(MessagingError::Decode(format!("{} must be a string", name))),
        None => Err(MessagingError::Decode(format!("missing field '{}'", name))),
    }
}

/// Lower-case every object key, recursively.
fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| (key.to_lowercase(), fold_keys(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> ContactPayload {
        ContactPayload::new("Ana", "11999999999", "a@b.com", "011")
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("POST"), Method::Create);
        assert_eq!(Method::parse("create"), Method::Create);
        assert_eq!(Method::parse(" put "), Method::Update);
        assert_eq!(Method::parse("Delete"), Method::Delete);
        assert_eq!(Method::parse("get"), Method::Read);
        assert_eq!(
            Method::parse("patch"),
            Method::Unrecognized("PATCH".to_string())
        );
    }

    #[test]
    fn test_encode_layout() {
        let envelope = Envelope::new(Method::Create, "contacts", Some(ana()));
        let json = String::from_utf8(encode(&envelope).unwrap()).unwrap();

        assert_eq!(
            json,
            r#"{"method":"POST","route":"contacts","message":{"name":"Ana","phone":"11999999999","email":"a@b.com","regionCode":"011"}}"#
        );
    }

    #[test]
    fn test_encode_null_message() {
        let envelope = Envelope::new(Method::Delete, "contacts/42", None);
        let json = String::from_utf8(encode(&envelope).unwrap()).unwrap();

        assert_eq!(json, r#"{"method":"DELETE","route":"contacts/42","message":null}"#);
    }

    #[test]
    fn test_round_trip() {
        let envelopes = [
            Envelope::new(Method::Create, "contacts", Some(ana())),
            Envelope::new(Method::Update, "contacts/42", Some(ana())),
            Envelope::new(Method::Delete, "contacts/42", None),
            Envelope::new(Method::Read, "contacts/region/011", None),
            Envelope::new(Method::parse("PATCH"), "contacts/1", Some(ana())),
        ];

        for envelope in envelopes {
            assert_eq!(decode(&encode(&envelope).unwrap()).unwrap(), envelope);
        }
    }

    #[test]
    fn test_round_trip_hand_built_verbs() {
        for verb in ["patch", " MERGE", "Options", "POST", "update", " get "] {
            let envelope = Envelope::new(
                Method::Unrecognized(verb.to_string()),
                "contacts/1",
                Some(ana()),
            );
            assert_eq!(envelope.method, Method::parse(verb));
            assert_eq!(decode(&encode(&envelope).unwrap()).unwrap(), envelope);
        }
    }

    #[test]
    fn test_encode_canonicalises_struct_literal_method() {
        let envelope = Envelope {
            method: Method::Unrecognized(" merge ".to_string()),
            route: "contacts/1".to_string(),
            message: None,
        };
        let json = String::from_utf8(encode(&envelope).unwrap()).unwrap();

        assert_eq!(json, r#"{"method":"MERGE","route":"contacts/1","message":null}"#);
    }

    #[test]
    fn test_hand_built_create_still_needs_message() {
        let envelope = Envelope {
            method: Method::Unrecognized("POST".to_string()),
            route: "contacts".to_string(),
            message: None,
        };
        assert!(matches!(envelope.validate(), Err(MessagingError::Malformed(_))));

        let envelope = Envelope::new(Method::Unrecognized("put".to_string()), "contacts/1", None);
        assert_eq!(envelope.method, Method::Update);
        assert!(matches!(envelope.validate(), Err(MessagingError::Malformed(_))));
    }

    #[test]
    fn test_decode_case_insensitive_fields() {
        let body = br#"{"Method":"put","ROUTE":"contacts/7","Message":{"Name":"Ana","Phone":"11999999999","Email":"a@b.com","RegionCode":"011"}}"#;
        let envelope = decode(body).unwrap();

        assert_eq!(envelope.method, Method::Update);
        assert_eq!(envelope.route, "contacts/7");
        assert_eq!(envelope.message, Some(ana()));
    }

    #[test]
    fn test_decode_missing_message_field_on_delete() {
        let envelope = decode(br#"{"method":"DELETE","route":"contacts/1"}"#).unwrap();
        assert_eq!(envelope.message, None);
    }

    #[test]
    fn test_decode_rejects_create_without_message() {
        let result = decode(br#"{"method":"POST","route":"contacts","message":null}"#);
        assert!(matches!(result, Err(MessagingError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode(b"not json"), Err(MessagingError::Decode(_))));
        assert!(matches!(decode(b"[1,2]"), Err(MessagingError::Decode(_))));
        assert!(matches!(
            decode(br#"{"route":"contacts"}"#),
            Err(MessagingError::Decode(ref m)) if m.contains("method")
        ));
        assert!(matches!(
            decode(br#"{"method":"GET","route":42}"#),
            Err(MessagingError::Decode(ref m)) if m.contains("route")
        ));
        assert!(matches!(
            decode(br#"{"method":"PUT","route":"contacts/1","message":"Ana"}"#),
            Err(MessagingError::Decode(_))
        ));
    }

    #[test]
    fn test_partial_payload_decodes_with_blanks() {
        let envelope =
            decode(br#"{"method":"POST","route":"contacts","message":{"name":"Ana"}}"#).unwrap();
        let payload = envelope.message.unwrap();

        assert_eq!(payload.name, "Ana");
        assert!(payload.region_code.is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(Envelope::new(Method::Update, "contacts/1", None)
            .validate()
            .is_err());
        assert!(Envelope::new(Method::Read, "contacts", None).validate().is_ok());
    }
}
