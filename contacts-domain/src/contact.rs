//! Contact records and command payloads.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Command data carried by CREATE and UPDATE envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPayload {
    /// Display name
    pub name: String,
    /// Phone number, digits only
    pub phone: String,
    /// E-mail address
    pub email: String,
    /// Three character area code used for regional listings
    pub region_code: String,
}

impl ContactPayload {
    /// Create a new payload
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
        region_code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            region_code: region_code.into(),
        }
    }

    /// Reject payloads with blank required fields.
    ///
    /// Only presence is checked here; format rules belong to the caller's
    /// validation layer.
    pub fn ensure_complete(&self) -> DomainResult<()> {
        let fields = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("email", &self.email),
            ("regionCode", &self.region_code),
        ];

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(DomainError::Invalid(format!("{} is required", field))),
            None => Ok(()),
        }
    }
}

/// A stored contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Identifier assigned by the store
    pub id: i32,
    /// Display name
    pub name: String,
    /// Phone number
    pub phone: String,
    /// E-mail address
    pub email: String,
    /// Area code
    pub region_code: String,
}

impl Contact {
    /// Build a contact from a payload under the given id
    pub fn from_payload(id: i32, payload: ContactPayload) -> Self {
        Self {
            id,
            name: payload.name,
            phone: payload.phone,
            email: payload.email,
            region_code: payload.region_code,
        }
    }

    /// Overwrite the mutable fields with the payload's values
    pub fn apply(&mut self, payload: ContactPayload) {
        self.name = payload.name;
        self.phone = payload.phone;
        self.email = payload.email;
        self.region_code = payload.region_code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> ContactPayload {
        ContactPayload::new("Ana", "11999999999", "a@b.com", "011")
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let json = serde_json::to_value(ana()).unwrap();
        assert_eq!(json["regionCode"], "011");
        assert!(json.get("region_code").is_none());
    }

    #[test]
    fn test_ensure_complete() {
        assert!(ana().ensure_complete().is_ok());

        let mut blank = ana();
        blank.email = "  ".to_string();
        assert_eq!(
            blank.ensure_complete(),
            Err(DomainError::Invalid("email is required".to_string()))
        );
    }

    #[test]
    fn test_apply_keeps_id() {
        let mut contact = Contact::from_payload(7, ana());
        contact.apply(ContactPayload::new("Bia", "11888888888", "b@c.com", "021"));

        assert_eq!(contact.id, 7);
        assert_eq!(contact.name, "Bia");
        assert_eq!(contact.region_code, "021");
    }
}
