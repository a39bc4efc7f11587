//! `pass.json` parsing and identity checks.

use crate::config::PassIdentity;
use crate::error::IdentifierField;
use crate::{Error, Result};
use serde_json::{Map, Value};

/// The fields of a pass descriptor the signer cares about.
///
/// The rest of the document is carried through to the archive untouched;
/// only the original bytes are ever signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDescriptor {
    /// `passTypeIdentifier`, if present as a string.
    pub pass_type_identifier: Option<String>,
    /// `teamIdentifier`, if present as a string.
    pub team_identifier: Option<String>,
    /// `serialNumber`, if present as a string.
    pub serial_number: Option<String>,
    /// `organizationName`, if present as a string.
    pub organization_name: Option<String>,
}

impl PassDescriptor {
    /// Parse descriptor bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPassJson`] if the bytes are empty, not UTF-8,
    /// not JSON, or not a JSON object.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidPassJson("pass.json is empty".into()));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidPassJson(format!("pass.json is not UTF-8: {e}")))?;

        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidPassJson(format!("pass.json is not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidPassJson("pass.json is not a JSON object".into()))?;

        Ok(Self {
            pass_type_identifier: string_field(object, "passTypeIdentifier"),
            team_identifier: string_field(object, "teamIdentifier"),
            serial_number: string_field(object, "serialNumber"),
            organization_name: string_field(object, "organizationName"),
        })
    }

    /// Check the descriptor against the configured identity.
    ///
    /// The pass type identifier is checked before the team identifier. An
    /// absent field never matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentifierMismatch`] naming the first field that
    /// differs.
    pub fn check_identity(&self, expected: &PassIdentity) -> Result<()> {
        if self.pass_type_identifier.as_deref() != Some(expected.pass_type_identifier.as_str()) {
            return Err(Error::IdentifierMismatch {
                field: IdentifierField::PassTypeIdentifier,
            });
        }
        if self.team_identifier.as_deref() != Some(expected.team_identifier.as_str()) {
            return Err(Error::IdentifierMismatch {
                field: IdentifierField::TeamIdentifier,
            });
        }
        Ok(())
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> PassIdentity {
        PassIdentity {
            pass_type_identifier: "pass.com.example.card".into(),
            team_identifier: "ABCDE12345".into(),
        }
    }

    #[test]
    fn test_parse_fields() {
        let descriptor = PassDescriptor::parse(
            br#"{
                "formatVersion": 1,
                "passTypeIdentifier": "pass.com.example.card",
                "teamIdentifier": "ABCDE12345",
                "serialNumber": "3F2504E0",
                "organizationName": "Example Corp"
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.pass_type_identifier.as_deref(), Some("pass.com.example.card"));
        assert_eq!(descriptor.team_identifier.as_deref(), Some("ABCDE12345"));
        assert_eq!(descriptor.serial_number.as_deref(), Some("3F2504E0"));
        assert_eq!(descriptor.organization_name.as_deref(), Some("Example Corp"));
        assert!(descriptor.check_identity(&identity()).is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let cases: [&[u8]; 5] = [b"", b"\xff\xfe", b"{not json", b"[1, 2]", b"\"pass\""];
        for bytes in cases {
            let result = PassDescriptor::parse(bytes);
            assert!(
                matches!(result, Err(Error::InvalidPassJson(_))),
                "{:?} should be rejected",
                String::from_utf8_lossy(bytes)
            );
        }
    }

    #[test]
    fn test_empty_message() {
        match PassDescriptor::parse(b"") {
            Err(Error::InvalidPassJson(msg)) => assert_eq!(msg, "pass.json is empty"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pass_type_checked_first() {
        let descriptor = PassDescriptor::parse(b"{}").unwrap();
        match descriptor.check_identity(&identity()) {
            Err(Error::IdentifierMismatch { field }) => {
                assert_eq!(field, IdentifierField::PassTypeIdentifier)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_team_mismatch() {
        let descriptor = PassDescriptor::parse(
            br#"{"passTypeIdentifier":"pass.com.example.card","teamIdentifier":"ZZZZZ99999"}"#,
        )
        .unwrap();
        match descriptor.check_identity(&identity()) {
            Err(Error::IdentifierMismatch { field }) => {
                assert_eq!(field, IdentifierField::TeamIdentifier)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_non_string_identifier_never_matches() {
        let descriptor = PassDescriptor::parse(
            br#"{"passTypeIdentifier":["pass.com.example.card"],"teamIdentifier":"ABCDE12345"}"#,
        )
        .unwrap();
        assert!(descriptor.pass_type_identifier.is_none());
        assert!(descriptor.check_identity(&identity()).is_err());
    }
}
