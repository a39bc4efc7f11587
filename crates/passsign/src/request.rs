//! Transport-neutral request decoding.
//!
//! The JSON body accepted by the signing service carries the descriptor and
//! every asset as standard base64:
//!
//! ```json
//! {
//!   "passJson": "eyJmb3JtYXRWZXJzaW9uIjoxfQ==",
//!   "files": [{ "name": "icon.png", "data": "aWNvbg==" }]
//! }
//! ```

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One inline file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    /// File name inside the pass.
    pub name: String,
    /// Base64 file content.
    pub data: String,
}

/// Inline signing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Base64 `pass.json`.
    pub pass_json: String,
    /// Base64 assets.
    #[serde(default)]
    pub files: Vec<FilePayload>,
}

/// Raw descriptor and assets, ready for [`crate::PassSigner::sign_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRequest {
    /// `pass.json` bytes.
    pub descriptor: Vec<u8>,
    /// Asset name to bytes.
    pub assets: BTreeMap<String, Vec<u8>>,
}

impl DecodedRequest {
    /// Add an asset, rejecting a second file with the same name.
    pub fn insert_asset(&mut self, name: String, data: Vec<u8>) -> Result<()> {
        if self.assets.contains_key(&name) {
            return Err(Error::InvalidRequest(format!("Duplicate file: {name}")));
        }
        self.assets.insert(name, data);
        Ok(())
    }
}

impl SignRequest {
    /// Decode every base64 payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for invalid base64 or duplicate
    /// file names.
    pub fn decode(self) -> Result<DecodedRequest> {
        let descriptor = STANDARD
            .decode(self.pass_json.trim())
            .map_err(|e| Error::InvalidRequest(format!("passJson is not valid base64: {e}")))?;

        let mut decoded = DecodedRequest {
            descriptor,
            assets: BTreeMap::new(),
        };

        for file in self.files {
            let data = STANDARD.decode(file.data.trim()).map_err(|e| {
                Error::InvalidRequest(format!("{} is not valid base64: {}", file.name, e))
            })?;
            decoded.insert_asset(file.name, data)?;
        }

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let request: SignRequest = serde_json::from_str(
            r#"{"passJson":"e30=","files":[{"name":"icon.png","data":"aWNvbg=="}]}"#,
        )
        .unwrap();

        let decoded = request.decode().unwrap();
        assert_eq!(decoded.descriptor, b"{}");
        assert_eq!(decoded.assets.get("icon.png").map(Vec::as_slice), Some(&b"icon"[..]));
    }

    #[test]
    fn test_files_default_to_empty() {
        let request: SignRequest = serde_json::from_str(r#"{"passJson":"e30="}"#).unwrap();
        let decoded = request.decode().unwrap();
        assert!(decoded.assets.is_empty());
    }

    #[test]
    fn test_bad_base64() {
        let request = SignRequest {
            pass_json: "e30=".into(),
            files: vec![FilePayload {
                name: "icon.png".into(),
                data: "not base64!".into(),
            }],
        };
        match request.decode() {
            Err(Error::InvalidRequest(msg)) => assert!(msg.contains("icon.png")),
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names() {
        let file = FilePayload {
            name: "icon.png".into(),
            data: "aWNvbg==".into(),
        };
        let request = SignRequest {
            pass_json: "e30=".into(),
            files: vec![file.clone(), file],
        };
        assert!(matches!(request.decode(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_serializes_camel_case() {
        let request = SignRequest {
            pass_json: "e30=".into(),
            files: Vec::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["passJson"], "e30=");
    }
}
