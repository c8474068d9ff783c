//! Base64 transport encoding for header-borne protocol messages.
//!
//! Payment proofs, challenges and settlement receipts travel in HTTP
//! headers as standard-alphabet base64 of their JSON form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use std::fmt::Display;

/// Base64 text held as bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes to raw bytes. Surrounding ASCII whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(self.0.trim_ascii())
    }

    /// Encodes raw bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }

    /// Serializes `value` as JSON and encodes the result.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(value).map(Self::encode)
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl From<&str> for Base64Bytes {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
