//! Errors raised while decoding x402 header values.

/// A payment header value that does not decode into a payment proof.
///
/// Always attributable to the client.
#[derive(Debug, thiserror::Error)]
pub enum MalformedProof {
    /// The header value contains bytes outside visible ASCII.
    #[error("header value is not visible ASCII")]
    NotAscii,
    /// Base64 decoding failed.
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not UTF-8.
    #[error("not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// The decoded text is not JSON.
    #[error("not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// The proof declares a protocol version this server does not speak.
    #[error("unsupported x402Version {0}")]
    UnsupportedVersion(u64),
    /// The JSON does not have the payment payload shape.
    #[error("unexpected payment payload shape: {0}")]
    Schema(#[source] serde_json::Error),
}

/// A value that could not be turned into a header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderEncodeError {
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The encoded value is not a legal header value.
    #[error("invalid header value: {0}")]
    InvalidValue(#[from] http::header::InvalidHeaderValue),
}
