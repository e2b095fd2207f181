//! Gateway error taxonomy.

use thiserror::Error;

/// Errors produced by the gateway core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Signature does not verify against the claimed identity, nonce and message.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Target URL failed SSRF validation and will not be fetched.
    #[error("Unsafe url {0}")]
    UnsafeUrl(String),

    /// Network failure while talking to an upstream resource or collaborator.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Required field missing or of an invalid type.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::UpstreamUnavailable(err.to_string())
    }
}

impl From<secp256k1::Error> for GatewayError {
    fn from(err: secp256k1::Error) -> Self {
        GatewayError::InvalidSignature(err.to_string())
    }
}

impl From<hex::FromHexError> for GatewayError {
    fn from(err: hex::FromHexError) -> Self {
        GatewayError::MalformedRequest(format!("Invalid hex format: {}", err))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedRequest(format!("JSON parsing error: {}", err))
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
