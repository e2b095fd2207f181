//! Request schemas and field validation.
//!
//! Every endpoint's expected fields are explicit structs deserialized once
//! at the boundary, before any domain logic or network I/O runs.

use serde::Deserialize;
use serde_json::Value;

/// Validate an account address: 0x prefix plus 40 hex characters.
pub fn validate_address(address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("Address cannot be empty".to_string());
    }
    if !address.starts_with("0x") {
        return Err("Address must start with '0x'".to_string());
    }
    if address.len() != 42 {
        return Err("Address must be 42 characters long (including '0x')".to_string());
    }
    if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("Address contains invalid hex characters".to_string());
    }
    Ok(())
}

/// Validate a signature: 65 bytes of hex, optionally 0x-prefixed.
pub fn validate_signature(signature: &str) -> Result<(), String> {
    let stripped = signature.strip_prefix("0x").unwrap_or(signature);
    if stripped.is_empty() {
        return Err("Signature cannot be empty".to_string());
    }
    if stripped.len() != 130 {
        return Err("Signature must be 130 characters long (65 bytes)".to_string());
    }
    if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("Signature contains invalid hex characters".to_string());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceQuery {
    pub user_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptRequest {
    pub document_id: String,
    /// JSON document (typically a file list) as a string.
    pub document: String,
    pub publisher_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoRequest {
    pub did: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub checksum: bool,
}

impl FileInfoRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.did.is_none() && self.url.is_none() {
            return Err("Either did or url is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeQuery {
    pub document_id: String,
    pub service_id: u32,
    pub consumer_address: String,
    pub data_token: String,
    pub userdata: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub document_id: String,
    pub service_id: u32,
    pub service_type: Option<String>,
    pub file_index: usize,
    pub transfer_tx_id: String,
    pub consumer_address: String,
    pub data_token: String,
    pub signature: String,
    pub userdata: Option<Value>,
}

/// Shared shape of the /compute job-control requests. Only the consumer
/// address is mandatory; absent fields widen the scope of the operation on
/// the cluster side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeQuery {
    pub consumer_address: String,
    pub document_id: Option<String>,
    pub job_id: Option<String>,
    pub transfer_tx_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeStartRequest {
    pub consumer_address: String,
    pub document_id: Option<String>,
    pub transfer_tx_id: Option<String>,
    /// Workflow definition forwarded to the compute cluster.
    pub workflow: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResultQuery {
    pub job_id: String,
    pub index: u32,
    pub consumer_address: String,
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x00a329c0648769A73afAc7F9381E08FB43dBEA72").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("00a329c0648769A73afAc7F9381E08FB43dBEA72").is_err());
        assert!(validate_address("0x00a329").is_err());
        assert!(validate_address("0xZZa329c0648769A73afAc7F9381E08FB43dBEA72").is_err());
    }

    #[test]
    fn test_validate_signature() {
        let good = format!("0x{}", "ab".repeat(65));
        assert!(validate_signature(&good).is_ok());
        assert!(validate_signature(&"ab".repeat(65)).is_ok());
        assert!(validate_signature("0x1234").is_err());
        assert!(validate_signature("").is_err());
    }

    #[test]
    fn test_fileinfo_requires_did_or_url() {
        let neither = FileInfoRequest {
            did: None,
            url: None,
            checksum: false,
        };
        assert!(neither.validate().is_err());

        let with_url = FileInfoRequest {
            did: None,
            url: Some("http://example.com/f".to_string()),
            checksum: false,
        };
        assert!(with_url.validate().is_ok());
    }

    #[test]
    fn test_download_query_from_urlencoded() {
        let query = "documentId=did:op:1&serviceId=0&fileIndex=0&transferTxId=0xabc\
                     &consumerAddress=0xdef&dataToken=0x123&signature=0xsig";
        let parsed: DownloadQuery = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(parsed.document_id, "did:op:1");
        assert_eq!(parsed.file_index, 0);
        assert!(parsed.userdata.is_none());
    }
}
