//! Document codec interface.
//!
//! File location lists are stored as opaque ciphertext produced by an
//! external codec service. The gateway never sees key material; it sends
//! plaintext or ciphertext over and gets the counterpart back.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{GatewayError, GatewayResult};

/// Encrypt/decrypt boundary for file location lists.
#[async_trait]
pub trait DocumentCodec: Send + Sync {
    /// Encrypt a plaintext document, returning hex ciphertext.
    async fn encrypt(&self, plaintext: &str) -> GatewayResult<String>;
    /// Decrypt hex ciphertext back into the plaintext document.
    async fn decrypt(&self, ciphertext: &str) -> GatewayResult<String>;
}

/// HTTP implementation talking to the configured codec service.
pub struct RemoteCodec {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct EncryptReply {
    #[serde(rename = "encryptedDocument")]
    encrypted_document: String,
}

#[derive(Deserialize)]
struct DecryptReply {
    document: String,
}

impl RemoteCodec {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DocumentCodec for RemoteCodec {
    async fn encrypt(&self, plaintext: &str) -> GatewayResult<String> {
        let response = self
            .client
            .post(format!("{}/encrypt", self.base_url))
            .json(&json!({ "document": plaintext }))
            .send()
            .await?
            .error_for_status()?;
        let reply: EncryptReply = response.json().await?;
        Ok(reply.encrypted_document)
    }

    async fn decrypt(&self, ciphertext: &str) -> GatewayResult<String> {
        let response = self
            .client
            .post(format!("{}/decrypt", self.base_url))
            .json(&json!({ "encryptedDocument": ciphertext }))
            .send()
            .await?
            .error_for_status()?;
        let reply: DecryptReply = response.json().await?;
        Ok(reply.document)
    }
}

/// One entry of a decrypted file list.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub url: String,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
}

/// Decrypt and decode an asset's file list.
///
/// The ciphertext blob is either raw hex or a JSON wrapper carrying it under
/// `encryptedDocument`, as produced by the encrypt endpoint.
pub async fn files_list_from_json(
    codec: &dyn DocumentCodec,
    encrypted_files: &str,
) -> GatewayResult<Vec<FileEntry>> {
    let ciphertext = if encrypted_files.starts_with('{') {
        let wrapper: serde_json::Value = serde_json::from_str(encrypted_files)?;
        wrapper
            .get("encryptedDocument")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GatewayError::MalformedRequest(
                    "encrypted files wrapper lacks encryptedDocument".to_string(),
                )
            })?
            .to_string()
    } else {
        encrypted_files.to_string()
    };

    let plaintext = codec.decrypt(&ciphertext).await?;
    log::debug!("Got decrypted files str {}", plaintext);

    let entries: Vec<FileEntry> = serde_json::from_str(&plaintext).map_err(|_| {
        GatewayError::MalformedRequest("Expected a files list".to_string())
    })?;
    Ok(entries)
}

/// URL of the file at `index` in the decrypted list.
pub async fn url_at_index(
    codec: &dyn DocumentCodec,
    encrypted_files: &str,
    index: usize,
) -> GatewayResult<String> {
    let files = files_list_from_json(codec, encrypted_files).await?;
    files
        .get(index)
        .map(|entry| entry.url.clone())
        .ok_or_else(|| GatewayError::MalformedRequest(format!("url index \"{}\" is invalid", index)))
}


#[cfg(test)]
mod tests {
    use super::stub::HexCodec;
    use super::*;

    #[tokio::test]
    async fn test_files_list_roundtrip() {
        let codec = HexCodec;
        let plaintext = r#"[{"url":"http://example.com/a.csv","contentType":"text/csv"},{"url":"http://example.com/b"}]"#;
        let ciphertext = codec.encrypt(plaintext).await.unwrap();

        let files = files_list_from_json(&codec, &ciphertext).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].url, "http://example.com/a.csv");
        assert_eq!(files[0].content_type.as_deref(), Some("text/csv"));
    }

    #[tokio::test]
    async fn test_wrapped_ciphertext() {
        let codec = HexCodec;
        let ciphertext = codec.encrypt(r#"[{"url":"http://example.com/x"}]"#).await.unwrap();
        let wrapped = format!("{{\"encryptedDocument\":\"{}\"}}", ciphertext);

        let url = url_at_index(&codec, &wrapped, 0).await.unwrap();
        assert_eq!(url, "http://example.com/x");
    }

    #[tokio::test]
    async fn test_bad_index_is_rejected() {
        let codec = HexCodec;
        let ciphertext = codec.encrypt(r#"[{"url":"http://example.com/x"}]"#).await.unwrap();

        let result = url_at_index(&codec, &ciphertext, 4).await;
        assert!(matches!(result, Err(GatewayError::MalformedRequest(_))));
    }

    #[tokio::test]
    async fn test_non_list_plaintext_is_rejected() {
        let codec = HexCodec;
        let ciphertext = codec.encrypt(r#"{"url":"http://example.com/x"}"#).await.unwrap();

        let result = files_list_from_json(&codec, &ciphertext).await;
        assert!(matches!(result, Err(GatewayError::MalformedRequest(_))));
    }
}
