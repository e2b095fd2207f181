//! Asset directory (metadata catalog) client.

use std::time::Duration;

use serde::Deserialize;

use crate::errors::{GatewayError, GatewayResult};

/// Descriptor of one service attached to an asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescriptor {
    pub index: u32,
    #[serde(rename = "type")]
    pub service_type: String,
    /// Token cost of consuming the service, as a decimal string.
    pub cost: String,
}

/// Metadata for one file of an asset. Only the declared content type is
/// relevant to the gateway; locations live in the encrypted file list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileMetadata {
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
}

/// Asset descriptor returned by the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub did: String,
    /// Whether the directory considers the asset consumable at all.
    #[serde(default = "default_consumable")]
    pub consumable: bool,
    /// Opaque ciphertext holding the file location list.
    #[serde(rename = "encryptedFiles")]
    pub encrypted_files: String,
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

fn default_consumable() -> bool {
    true
}

impl Asset {
    /// Service lookup by index.
    pub fn service_by_index(&self, index: u32) -> GatewayResult<&ServiceDescriptor> {
        self.services
            .iter()
            .find(|service| service.index == index)
            .ok_or_else(|| {
                GatewayError::MalformedRequest(format!(
                    "asset {} has no service with index {}",
                    self.did, index
                ))
            })
    }

    /// Declared content type for a file, if the metadata carries one.
    pub fn content_type_at_index(&self, index: usize) -> Option<String> {
        self.files.get(index).and_then(|f| f.content_type.clone())
    }
}

/// HTTP client for the asset directory.
pub struct AssetDirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl AssetDirectoryClient {
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

    /// Fetch the asset descriptor for a document identifier.
    pub async fn get_asset(&self, did: &str) -> GatewayResult<Asset> {
        let url = format!(
            "{}/api/v1/aquarius/assets/ddo/{}",
            self.base_url,
            urlencoding::encode(did)
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "asset directory returned {} for {}",
                response.status(),
                did
            )));
        }

        let asset: Asset = response.json().await?;
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        serde_json::from_value(serde_json::json!({
            "did": "did:op:abc",
            "encryptedFiles": "0xdeadbeef",
            "files": [{"contentType": "text/csv"}, {}],
            "services": [
                {"index": 0, "type": "access", "cost": "1"},
                {"index": 3, "type": "compute", "cost": "2"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_service_by_index() {
        let asset = asset();
        assert_eq!(asset.service_by_index(3).unwrap().service_type, "compute");
        assert!(asset.service_by_index(7).is_err());
    }

    #[test]
    fn test_content_type_at_index() {
        let asset = asset();
        assert_eq!(asset.content_type_at_index(0).as_deref(), Some("text/csv"));
        assert!(asset.content_type_at_index(1).is_none());
        assert!(asset.content_type_at_index(9).is_none());
    }

    #[test]
    fn test_consumable_defaults_true() {
        assert!(asset().consumable);
    }
}
