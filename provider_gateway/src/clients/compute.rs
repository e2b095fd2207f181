//! Compute cluster (operator service) client.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::errors::GatewayResult;

/// Operational limits advertised by the cluster.
#[derive(Debug, Clone, Default)]
pub struct ComputeLimits {
    pub algo_time_limit: Option<u64>,
    pub storage_expiry: Option<u64>,
}

/// Thin HTTP client for the job-dispatch backend. The gateway forwards
/// provider-signed payloads and relays whatever the cluster answers.
pub struct ComputeClusterClient {
    client: reqwest::Client,
    base_url: String,
    compute_endpoint: String,
    result_endpoint: String,
}

impl ComputeClusterClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            compute_endpoint: format!("{}/api/v1/operator/compute", base_url),
            result_endpoint: format!("{}/api/v1/operator/getResult", base_url),
            client,
            base_url,
        }
    }

    /// Forward a job-control request, returning the relayed status and body.
    pub async fn forward(
        &self,
        method: Method,
        params: &[(&str, String)],
    ) -> GatewayResult<(StatusCode, Vec<u8>)> {
        let response = self
            .client
            .request(method, &self.compute_endpoint)
            .query(params)
            .header("Content-Type", "application/json")
            .header("Connection", "close")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok((status, body))
    }

    /// Submit a new job payload.
    pub async fn start(&self, payload: &Value) -> GatewayResult<(StatusCode, Vec<u8>)> {
        let response = self
            .client
            .post(&self.compute_endpoint)
            .header("Content-Type", "application/json")
            .header("Connection", "close")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok((status, body))
    }

    /// Result-retrieval URL with the given query parameters attached.
    pub fn result_url(&self, params: &[(&str, String)]) -> String {
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        format!("{}?{}", self.result_endpoint, query.join("&"))
    }

    /// Cluster account address and limits from the operator root document.
    /// Any failure degrades to `None` rather than erroring.
    pub async fn compute_info(&self) -> (Option<String>, ComputeLimits) {
        let info: Option<Value> = match self.client.get(&self.base_url).send().await {
            Ok(response) => response.json().await.ok(),
            Err(e) => {
                log::error!("Error getting compute cluster info: {}", e);
                None
            }
        };

        match info {
            Some(info) => {
                let limits = ComputeLimits {
                    algo_time_limit: info.get("algoTimeLimit").and_then(Value::as_u64),
                    storage_expiry: info.get("storageExpiry").and_then(Value::as_u64),
                };
                let address = info
                    .get("address")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                (address, limits)
            }
            None => (None, ComputeLimits::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_url_encoding() {
        let client = ComputeClusterClient::new("http://operator:8050/", Duration::from_secs(5));
        let url = client.result_url(&[
            ("jobId", "job-1".to_string()),
            ("consumerAddress", "0xAbC".to_string()),
            ("consumerSignature", "0x01+02".to_string()),
        ]);
        assert!(url.starts_with("http://operator:8050/api/v1/operator/getResult?"));
        assert!(url.contains("jobId=job-1"));
        assert!(url.contains("consumerSignature=0x01%2B02"));
    }

    #[test]
    fn test_endpoints_are_derived_from_base() {
        let client = ComputeClusterClient::new("http://operator:8050", Duration::from_secs(5));
        assert_eq!(
            client.compute_endpoint,
            "http://operator:8050/api/v1/operator/compute"
        );
    }
}
