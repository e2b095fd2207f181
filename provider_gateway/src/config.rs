//! Environment-driven configuration for the gateway.

use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration, loaded once at startup and shared through the
/// application state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the HTTP server.
    pub listen_address: String,
    /// Hex-encoded secp256k1 secret key the gateway signs outbound payloads with.
    pub provider_private_key: String,
    /// Asset directory (metadata catalog) base URL.
    pub aquarius_url: String,
    /// Compute cluster (operator service) base URL.
    pub operator_service_url: String,
    /// Ledger verification service base URL.
    pub ledger_service_url: String,
    /// Document codec service base URL.
    pub codec_service_url: String,
    /// When set, URLs resolving to private/loopback/reserved addresses are
    /// allowed through with a warning instead of being rejected.
    pub allow_non_public_ip: bool,
    /// Timeout applied to metadata probes and collaborator calls.
    pub requests_timeout: Duration,
    /// Connect timeout applied before the first byte of a download.
    pub download_timeout: Duration,
    /// Chunk size for checksum reads and response streaming.
    pub requests_chunk_size: usize,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str) -> bool {
    matches!(
        std::env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Load configuration from the environment. Only the signing key is
    /// mandatory; everything else has a development default.
    pub fn from_env() -> Result<Self> {
        let provider_private_key = std::env::var("PROVIDER_PRIVATE_KEY")
            .context("PROVIDER_PRIVATE_KEY was not found in the environment variables")?;

        let requests_timeout_secs: u64 = env_or("REQUESTS_TIMEOUT", "10")
            .parse()
            .context("REQUESTS_TIMEOUT must be an integer number of seconds")?;
        let download_timeout_secs: u64 = env_or("DOWNLOAD_TIMEOUT", "3")
            .parse()
            .context("DOWNLOAD_TIMEOUT must be an integer number of seconds")?;
        let requests_chunk_size: usize = env_or("REQUESTS_CHUNK_SIZE", "4096")
            .parse()
            .context("REQUESTS_CHUNK_SIZE must be an integer number of bytes")?;

        Ok(Self {
            listen_address: env_or("PROVIDER_ADDRESS", "0.0.0.0:8030"),
            provider_private_key,
            aquarius_url: env_or("AQUARIUS_URL", "http://localhost:5000"),
            operator_service_url: env_or("OPERATOR_SERVICE_URL", "http://localhost:8050"),
            ledger_service_url: env_or("LEDGER_SERVICE_URL", "http://localhost:8545"),
            codec_service_url: env_or("CODEC_SERVICE_URL", "http://localhost:8040"),
            allow_non_public_ip: env_bool("ALLOW_NON_PUBLIC_IP"),
            requests_timeout: Duration::from_secs(requests_timeout_secs),
            download_timeout: Duration::from_secs(download_timeout_secs),
            requests_chunk_size,
        })
    }

    /// Compute cluster job-control endpoint.
    pub fn compute_endpoint(&self) -> String {
        format!("{}/api/v1/operator/compute", self.operator_service_url)
    }

    /// Compute cluster result-retrieval endpoint.
    pub fn compute_result_endpoint(&self) -> String {
        format!("{}/api/v1/operator/getResult", self.operator_service_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8030".to_string(),
            provider_private_key: String::new(),
            aquarius_url: "http://localhost:5000".to_string(),
            operator_service_url: "http://localhost:8050".to_string(),
            ledger_service_url: "http://localhost:8545".to_string(),
            codec_service_url: "http://localhost:8040".to_string(),
            allow_non_public_ip: false,
            requests_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(3),
            requests_chunk_size: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_endpoints() {
        let config = Config {
            operator_service_url: "http://operator:8050".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.compute_endpoint(),
            "http://operator:8050/api/v1/operator/compute"
        );
        assert_eq!(
            config.compute_result_endpoint(),
            "http://operator:8050/api/v1/operator/getResult"
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.allow_non_public_ip);
        assert_eq!(config.requests_chunk_size, 4096);
        assert_eq!(config.download_timeout, Duration::from_secs(3));
    }
}
