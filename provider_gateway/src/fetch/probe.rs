//! Lightweight upstream metadata probes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT_ENCODING};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::urlcheck::SafeUrlValidator;

/// Content metadata discovered by a probe.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileInfo {
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "contentLength", skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(rename = "checksumType", skip_serializing_if = "Option::is_none")]
    pub checksum_type: Option<String>,
}

/// Issues HEAD/OPTIONS probes with a streamed-GET fallback to discover
/// content type, length and (optionally) a SHA-256 checksum without keeping
/// the body in memory.
pub struct ContentProbe {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    validator: Arc<SafeUrlValidator>,
}

impl ContentProbe {
    pub fn new(validator: Arc<SafeUrlValidator>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        // Checksum reads stream the whole body, however large; only
        // connection setup is bounded on that client.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            stream_client,
            validator,
        }
    }

    /// Probe a URL. Returns `(false, empty)` for unsafe URLs and any
    /// transport-level failure; never a hard error.
    pub async fn check_url_details(&self, url: &str, with_checksum: bool) -> (bool, FileInfo) {
        if !self.validator.is_safe_url(url).await {
            return (false, FileInfo::default());
        }

        match self.probe(url, with_checksum).await {
            Ok(result) => result,
            Err(e) => {
                log::debug!("probe for {} failed: {}", url, e);
                (false, FileInfo::default())
            }
        }
    }

    async fn probe(&self, url: &str, with_checksum: bool) -> reqwest::Result<(bool, FileInfo)> {
        for method in [Method::HEAD, Method::OPTIONS] {
            let response = self
                .client
                .request(method, url)
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await?;

            let status = response.status();
            let headers = response.headers().clone();
            let sufficient = status == StatusCode::OK
                && (headers.contains_key("content-type") || headers.contains_key("content-range"))
                && headers.contains_key("content-length");

            if !with_checksum && sufficient {
                return Ok(extract_details(status, &headers, None));
            }
        }

        if !with_checksum {
            // Fall back on a GET request; only the headers are reported.
            let response = self
                .client
                .get(url)
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await?;
            return Ok(extract_details(
                response.status(),
                &response.headers().clone(),
                None,
            ));
        }

        // Checksum requested: read the full body in chunks, keeping only the
        // running digest.
        let response = self.stream_client.get(url).send().await?;
        let response = response.error_for_status()?;
        let status = response.status();
        let headers = response.headers().clone();

        let mut sha = Sha256::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            sha.update(&chunk?);
        }
        let digest = hex::encode(sha.finalize());

        Ok(extract_details(status, &headers, Some(digest)))
    }
}

fn extract_details(
    status: StatusCode,
    headers: &HeaderMap,
    checksum: Option<String>,
) -> (bool, FileInfo) {
    if status != StatusCode::OK {
        return (false, FileInfo::default());
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };

    let mut content_length = header_str("content-length");
    let content_range = header_str("content-range");

    // Some servers send Content-Range instead of Content-Length.
    if content_length.is_none() {
        if let Some(range) = content_range {
            if let Some(tail) = range.split('-').nth(1) {
                content_length = Some(tail.to_string());
            }
        }
    }

    let content_type = header_str("content-type")
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
        .filter(|v| !v.is_empty());

    if content_type.is_none() && content_length.is_none() {
        return (false, FileInfo::default());
    }

    let checksum_type = checksum.as_ref().map(|_| "sha256".to_string());
    (
        true,
        FileInfo {
            content_type: Some(content_type.unwrap_or_default()),
            content_length: Some(content_length.unwrap_or_default()),
            checksum,
            checksum_type,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_extract_plain_headers() {
        let headers = headers(&[("content-type", "text/plain; charset=utf-8"), ("content-length", "123")]);
        let (valid, info) = extract_details(StatusCode::OK, &headers, None);
        assert!(valid);
        assert_eq!(info.content_type.as_deref(), Some("text/plain"));
        assert_eq!(info.content_length.as_deref(), Some("123"));
        assert!(info.checksum.is_none());
    }

    #[test]
    fn test_content_range_fallback() {
        let headers = headers(&[("content-type", "application/pdf"), ("content-range", "bytes 0-999/1000")]);
        let (valid, info) = extract_details(StatusCode::OK, &headers, None);
        assert!(valid);
        assert_eq!(info.content_length.as_deref(), Some("999/1000"));
    }

    #[test]
    fn test_non_200_is_invalid() {
        let headers = headers(&[("content-type", "text/plain"), ("content-length", "10")]);
        let (valid, info) = extract_details(StatusCode::NOT_FOUND, &headers, None);
        assert!(!valid);
        assert!(info.content_type.is_none());
    }

    #[test]
    fn test_missing_all_headers_is_invalid() {
        let (valid, _) = extract_details(StatusCode::OK, &HeaderMap::new(), None);
        assert!(!valid);
    }

    #[test]
    fn test_checksum_tagging() {
        let headers = headers(&[("content-length", "4")]);
        let (valid, info) = extract_details(StatusCode::OK, &headers, Some("abcd".to_string()));
        assert!(valid);
        assert_eq!(info.checksum.as_deref(), Some("abcd"));
        assert_eq!(info.checksum_type.as_deref(), Some("sha256"));
    }
}
