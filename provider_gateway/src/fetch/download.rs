//! Streaming download responder.
//!
//! Turns an upstream HTTP response into a client response without buffering
//! the body: headers are normalized up front, then the payload is relayed in
//! fixed-size chunks. Dropping the response mid-stream drops the upstream
//! connection with it.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::errors::{GatewayError, GatewayResult};
use crate::urlcheck::SafeUrlValidator;

/// Extension to MIME type table, mirroring the platform mapping the original
/// service relied on for download header reconciliation.
const MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("bin", "application/octet-stream"),
];

/// Best-guess extension (with leading dot) for a MIME type.
pub fn guess_extension(content_type: &str) -> Option<String> {
    let normalized = content_type.split(';').next()?.trim();
    MIME_TYPES
        .iter()
        .find(|(_, mime)| *mime == normalized)
        .map(|(ext, _)| format!(".{}", ext))
}

/// Best-guess MIME type for a filename, keyed by its extension.
pub fn guess_content_type(filename: &str) -> Option<String> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| mime.to_string())
}

/// Extract the filename parameter from a Content-Disposition header value.
pub fn disposition_filename(header_value: &str) -> Option<String> {
    for part in header_value.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("filename=") {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Orchestrates URL validation, the upstream fetch, header translation and
/// chunked streaming back to the caller.
pub struct DownloadGateway {
    client: reqwest::Client,
    validator: Arc<SafeUrlValidator>,
    chunk_size: usize,
}

impl DownloadGateway {
    pub fn new(validator: Arc<SafeUrlValidator>, timeout: Duration, chunk_size: usize) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            validator,
            chunk_size,
        }
    }

    /// Build the streaming client response for an asset download.
    ///
    /// `url` is the logical asset URL used for safety validation and filename
    /// derivation; `download_url` is the effective location fetched. A Range
    /// header on the inbound request is forwarded verbatim and mirrored back,
    /// skipping all filename handling. Failures surface before the first body
    /// byte whenever possible; the caller maps them onto the generic
    /// service-unavailable envelope.
    pub async fn build_download_response(
        &self,
        request_headers: &HeaderMap,
        url: &str,
        download_url: &str,
        content_type: Option<String>,
    ) -> GatewayResult<Response<Body>> {
        if !self.validator.is_safe_url(url).await {
            return Err(GatewayError::UnsafeUrl(url.to_string()));
        }

        let range_header = request_headers.get(header::RANGE).cloned();
        let is_range_request = range_header.is_some();

        let mut upstream_request = self.client.get(download_url);
        if let Some(range) = &range_header {
            upstream_request = upstream_request.header(header::RANGE, range.clone());
        }
        let upstream = upstream_request.send().await?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut builder = Response::builder().status(status);
        let mut content_type = content_type;

        if is_range_request {
            // Partial-content passthrough mirrors the Range header set.
            if let Some(range) = range_header {
                builder = builder.header(header::RANGE, range);
            }
        } else {
            let mut filename = url.rsplit('/').next().unwrap_or_default().to_string();

            if let Some(disposition) = upstream
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
            {
                if let Some(upstream_name) = disposition_filename(disposition) {
                    filename = upstream_name;
                }
            }

            if let Some(upstream_type) = upstream
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
            {
                content_type = Some(upstream_type.to_string());
            }

            let has_extension = filename.rsplit_once('.').is_some();
            match (&content_type, has_extension) {
                (None, true) => content_type = guess_content_type(&filename),
                (Some(known_type), false) => {
                    if let Some(extension) = guess_extension(known_type) {
                        filename.push_str(&extension);
                    }
                }
                _ => {}
            }

            builder = builder
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("attachment;filename={}", filename),
                )
                .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Disposition")
                .header(header::CONNECTION, "close");
        }

        if let Some(content_type) = content_type {
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                builder = builder.header(header::CONTENT_TYPE, value);
            }
        }

        // Relay the body in fixed-size chunks without materializing it.
        let byte_stream = upstream
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let chunked = ReaderStream::with_capacity(StreamReader::new(byte_stream), self.chunk_size);

        builder
            .body(Body::from_stream(chunked))
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_extension() {
        assert_eq!(guess_extension("text/plain").as_deref(), Some(".txt"));
        assert_eq!(
            guess_extension("text/plain; charset=utf-8").as_deref(),
            Some(".txt")
        );
        assert_eq!(guess_extension("application/pdf").as_deref(), Some(".pdf"));
        assert!(guess_extension("application/x-unknown").is_none());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("report.csv").as_deref(), Some("text/csv"));
        assert_eq!(guess_content_type("IMAGE.PNG").as_deref(), Some("image/png"));
        assert!(guess_content_type("archive.xyz").is_none());
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename("attachment; filename=\"quoted.bin\"").as_deref(),
            Some("quoted.bin")
        );
        assert_eq!(
            disposition_filename("attachment;filename=plain.txt").as_deref(),
            Some("plain.txt")
        );
        assert!(disposition_filename("inline").is_none());
    }

    #[tokio::test]
    async fn test_unsafe_url_is_rejected_before_fetch() {
        let validator = Arc::new(SafeUrlValidator::new(false));
        let gateway = DownloadGateway::new(validator, Duration::from_secs(3), 4096);

        let result = gateway
            .build_download_response(
                &HeaderMap::new(),
                "http://127.0.0.1/secret",
                "http://127.0.0.1/secret",
                None,
            )
            .await;

        assert!(matches!(result, Err(GatewayError::UnsafeUrl(_))));
    }
}
