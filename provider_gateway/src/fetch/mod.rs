//! Upstream content access: metadata probes and the streaming download path.

pub mod download;
pub mod probe;

pub use download::DownloadGateway;
pub use probe::{ContentProbe, FileInfo};

use url::Url;

/// Append caller-supplied userdata to a URL as query parameters.
///
/// Userdata may arrive as a JSON object or as a string containing one. A
/// value that cannot be decoded is ignored and the URL passed through.
pub fn append_userdata(url: &str, userdata: Option<&serde_json::Value>) -> String {
    let userdata = match userdata {
        Some(value) => value,
        None => return url.to_string(),
    };

    let object = match userdata {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::String(raw) => match serde_json::from_str(raw) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => {
                log::info!(
                    "Can not decode sent userdata for asset, sending without extra GET parameters."
                );
                return url.to_string();
            }
        },
        _ => {
            log::info!(
                "Can not decode sent userdata for asset, sending without extra GET parameters."
            );
            return url.to_string();
        }
    };

    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    {
        let mut pairs = parsed.query_pairs_mut();
        for (key, value) in &object {
            match value {
                serde_json::Value::String(s) => pairs.append_pair(key, s),
                other => pairs.append_pair(key, &other.to_string()),
            };
        }
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_userdata_object() {
        let url = append_userdata("http://example.com/data", Some(&json!({"key": "value"})));
        assert_eq!(url, "http://example.com/data?key=value");
    }

    #[test]
    fn test_append_userdata_string_form() {
        let url = append_userdata(
            "http://example.com/data",
            Some(&json!("{\"a\":\"1\",\"b\":\"2\"}")),
        );
        assert!(url.contains("a=1"));
        assert!(url.contains("b=2"));
    }

    #[test]
    fn test_append_userdata_absent_or_invalid() {
        assert_eq!(
            append_userdata("http://example.com/data", None),
            "http://example.com/data"
        );
        assert_eq!(
            append_userdata("http://example.com/data", Some(&json!("not json"))),
            "http://example.com/data"
        );
        assert_eq!(
            append_userdata("http://example.com/data", Some(&json!(42))),
            "http://example.com/data"
        );
    }
}
