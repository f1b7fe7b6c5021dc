//! HTTP client, auth headers and diagnostic redaction.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::error::{Result, StepError};

/// Placeholder written over secrets and image payloads in diagnostics.
pub const REDACTED: &str = "...";

/// Build the HTTP client used for provider requests.
///
/// No request timeout is configured; a hung backend hangs the run.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .build()
        .map_err(StepError::Network)
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("x-api-key", val);
    }
    if let Ok(val) = HeaderValue::from_str(version) {
        headers.insert("anthropic-version", val);
    }
    headers
}

/// Add fixed per-provider headers (e.g. `Accept`).
pub fn extend_headers(headers: &mut HeaderMap, extra: &[(String, String)]) {
    for (name, value) in extra {
        let name = if name.eq_ignore_ascii_case("accept") {
            ACCEPT
        } else {
            match HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()) {
                Ok(n) => n,
                Err(_) => continue,
            }
        };
        if let Ok(val) = HeaderValue::from_str(value) {
            headers.insert(name, val);
        }
    }
}

/// Render headers as JSON text with credentials masked.
pub fn describe_headers(headers: &HeaderMap) -> String {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        let shown = if name == AUTHORIZATION {
            match value.to_str() {
                Ok(v) if v.starts_with("Bearer ") => format!("Bearer {REDACTED}"),
                _ => REDACTED.to_string(),
            }
        } else if name.as_str() == "x-api-key" {
            REDACTED.to_string()
        } else {
            value.to_str().unwrap_or(REDACTED).to_string()
        };
        map.insert(name.to_string(), Value::String(shown));
    }
    Value::Object(map).to_string()
}

/// Replace embedded base64 image payloads with a placeholder.
///
/// Handles both the `image.source.data` and the `image_url.url` data-URL
/// shapes, at any depth.
pub fn redact_images(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let is_image = map.get("type").and_then(Value::as_str) == Some("image");
            if is_image {
                if let Some(Value::Object(source)) = map.get_mut("source") {
                    if source.contains_key("data") {
                        source.insert("data".into(), Value::String(REDACTED.into()));
                    }
                }
                // Canonical image parts carry the payload inline.
                if map.contains_key("data") {
                    map.insert("data".into(), Value::String(REDACTED.into()));
                }
            }
            if let Some(Value::Object(image_url)) = map.get_mut("image_url") {
                let is_data_url = image_url
                    .get("url")
                    .and_then(Value::as_str)
                    .is_some_and(|u| u.starts_with("data:"));
                if is_data_url {
                    image_url.insert("url".into(), Value::String(REDACTED.into()));
                }
            }
            for child in map.values_mut() {
                redact_images(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_images(item);
            }
        }
        _ => {}
    }
}

/// Pretty-print a provider error body, parsing it as JSON when the provider
/// returns JSON errors.
pub fn describe_response(body: &str, is_json: bool) -> String {
    if is_json {
        if let Ok(parsed) = serde_json::from_str::<Value>(body) {
            return serde_json::to_string_pretty(&parsed).unwrap_or_else(|_| body.to_string());
        }
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_anthropic_and_openai_image_payloads() {
        let mut body = json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "look"},
                    {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            }]
        });
        redact_images(&mut body);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "look");
        assert_eq!(content[1]["source"]["data"], REDACTED);
        assert_eq!(content[2]["image_url"]["url"], REDACTED);
    }

    #[test]
    fn remote_image_urls_are_kept() {
        let mut body = json!({"image_url": {"url": "https://example.test/cat.png"}});
        redact_images(&mut body);
        assert_eq!(body["image_url"]["url"], "https://example.test/cat.png");
    }

    #[test]
    fn describe_headers_masks_credentials() {
        let mut headers = bearer_headers("sk-secret");
        headers.extend(anthropic_headers("ak-secret", "2023-06-01"));
        let text = describe_headers(&headers);
        assert!(!text.contains("sk-secret"));
        assert!(!text.contains("ak-secret"));
        assert!(text.contains("2023-06-01"));
    }

    #[test]
    fn extend_headers_adds_accept() {
        let mut headers = bearer_headers("k");
        extend_headers(&mut headers, &[("Accept".into(), "application/json".into())]);
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
    }
}
