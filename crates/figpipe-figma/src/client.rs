use std::collections::BTreeMap;

use serde_json::Value;

use figpipe_types::{FigpipeError, Result};

use crate::retry::{with_retry, BackoffPolicy};

// ---------------------------------------------------------------------------
// FigmaClient
// ---------------------------------------------------------------------------

/// Body and MIME type of a downloaded file. The MIME type has parameters stripped.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[derive(Debug, Clone)]
pub struct FigmaClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    policy: BackoffPolicy,
    max_retries: usize,
}

impl FigmaClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: "https://api.figma.com".to_string(),
            policy: BackoffPolicy::default(),
            max_retries: 3,
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: BackoffPolicy, max_retries: usize) -> Self {
        self.policy = policy;
        self.max_retries = max_retries;
        self
    }

    /// Token from `FIGMA_TOKEN`, falling back to `FIGMA_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self> {
        ["FIGMA_TOKEN", "FIGMA_ACCESS_TOKEN"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .map(|token| Self::new(token.trim().to_string()))
            .ok_or_else(FigmaClient::auth_error)
    }

    fn auth_error() -> FigpipeError {
        FigpipeError::AuthError {
            service: "figma".into(),
        }
    }

    // -- Endpoints ------------------------------------------------------------

    /// `GET /v1/files/:key/nodes?ids=:node_id`. The node lives at `nodes[node_id].document`.
    pub async fn file_nodes(&self, file_key: &str, node_id: &str) -> Result<Value> {
        let url = format!("{}/v1/files/{file_key}/nodes", self.base_url);
        let query = [("ids", node_id.to_string())];
        with_retry(
            || self.get_json(&url, &query),
            self.max_retries,
            &self.policy,
            "file_nodes",
        )
        .await
    }

    /// `GET /v1/files/:key/images`: every image-fill reference in the file mapped to a URL.
    pub async fn image_fills(&self, file_key: &str) -> Result<BTreeMap<String, String>> {
        let url = format!("{}/v1/files/{file_key}/images", self.base_url);
        let body = with_retry(
            || self.get_json(&url, &[]),
            self.max_retries,
            &self.policy,
            "image_fills",
        )
        .await?;
        Ok(parse_image_fills(&body))
    }

    /// `GET /v1/images/:key`: a PNG render URL for one node, if Figma produced one.
    pub async fn render_node(&self, file_key: &str, node_id: &str, scale: f64) -> Result<Option<String>> {
        let url = format!("{}/v1/images/{file_key}", self.base_url);
        let query = [
            ("ids", node_id.to_string()),
            ("format", "png".to_string()),
            ("scale", scale.to_string()),
        ];
        let body = with_retry(
            || self.get_json(&url, &query),
            self.max_retries,
            &self.policy,
            "render_node",
        )
        .await?;
        parse_render_url(&body, node_id)
    }

    /// Download an arbitrary URL (image CDN links are pre-signed, so no token is sent).
    pub async fn download(&self, url: &str) -> Result<RemoteFile> {
        with_retry(
            || self.download_once(url),
            self.max_retries,
            &self.policy,
            "download",
        )
        .await
    }

    // -- Transport ------------------------------------------------------------

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        tracing::debug!(url, "Figma API request");
        let resp = self
            .client
            .get(url)
            .header("X-Figma-Token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| FigpipeError::Http(e.to_string()))?;

        let status = resp.status();
        let retry_after = parse_retry_after(
            resp.headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let body = resp
            .text()
            .await
            .map_err(|e| FigpipeError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(map_error(status.as_u16(), &body, retry_after));
        }

        serde_json::from_str(&body).map_err(|e| FigpipeError::ApiError {
            status: status.as_u16(),
            message: format!("Failed to parse response JSON: {e}"),
            retryable: false,
        })
    }

    async fn download_once(&self, url: &str) -> Result<RemoteFile> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FigpipeError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(
                resp.headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            let body = resp.text().await.unwrap_or_default();
            return Err(map_error(status.as_u16(), &body, retry_after));
        }

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(strip_mime_params)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FigpipeError::Http(e.to_string()))?;

        Ok(RemoteFile {
            bytes: bytes.to_vec(),
            mime,
        })
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

fn parse_image_fills(body: &Value) -> BTreeMap<String, String> {
    body["meta"]["images"]
        .as_object()
        .into_iter()
        .flatten()
        .filter_map(|(image_ref, url)| {
            url.as_str()
                .filter(|u| !u.is_empty())
                .map(|u| (image_ref.clone(), u.to_string()))
        })
        .collect()
}

fn parse_render_url(body: &Value, node_id: &str) -> Result<Option<String>> {
    if let Some(err) = body["err"].as_str().filter(|e| !e.is_empty()) {
        return Err(FigpipeError::ApiError {
            status: body["status"].as_u64().unwrap_or(400) as u16,
            message: err.to_string(),
            retryable: false,
        });
    }
    Ok(body["images"][node_id]
        .as_str()
        .filter(|u| !u.is_empty())
        .map(str::to_string))
}

fn strip_mime_params(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// `Retry-After` in whole or fractional seconds, as milliseconds.
fn parse_retry_after(header: Option<&str>) -> Option<u64> {
    header
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0) as u64)
}

fn map_error(status: u16, body: &str, retry_after_ms: Option<u64>) -> FigpipeError {
    match status {
        429 => FigpipeError::RateLimited {
            retry_after_ms: retry_after_ms.unwrap_or(1000),
        },
        401 | 403 => FigmaClient::auth_error(),
        500..=599 => FigpipeError::ApiError {
            status,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => FigpipeError::ApiError {
            status,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["err"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_limit_uses_retry_after_header() {
        let err = map_error(429, "", parse_retry_after(Some("2.5")));
        assert!(matches!(err, FigpipeError::RateLimited { retry_after_ms: 2500 }));

        let err = map_error(429, "", parse_retry_after(None));
        assert!(matches!(err, FigpipeError::RateLimited { retry_after_ms: 1000 }));
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_statuses_are_terminal() {
        for status in [401, 403] {
            let err = map_error(status, r#"{"status":403,"err":"Invalid token"}"#, None);
            assert!(matches!(err, FigpipeError::AuthError { .. }));
            assert!(err.is_terminal());
        }
    }

    #[test]
    fn server_errors_retry_client_errors_do_not() {
        match map_error(502, "bad gateway", None) {
            FigpipeError::ApiError {
                status,
                retryable,
                message,
            } => {
                assert_eq!(status, 502);
                assert!(retryable);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected {other:?}"),
        }

        match map_error(404, r#"{"status":404,"err":"Not found"}"#, None) {
            FigpipeError::ApiError {
                retryable, message, ..
            } => {
                assert!(!retryable);
                assert_eq!(message, "Not found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn image_fills_skip_null_urls() {
        let body = json!({
            "error": false,
            "meta": {"images": {"ref-a": "https://cdn/a.png", "ref-b": null}}
        });
        let fills = parse_image_fills(&body);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills["ref-a"], "https://cdn/a.png");
    }

    #[test]
    fn render_url_lookup() {
        let body = json!({"err": null, "images": {"1:2": "https://cdn/render.png"}});
        assert_eq!(
            parse_render_url(&body, "1:2").unwrap().as_deref(),
            Some("https://cdn/render.png")
        );
        assert_eq!(parse_render_url(&body, "9:9").unwrap(), None);

        let failed = json!({"err": "Render timeout", "status": 400});
        assert!(matches!(
            parse_render_url(&failed, "1:2"),
            Err(FigpipeError::ApiError { status: 400, .. })
        ));
    }

    #[test]
    fn mime_parameters_are_stripped() {
        assert_eq!(strip_mime_params("image/PNG; charset=binary"), "image/png");
        assert_eq!(strip_mime_params("image/jpeg"), "image/jpeg");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = FigmaClient::new("t".into()).with_base_url("http://localhost:9/".into());
        assert_eq!(client.base_url, "http://localhost:9");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client = FigmaClient::new("t".into())
            .with_base_url("http://127.0.0.1:9".into())
            .with_retry_policy(BackoffPolicy::None, 0);
        let err = client.file_nodes("abcdefghijkl", "1:2").await.unwrap_err();
        assert!(matches!(err, FigpipeError::Http(_)));
    }
}
