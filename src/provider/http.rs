//! HTTP client wrapper for LLM API requests.

use crate::credential::CredentialStore;
use crate::provider::error::{Error, format_api_error};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;

/// HTTP request timeout. Tool-heavy completions can be slow.
const TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    /// Read on every request, so a key changed at runtime takes effect.
    credentials: Arc<CredentialStore>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, credentials: Arc<CredentialStore>) -> Self {
        // Pooled connections belong to the runtime that opened them, and each
        // request runs on a fresh runtime, so idle connections are never kept.
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key = self
            .credentials
            .get()
            .ok_or_else(|| Error::MissingApiKey {
                env_var: self.credentials.env_var().to_string(),
            })?;
        let value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| Error::Api("Bearer token contains invalid header characters".into()))?;
        headers.insert(AUTHORIZATION, value);

        Ok(headers)
    }

    /// POST a JSON body and deserialize the response.
    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, Error> {
        let url = format!("{}{path}", self.base_url);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(&response);
            return Err(Error::RateLimited { retry_after });
        }
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api(format_api_error(&format!(
                "HTTP {status}: {text}"
            ))));
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Api(format!("Failed to parse response: {e}\nBody: {text}")))
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get(RETRY_AFTER)?;
    parse_retry_after_value(value.to_str().ok()?)
}

/// Parse a `Retry-After` value as whole seconds, rounding fractions up.
fn parse_retry_after_value(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        Some(secs.max(1))
    } else if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() && f > 0.0 {
            Some((f.ceil() as u64).max(1))
        } else {
            None
        }
    } else {
        None
    }
}
