//! Provider error types.

use thiserror::Error;

/// Format an API error for display, extracting message from JSON if present.
///
/// - `"HTTP 401: {"error": {"message": "..."}}"` → extracts message
/// - Plain text errors → returns as-is
#[must_use]
pub fn format_api_error(error: &str) -> String {
    if let Some(json_start) = error.find('{') {
        let json_str = &error[json_start..];

        if let Ok(json) = serde_json::from_str::<serde_json::Value>(json_str)
            && let Some(msg) = extract_error_message(&json)
        {
            // Preserve HTTP status prefix if present
            let prefix = &error[..json_start].trim();
            if prefix.is_empty() {
                return msg;
            }
            return format!("{prefix} {msg}");
        }
    }

    error.to_string()
}

fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "...", "code": "..."}}
    // {"error": "..."}
    // {"message": "..."}
    if let Some(error_obj) = json.get("error") {
        if let Some(msg) = error_obj.get("message").and_then(|v| v.as_str()) {
            let mut result = msg.to_string();
            if let Some(code) = error_obj.get("code").and_then(|v| v.as_str()) {
                result = format!("{result} (code: {code})");
            }
            return Some(result);
        }

        if let Some(msg) = error_obj.as_str() {
            return Some(msg.to_string());
        }
    }

    json.get("message")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing API key. Set {env_var} or enter a key in the sidebar")]
    MissingApiKey { env_var: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_openai_error() {
        let error = r#"HTTP 401: {"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            format_api_error(error),
            "HTTP 401: Incorrect API key provided (code: invalid_api_key)"
        );
    }

    #[test]
    fn test_format_simple_error() {
        let error = r#"{"error":"Invalid API key"}"#;
        assert_eq!(format_api_error(error), "Invalid API key");
    }

    #[test]
    fn test_format_top_level_message() {
        assert_eq!(
            format_api_error(r#"{"message":"Something went wrong"}"#),
            "Something went wrong"
        );
    }

    #[test]
    fn test_format_plain_and_unparseable() {
        assert_eq!(format_api_error("Connection refused"), "Connection refused");
        assert_eq!(
            format_api_error("HTTP 500: {invalid json}"),
            "HTTP 500: {invalid json}"
        );
    }

    #[test]
    fn test_missing_key_message_names_variable() {
        let err = Error::MissingApiKey {
            env_var: "OPENAI_API_KEY".into(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
