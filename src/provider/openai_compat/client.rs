//! OpenAI-compatible API client.

use super::request::{
    FunctionCall, FunctionDefinition, OpenAIMessage, OpenAIRequest, OpenAITool, ToolCall,
};
use super::response::OpenAIResponse;
use crate::credential::CredentialStore;
use crate::provider::client::LlmApi;
use crate::provider::error::Error;
use crate::provider::http::HttpClient;
use crate::provider::types::{ChatRequest, ContentBlock, Message, Role, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct OpenAICompatClient {
    http: HttpClient,
}

impl OpenAICompatClient {
    /// The API key is looked up in `credentials` for every request.
    pub fn new(base_url: impl Into<String>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            http: HttpClient::new(base_url, credentials),
        }
    }

    /// Build an OpenAI-compatible request.
    fn build_request(request: &ChatRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref sys) = request.system {
            messages.push(OpenAIMessage::text("system", sys.clone()));
        }

        for msg in &request.messages {
            match msg.role {
                Role::System => {
                    if let Some(text) = msg.text() {
                        messages.push(OpenAIMessage::text("system", text));
                    }
                }
                Role::User => {
                    messages.push(OpenAIMessage::text("user", msg.text().unwrap_or_default()));
                }
                Role::Assistant => {
                    let tool_calls: Vec<ToolCall> = msg
                        .tool_calls()
                        .into_iter()
                        .map(|call| ToolCall {
                            id: call.id,
                            call_type: "function".to_string(),
                            function: FunctionCall {
                                name: call.name,
                                arguments: encode_arguments(&call.arguments),
                            },
                        })
                        .collect();

                    messages.push(OpenAIMessage {
                        role: "assistant".to_string(),
                        content: msg.text(),
                        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                        tool_call_id: None,
                    });
                }
                Role::ToolResult => {
                    for block in &msg.content {
                        if let ContentBlock::ToolResult {
                            tool_call_id,
                            content,
                            is_error,
                        } = block
                        {
                            let content = if *is_error {
                                format!("[ERROR] {content}")
                            } else {
                                content.clone()
                            };
                            messages.push(OpenAIMessage {
                                role: "tool".to_string(),
                                content: Some(content),
                                tool_calls: None,
                                tool_call_id: Some(tool_call_id.clone()),
                            });
                        }
                    }
                }
            }
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(convert_tool).collect())
        };

        OpenAIRequest {
            model: request.model.clone(),
            messages,
            tools,
            max_completion_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    /// Convert the first choice of a response into an assistant message.
    fn convert_response(response: OpenAIResponse) -> Result<Message, Error> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmptyResponse(response.model.clone()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content
            && !text.is_empty()
        {
            content.push(ContentBlock::Text { text });
        }

        for call in choice.message.tool_calls.unwrap_or_default() {
            let arguments = decode_arguments(&call.function.arguments);
            content.push(ContentBlock::ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            });
        }

        Ok(Message {
            role: Role::Assistant,
            content,
        })
    }
}

fn convert_tool(tool: &ToolDefinition) -> OpenAITool {
    OpenAITool {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[async_trait]
impl LlmApi for OpenAICompatClient {
    fn id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: ChatRequest) -> Result<Message, Error> {
        let api_request = Self::build_request(&request);

        tracing::debug!(
            model = %api_request.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.as_ref().map_or(0, Vec::len),
            "OpenAI API request"
        );

        let response: OpenAIResponse = self
            .http
            .post_json("/chat/completions", &api_request)
            .await?;

        if let Some(ref usage) = response.usage {
            tracing::debug!(
                input = usage.prompt_tokens,
                output = usage.completion_tokens,
                "OpenAI API usage"
            );
        }

        Self::convert_response(response)
    }
}

/// Parse the model's argument string. Blank means no arguments; text that is
/// not JSON is kept verbatim so the tool loop can report it back.
fn decode_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".to_string(),
            messages,
            system: Some("You are a browsing assistant".to_string()),
            tools: vec![ToolDefinition {
                name: "puppeteer_puppeteer_navigate".into(),
                description: "Navigate to a URL".into(),
                parameters: json!({"type": "object", "properties": {"url": {"type": "string"}}}),
            }],
            max_tokens: Some(2048),
            temperature: None,
        }
    }

    #[test]
    fn test_build_request_places_system_first() {
        let api = OpenAICompatClient::build_request(&request(vec![Message::user("go")]));

        assert_eq!(api.messages.len(), 2);
        assert_eq!(api.messages[0].role, "system");
        assert_eq!(api.messages[1].role, "user");
        assert_eq!(api.messages[1].content.as_deref(), Some("go"));
        assert_eq!(api.max_completion_tokens, Some(2048));
        assert_eq!(api.tools.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_build_request_tool_round_trip_messages() {
        let messages = vec![
            Message::user("open example.com"),
            Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolCall {
                    id: "call_1".into(),
                    name: "puppeteer_puppeteer_navigate".into(),
                    arguments: json!({"url": "https://example.com"}),
                }],
            },
            Message {
                role: Role::ToolResult,
                content: vec![ContentBlock::ToolResult {
                    tool_call_id: "call_1".into(),
                    content: "timeout".into(),
                    is_error: true,
                }],
            },
        ];

        let api = OpenAICompatClient::build_request(&request(messages));
        let assistant = &api.messages[2];
        assert_eq!(assistant.role, "assistant");
        assert!(assistant.content.is_none());
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"url":"https://example.com"}"#);

        let tool = &api.messages[3];
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool.content.as_deref(), Some("[ERROR] timeout"));
    }

    #[test]
    fn test_convert_response_with_tool_calls() {
        let response: OpenAIResponse = serde_json::from_value(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": "Opening the page",
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "puppeteer_puppeteer_screenshot", "arguments": "{\"name\":\"shot\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let msg = OpenAICompatClient::convert_response(response).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text().as_deref(), Some("Opening the page"));
        let calls = msg.tool_calls();
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].arguments, json!({"name": "shot"}));
    }

    #[test]
    fn test_convert_response_keeps_unparseable_arguments() {
        let response: OpenAIResponse = serde_json::from_value(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "puppeteer_puppeteer_navigate", "arguments": "{\"url\": \"https://exa"}},
                        {"id": "call_2", "type": "function",
                         "function": {"name": "puppeteer_puppeteer_screenshot", "arguments": "  "}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let msg = OpenAICompatClient::convert_response(response).unwrap();
        let calls = msg.tool_calls();
        assert_eq!(calls[0].arguments, json!(r#"{"url": "https://exa"#));
        assert_eq!(calls[1].arguments, json!({}));

        // Echoed back to the API exactly as the model sent it.
        let api = OpenAICompatClient::build_request(&request(vec![msg]));
        let echoed = api.messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(echoed[0].function.arguments, r#"{"url": "https://exa"#);
        assert_eq!(echoed[1].function.arguments, "{}");
    }

    #[test]
    fn test_convert_response_without_choices() {
        let response: OpenAIResponse =
            serde_json::from_value(json!({"model": "gpt-4o", "choices": []})).unwrap();
        let err = OpenAICompatClient::convert_response(response).unwrap_err();
        assert!(matches!(err, Error::EmptyResponse(_)));
    }
}
