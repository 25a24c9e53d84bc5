//! Tool-calling loop between the LLM and an agent's MCP tools.

use super::{AgentError, Reasoning, RequestParams};
use crate::mcp::ToolSource;
use crate::provider::{ChatRequest, ContentBlock, LlmApi, Message, Role};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// An LLM augmented with an agent's tools and a conversation history.
pub struct AugmentedLlm {
    api: Arc<dyn LlmApi>,
    tools: Arc<dyn ToolSource>,
    instruction: String,
    default_model: String,
    history: Vec<Message>,
}

impl AugmentedLlm {
    pub fn new(
        api: Arc<dyn LlmApi>,
        tools: Arc<dyn ToolSource>,
        instruction: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            api,
            tools,
            instruction: instruction.into(),
            default_model: default_model.into(),
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run every requested tool in order. A failing tool, or a call whose
    /// arguments are not a JSON object, becomes an error result for the model
    /// to react to.
    async fn run_tools(&self, reply: &Message) -> Vec<ContentBlock> {
        let mut results = Vec::new();
        for call in reply.tool_calls() {
            if !call.arguments.is_object() {
                warn!(tool = %call.name, "Rejecting tool call with malformed arguments");
                results.push(ContentBlock::ToolResult {
                    tool_call_id: call.id,
                    content: format!(
                        "Invalid arguments for {}: expected a JSON object, got {}",
                        call.name, call.arguments
                    ),
                    is_error: true,
                });
                continue;
            }
            debug!(tool = %call.name, "Calling tool");
            let block = match self.tools.call_tool(&call.name, call.arguments).await {
                Ok(output) => ContentBlock::ToolResult {
                    tool_call_id: call.id,
                    content: output.content,
                    is_error: output.is_error,
                },
                Err(e) => {
                    warn!(tool = %call.name, "Tool call failed: {e}");
                    ContentBlock::ToolResult {
                        tool_call_id: call.id,
                        content: e.to_string(),
                        is_error: true,
                    }
                }
            };
            results.push(block);
        }
        results
    }
}

#[async_trait]
impl Reasoning for AugmentedLlm {
    async fn generate_str(
        &mut self,
        message: &str,
        params: &RequestParams,
    ) -> Result<String, AgentError> {
        let mut messages = if params.use_history {
            self.history.clone()
        } else {
            Vec::new()
        };
        messages.push(Message::user(message));

        let tools = self.tools.tool_definitions();
        let model = params
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let mut responses = Vec::new();

        for iteration in 0..params.max_iterations {
            let request = ChatRequest {
                model: model.clone(),
                messages: messages.clone(),
                system: Some(self.instruction.clone()),
                tools: tools.clone(),
                max_tokens: Some(params.max_tokens),
                temperature: params.temperature,
            };

            let reply = self.api.complete(request).await?;
            debug!(
                provider = self.api.id(),
                iteration,
                tool_calls = reply.tool_calls().len(),
                "LLM turn complete"
            );

            if let Some(text) = reply.text() {
                responses.push(text);
            }

            let has_tool_calls = !reply.tool_calls().is_empty();
            let results = if has_tool_calls {
                self.run_tools(&reply).await
            } else {
                Vec::new()
            };
            messages.push(reply);

            if !has_tool_calls {
                break;
            }
            messages.push(Message {
                role: Role::ToolResult,
                content: results,
            });

            if iteration + 1 == params.max_iterations {
                warn!(
                    max_iterations = params.max_iterations,
                    "Stopped at iteration limit with tool calls pending"
                );
            }
        }

        if params.use_history {
            self.history = messages;
        }

        Ok(responses.join("\n"))
    }
}
