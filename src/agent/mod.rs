//! Agent abstraction: construction, readiness and the attached LLM.
//!
//! The session core only sees these traits. [`McpAgentFactory`] is the
//! production implementation; tests substitute scripted fakes.

mod browser;
mod llm;

pub use browser::{McpAgent, McpAgentFactory};
pub use llm::AugmentedLlm;

use crate::mcp::McpError;
use async_trait::async_trait;
use thiserror::Error;

const BROWSER_INSTRUCTION: &str = "\
You are a helpful web browsing assistant that can interact with websites using puppeteer.
- Navigate to websites and perform browser actions (click, scroll, type)
- Extract information from web pages
- Take screenshots of page elements when useful
- Provide concise summaries of web content using markdown
- Follow multi-step browsing sequences to complete tasks
";

/// Fixed capability description an agent is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub name: String,
    pub instruction: String,
    /// MCP servers the agent may call, by configured name.
    pub server_names: Vec<String>,
}

impl AgentSpec {
    /// The web browsing agent backed by the puppeteer MCP server.
    #[must_use]
    pub fn browser() -> Self {
        Self {
            name: "browser".to_string(),
            instruction: BROWSER_INSTRUCTION.to_string(),
            server_names: vec!["puppeteer".to_string()],
        }
    }
}

/// Kind of LLM binding to attach to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmKind {
    OpenAi,
}

/// Per-call options for [`Reasoning::generate_str`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParams {
    /// Carry the conversation across calls.
    pub use_history: bool,
    pub max_iterations: usize,
    /// Overrides the binding's default model.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            use_history: true,
            max_iterations: 10,
            model: None,
            max_tokens: 2048,
            temperature: None,
        }
    }
}

/// Descriptor of an operation the agent can perform, for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Integration '{0}' is not configured")]
    UnknownIntegration(String),

    #[error("Agent '{0}' is not initialized")]
    NotInitialized(String),

    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    #[error("{0}")]
    Provider(#[from] crate::provider::Error),
}

/// Builds agents from a spec. Construction itself does no I/O.
pub trait AgentFactory: Send + Sync {
    fn create_agent(&self, spec: &AgentSpec) -> Box<dyn Agent>;
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Connect the declared integrations.
    async fn initialize(&mut self) -> Result<(), AgentError>;

    /// Operations available through the connected integrations.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError>;

    /// Bind an LLM that can call this agent's tools.
    async fn attach_llm(&self, kind: LlmKind) -> Result<Box<dyn Reasoning>, AgentError>;
}

/// An LLM binding that turns a message plus history into text.
#[async_trait]
pub trait Reasoning: Send {
    async fn generate_str(
        &mut self,
        message: &str,
        params: &RequestParams,
    ) -> Result<String, AgentError>;
}
