//! MCP-backed agent and its factory.

use super::{
    Agent, AgentError, AgentFactory, AgentSpec, AugmentedLlm, LlmKind, Reasoning, ToolDescriptor,
};
use crate::config::OpenAiSettings;
use crate::credential::CredentialStore;
use crate::mcp::{McpManager, McpServerConfig, ToolSource};
use crate::provider::{Error as ProviderError, OpenAICompatClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builds [`McpAgent`]s against the configured MCP servers and OpenAI
/// settings.
pub struct McpAgentFactory {
    servers: HashMap<String, McpServerConfig>,
    openai: OpenAiSettings,
    credentials: Arc<CredentialStore>,
}

impl McpAgentFactory {
    pub fn new(
        servers: HashMap<String, McpServerConfig>,
        openai: OpenAiSettings,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            servers,
            openai,
            credentials,
        }
    }
}

impl AgentFactory for McpAgentFactory {
    fn create_agent(&self, spec: &AgentSpec) -> Box<dyn Agent> {
        Box::new(McpAgent {
            spec: spec.clone(),
            servers: self.servers.clone(),
            openai: self.openai.clone(),
            credentials: self.credentials.clone(),
            manager: None,
        })
    }
}

pub struct McpAgent {
    spec: AgentSpec,
    servers: HashMap<String, McpServerConfig>,
    openai: OpenAiSettings,
    credentials: Arc<CredentialStore>,
    /// Set once `initialize` has connected every declared server.
    manager: Option<Arc<McpManager>>,
}

impl McpAgent {
    fn manager(&self) -> Result<&Arc<McpManager>, AgentError> {
        self.manager
            .as_ref()
            .ok_or_else(|| AgentError::NotInitialized(self.spec.name.clone()))
    }
}

#[async_trait]
impl Agent for McpAgent {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn initialize(&mut self) -> Result<(), AgentError> {
        let mut manager = McpManager::new();
        for server in &self.spec.server_names {
            let config = self
                .servers
                .get(server)
                .cloned()
                .ok_or_else(|| AgentError::UnknownIntegration(server.clone()))?;
            info!(agent = %self.spec.name, server = %server, "Connecting MCP server");
            manager.add_server(server, config).await?;
        }
        manager.build_index().await?;
        info!(
            agent = %self.spec.name,
            servers = manager.server_count(),
            tools = manager.tool_count(),
            "MCP tools indexed"
        );

        self.manager = Some(Arc::new(manager));
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        Ok(self
            .manager()?
            .tool_definitions()
            .into_iter()
            .map(|def| ToolDescriptor {
                name: def.name,
                description: def.description,
            })
            .collect())
    }

    async fn attach_llm(&self, kind: LlmKind) -> Result<Box<dyn Reasoning>, AgentError> {
        let tools: Arc<dyn ToolSource> = self.manager()?.clone();
        match kind {
            LlmKind::OpenAi => {
                if !self.credentials.is_present() {
                    return Err(ProviderError::MissingApiKey {
                        env_var: self.credentials.env_var().to_string(),
                    }
                    .into());
                }
                let api = Arc::new(OpenAICompatClient::new(
                    &self.openai.base_url,
                    self.credentials.clone(),
                ));
                Ok(Box::new(AugmentedLlm::new(
                    api,
                    tools,
                    &self.spec.instruction,
                    &self.openai.model,
                )))
            }
        }
    }
}
