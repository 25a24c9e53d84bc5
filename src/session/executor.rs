//! Synchronous request boundary: one command in, one rendered result out.

use super::context::ContextError;
use super::lifecycle::{InitError, SessionLifecycleManager};
use super::Session;
use crate::agent::{AgentSpec, LlmKind, McpAgentFactory, RequestParams};
use crate::config::Config;
use crate::credential::CredentialStore;
use crate::error::panic_message;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "Error: No OpenAI API key provided. Please add your key in the sidebar.";

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("{}", MISSING_CREDENTIAL_MESSAGE)]
    MissingCredential,

    #[error("Error during initialization: {0}")]
    Initialization(#[from] InitError),

    #[error("Agent execution error: {0}")]
    Execution(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] ContextError),
}

/// Runs commands against a session's agent, each on a fresh execution
/// context that is torn down before the call returns.
pub struct RequestExecutor {
    lifecycle: SessionLifecycleManager,
    credentials: Arc<CredentialStore>,
    params: RequestParams,
}

impl RequestExecutor {
    pub fn new(
        lifecycle: SessionLifecycleManager,
        credentials: Arc<CredentialStore>,
        params: RequestParams,
    ) -> Self {
        Self {
            lifecycle,
            credentials,
            params,
        }
    }

    /// The browser agent wired to the configured MCP servers and model.
    pub fn for_browser(config: &Config, credentials: Arc<CredentialStore>) -> Self {
        let factory = McpAgentFactory::new(
            config.mcp_servers.clone(),
            config.openai.clone(),
            credentials.clone(),
        );
        let lifecycle =
            SessionLifecycleManager::new(Arc::new(factory), AgentSpec::browser(), LlmKind::OpenAi);
        let params = RequestParams {
            use_history: true,
            max_iterations: config.openai.max_iterations,
            model: None,
            max_tokens: config.openai.max_tokens,
            temperature: config.openai.temperature,
        };
        Self::new(lifecycle, credentials, params)
    }

    #[must_use]
    pub fn lifecycle(&self) -> &SessionLifecycleManager {
        &self.lifecycle
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Run `command` and render the outcome as display text. Never fails.
    pub fn execute(&self, session: &mut Session, command: &str) -> String {
        match self.try_execute(session, command) {
            Ok(text) => text,
            Err(e) => {
                warn!(session = %session.id(), "{e}");
                e.to_string()
            }
        }
    }

    pub fn try_execute(&self, session: &mut Session, command: &str) -> Result<String, ExecuteError> {
        if !self.credentials.is_present() {
            return Err(ExecuteError::MissingCredential);
        }

        let Session { id, agent, context } = session;
        let scope = context.acquire()?;
        debug!(session = %id, context = scope.id(), "Executing command");

        self.lifecycle.ensure_ready_in(id, agent, &scope)?;
        let Some(llm) = agent.llm.as_mut() else {
            return Err(ExecuteError::Execution(
                "agent has no LLM attached".to_string(),
            ));
        };

        // Commands in a session build on each other.
        let params = RequestParams {
            use_history: true,
            ..self.params.clone()
        };
        let outcome =
            scope.block_on(AssertUnwindSafe(llm.generate_str(command, &params)).catch_unwind());
        match outcome {
            Ok(Ok(text)) => {
                info!(session = %id, chars = text.len(), "Command complete");
                Ok(text)
            }
            Ok(Err(e)) => Err(ExecuteError::Execution(e.to_string())),
            Err(panic) => Err(ExecuteError::Execution(panic_message(panic.as_ref()))),
        }
    }
}
