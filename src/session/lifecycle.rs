//! Lazy, exactly-once agent initialization.

use super::context::{ContextError, ContextScope};
use super::{AgentState, Session};
use crate::agent::{Agent, AgentError, AgentFactory, AgentSpec, LlmKind, Reasoning};
use crate::error::panic_message;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("{0}")]
    Agent(#[from] AgentError),

    #[error("initialization panicked: {0}")]
    Panicked(String),
}

/// Makes sure a session's agent and LLM binding exist before any command
/// runs. Failed attempts leave nothing behind, so the next call starts over.
pub struct SessionLifecycleManager {
    factory: Arc<dyn AgentFactory>,
    spec: AgentSpec,
    llm_kind: LlmKind,
}

impl SessionLifecycleManager {
    pub fn new(factory: Arc<dyn AgentFactory>, spec: AgentSpec, llm_kind: LlmKind) -> Self {
        Self {
            factory,
            spec,
            llm_kind,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    /// Idempotent. If work is needed, it runs on a context created here and
    /// destroyed before returning.
    pub fn ensure_ready(&self, session: &mut Session) -> Result<(), InitError> {
        if session.agent.initialized {
            return Ok(());
        }
        let Session { id, agent, context } = session;
        let scope = context.acquire()?;
        self.ensure_ready_in(id, agent, &scope)
    }

    /// Initialize on the context the caller already holds for its request.
    pub(super) fn ensure_ready_in(
        &self,
        session_id: &str,
        state: &mut AgentState,
        scope: &ContextScope<'_>,
    ) -> Result<(), InitError> {
        if state.initialized {
            return Ok(());
        }

        debug!(
            session = %session_id,
            context = scope.id(),
            "Initializing agent"
        );

        let (agent, llm) = match scope.block_on(AssertUnwindSafe(self.initialize()).catch_unwind())
        {
            Ok(result) => result?,
            Err(panic) => return Err(InitError::Panicked(panic_message(panic.as_ref()))),
        };

        info!(session = %session_id, agent = %agent.name(), "Agent ready");
        state.agent = Some(agent);
        state.llm = Some(llm);
        state.initialized = true;
        Ok(())
    }

    /// Build, connect and bind. Handles are only returned when every
    /// required step succeeded; on error they are dropped here.
    async fn initialize(&self) -> Result<(Box<dyn Agent>, Box<dyn Reasoning>), AgentError> {
        let mut agent = self.factory.create_agent(&self.spec);
        agent.initialize().await?;
        let llm = agent.attach_llm(self.llm_kind).await?;

        match agent.list_tools().await {
            Ok(tools) => {
                let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                info!(agent = %agent.name(), count = tools.len(), "Tools available: {names:?}");
            }
            Err(e) => warn!(agent = %agent.name(), "Failed to list tools: {e}"),
        }

        Ok((agent, llm))
    }
}
