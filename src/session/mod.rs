//! Session-scoped agent lifecycle and single-flight request execution.

mod context;
mod executor;
mod lifecycle;
#[cfg(test)]
pub(crate) mod testing;

pub use context::{ContextError, ContextScope, ContextSlot, ExecutionContext};
pub use executor::{ExecuteError, MISSING_CREDENTIAL_MESSAGE, RequestExecutor};
pub use lifecycle::{InitError, SessionLifecycleManager};

use crate::agent::{Agent, Reasoning};
use serde::Serialize;

/// Agent handles owned by a session.
#[derive(Default)]
pub struct AgentState {
    initialized: bool,
    agent: Option<Box<dyn Agent>>,
    /// Present iff `initialized`.
    llm: Option<Box<dyn Reasoning>>,
}

impl AgentState {
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn agent_name(&self) -> Option<&str> {
        self.agent.as_deref().map(|agent| agent.name())
    }
}

/// One unit of isolation: the agent, its LLM binding, and the slot for the
/// per-request execution context.
///
/// Calls into a session must be serialized by the caller.
pub struct Session {
    id: String,
    agent: AgentState,
    context: ContextSlot,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent: AgentState::default(),
            context: ContextSlot::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.agent.is_initialized()
    }

    #[must_use]
    pub fn agent(&self) -> &AgentState {
        &self.agent
    }

    #[must_use]
    pub fn context(&self) -> &ContextSlot {
        &self.context
    }

    /// Snapshot for the diagnostics panel.
    #[must_use]
    pub fn info(&self, credential_present: bool) -> SessionInfo {
        SessionInfo {
            initialized: self.is_initialized(),
            credential_present,
            agent_status: if self.is_initialized() {
                AgentStatus::Ready
            } else {
                AgentStatus::NotInitialized
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentStatus {
    Ready,
    #[serde(rename = "Not initialized")]
    NotInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub initialized: bool,
    #[serde(rename = "openai_key_set")]
    pub credential_present: bool,
    pub agent_status: AgentStatus,
}
