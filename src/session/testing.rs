//! Scripted agent fakes for session tests.

use crate::agent::{
    Agent, AgentError, AgentFactory, AgentSpec, LlmKind, Reasoning, RequestParams, ToolDescriptor,
};
use crate::mcp::McpError;
use crate::provider::Error as ProviderError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Reply scripted for one `generate_str` call.
pub enum Reply {
    Text(String),
    Fail(String),
    Panic,
}

/// Shared knobs and counters behind the fakes.
#[derive(Default)]
pub struct Script {
    constructed: AtomicUsize,
    initialized: AtomicUsize,
    attached: AtomicUsize,
    initialize_failures: Mutex<Option<(usize, String)>>,
    attach_failure: Mutex<Option<String>>,
    list_tools_fails: AtomicBool,
    initialize_panics: AtomicBool,
    replies: Mutex<VecDeque<Reply>>,
    /// `(message, use_history)` per reasoning call.
    calls: Mutex<Vec<(String, bool)>>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }

    /// Fail the next `times` readiness attempts with `msg`.
    pub fn fail_initialize_times(&self, times: usize, msg: &str) {
        *self.initialize_failures.lock().unwrap() = Some((times, msg.to_string()));
    }

    pub fn fail_attach(&self, msg: &str) {
        *self.attach_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_list_tools(&self) {
        self.list_tools_fails.store(true, Ordering::SeqCst);
    }

    pub fn panic_on_initialize(&self) {
        self.initialize_panics.store(true, Ordering::SeqCst);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn take_initialize_failure(&self) -> Option<String> {
        let mut guard = self.initialize_failures.lock().unwrap();
        let (remaining, msg) = guard.as_mut()?;
        let msg = msg.clone();
        *remaining -= 1;
        if *remaining == 0 {
            *guard = None;
        }
        Some(msg)
    }
}

pub struct FakeFactory {
    script: Arc<Script>,
}

impl FakeFactory {
    pub fn new(script: Arc<Script>) -> Self {
        Self { script }
    }
}

impl AgentFactory for FakeFactory {
    fn create_agent(&self, spec: &AgentSpec) -> Box<dyn Agent> {
        self.script.constructed.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeAgent {
            name: spec.name.clone(),
            script: self.script.clone(),
        })
    }
}

pub struct FakeAgent {
    name: String,
    script: Arc<Script>,
}

#[async_trait]
impl Agent for FakeAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self) -> Result<(), AgentError> {
        if self.script.initialize_panics.load(Ordering::SeqCst) {
            panic!("integration crashed");
        }
        if let Some(msg) = self.script.take_initialize_failure() {
            return Err(McpError::Protocol(msg).into());
        }
        self.script.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        if self.script.list_tools_fails.load(Ordering::SeqCst) {
            return Err(McpError::Disconnected.into());
        }
        Ok(vec![ToolDescriptor {
            name: "puppeteer_puppeteer_navigate".into(),
            description: "Navigate to a URL".into(),
        }])
    }

    async fn attach_llm(&self, _kind: LlmKind) -> Result<Box<dyn Reasoning>, AgentError> {
        if let Some(msg) = self.script.attach_failure.lock().unwrap().clone() {
            return Err(ProviderError::Api(msg).into());
        }
        self.script.attached.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeReasoning {
            script: self.script.clone(),
        }))
    }
}

pub struct FakeReasoning {
    script: Arc<Script>,
}

#[async_trait]
impl Reasoning for FakeReasoning {
    async fn generate_str(
        &mut self,
        message: &str,
        params: &RequestParams,
    ) -> Result<String, AgentError> {
        self.script
            .calls
            .lock()
            .unwrap()
            .push((message.to_string(), params.use_history));

        let reply = self.script.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(msg)) => Err(ProviderError::Api(msg).into()),
            Some(Reply::Panic) => panic!("reasoning crashed"),
            None => Ok(String::new()),
        }
    }
}
