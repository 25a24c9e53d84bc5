//! MCP (Model Context Protocol) integrations.
//!
//! Each server is driven by an integration worker: a dedicated thread with
//! its own runtime that owns the stdio transport and the child process.
//! Callers talk to it over channels, so a [`McpClient`] can be used from any
//! runtime, including the short-lived per-request ones.

use async_trait::async_trait;
use futures::FutureExt;
use mcp_sdk_rs::client::Client;
use mcp_sdk_rs::session::Session;
use mcp_sdk_rs::transport::Message;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::error::panic_message;
use crate::provider::ToolDefinition;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// How long a stopping worker waits for its transport tasks.
const WORKER_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Source of callable tools for the reasoning loop.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Definitions to advertise to the model.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Call a tool by the name it was advertised under.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, McpError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_schema() -> serde_json::Value {
    json!({"type": "object", "properties": {}})
}

/// Text result of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn server: {0}")]
    SpawnFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Disconnected")]
    Disconnected,
}

enum McpCommand {
    ListTools {
        reply: oneshot::Sender<Result<Vec<McpToolDef>, McpError>>,
    },
    CallTool {
        name: String,
        arguments: serde_json::Value,
        reply: oneshot::Sender<Result<ToolOutput, McpError>>,
    },
}

/// Handle to one MCP server running on its integration worker.
///
/// Dropping the handle closes the command channel; the worker then exits
/// and the server process is killed. [`McpClient::shutdown`] does the same
/// and waits for the worker thread.
pub struct McpClient {
    name: String,
    commands: mpsc::UnboundedSender<McpCommand>,
    worker: JoinHandle<()>,
}

impl McpClient {
    pub async fn spawn(name: &str, config: McpServerConfig) -> Result<Self, McpError> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let server = name.to_string();
        let worker = std::thread::Builder::new()
            .name(format!("mcp-{name}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(McpError::SpawnFailed(e.to_string())));
                        return;
                    }
                };
                runtime.block_on(run_worker(server, config, ready_tx, commands_rx));
                runtime.shutdown_timeout(WORKER_SHUTDOWN_GRACE);
            })
            .map_err(|e| McpError::SpawnFailed(e.to_string()))?;

        ready_rx.await.map_err(|_| McpError::Disconnected)??;

        Ok(Self {
            name: name.to_string(),
            commands: commands_tx,
            worker,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Close the connection and wait for the worker thread to exit.
    pub fn shutdown(self) -> Result<(), McpError> {
        let Self { commands, worker, .. } = self;
        drop(commands);
        worker.join().map_err(|panic| {
            McpError::Protocol(format!(
                "worker panicked: {}",
                panic_message(panic.as_ref())
            ))
        })
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(McpCommand::ListTools { reply })
            .map_err(|_| McpError::Disconnected)?;
        rx.await.map_err(|_| McpError::Disconnected)?
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, McpError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(McpCommand::CallTool {
                name: name.to_string(),
                arguments,
                reply,
            })
            .map_err(|_| McpError::Disconnected)?;
        rx.await.map_err(|_| McpError::Disconnected)?
    }
}

/// A live stdio connection. Only ever touched from the worker's runtime.
struct Connection {
    client: Client,
    _to_session_tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    async fn open(config: McpServerConfig) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::inherit());
        cmd.kill_on_drop(true);

        if let Some(env) = config.env {
            cmd.envs(env);
        }

        let (to_session_tx, to_session_rx) = mpsc::unbounded_channel::<Message>();
        let (from_session_tx, from_session_rx) = mpsc::unbounded_channel::<Message>();

        let session = Session::Local {
            handler: None,
            command: cmd,
            receiver: Arc::new(Mutex::new(to_session_rx)),
            sender: Arc::new(from_session_tx),
        };

        session
            .start()
            .await
            .map_err(|e| McpError::SpawnFailed(e.to_string()))?;

        let client = Client::new(to_session_tx.clone(), from_session_rx);

        client
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        client
            .notify("initialized", None)
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        Ok(Self {
            client,
            _to_session_tx: to_session_tx,
        })
    }

    async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let response = self
            .client
            .request("tools/list", None)
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        serde_json::from_value(response["tools"].clone())
            .map_err(|e| McpError::Protocol(e.to_string()))
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, McpError> {
        let response = self
            .client
            .request(
                "tools/call",
                Some(json!({
                    "name": name,
                    "arguments": arguments
                })),
            )
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        Ok(tool_output_from_response(&response))
    }
}

async fn run_worker(
    server: String,
    config: McpServerConfig,
    ready: oneshot::Sender<Result<(), McpError>>,
    mut commands: mpsc::UnboundedReceiver<McpCommand>,
) {
    let program = config.command.clone();
    // The transport panics instead of returning an error when the program
    // cannot be started.
    let connection = match AssertUnwindSafe(Connection::open(config))
        .catch_unwind()
        .await
    {
        Ok(Ok(c)) => c,
        Ok(Err(e)) => {
            let _ = ready.send(Err(e));
            return;
        }
        Err(panic) => {
            let message = format!("{program}: {}", panic_message(panic.as_ref()));
            tracing::warn!(server = %server, "MCP server failed to start: {message}");
            let _ = ready.send(Err(McpError::SpawnFailed(message)));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }
    tracing::debug!(server = %server, "MCP worker started");

    while let Some(command) = commands.recv().await {
        match command {
            McpCommand::ListTools { reply } => {
                let _ = reply.send(connection.list_tools().await);
            }
            McpCommand::CallTool {
                name,
                arguments,
                reply,
            } => {
                tracing::debug!(server = %server, tool = %name, "MCP tool call");
                let _ = reply.send(connection.call_tool(&name, arguments).await);
            }
        }
    }

    tracing::debug!(server = %server, "MCP worker stopped");
}

/// Flatten a `tools/call` response into text.
///
/// MCP content is an array of objects like `{ type: "text", text: "..." }`.
/// Images (e.g. screenshots) become a placeholder line.
fn tool_output_from_response(response: &serde_json::Value) -> ToolOutput {
    let is_error = response
        .get("isError")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let content = match response.get("content").and_then(|c| c.as_array()) {
        Some(items) => items
            .iter()
            .filter_map(|item| match item.get("type").and_then(|t| t.as_str()) {
                Some("image") => Some(format!(
                    "[image: {}]",
                    item.get("mimeType")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown")
                )),
                _ => item.get("text").and_then(|v| v.as_str()).map(String::from),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        None => response
            .get("content")
            .map(ToString::to_string)
            .unwrap_or_default(),
    };

    ToolOutput {
        content,
        is_error,
    }
}

struct McpToolEntry {
    /// `server_tool`, as advertised to the model.
    qualified_name: String,
    tool_name: String,
    description: String,
    input_schema: serde_json::Value,
    client: Arc<McpClient>,
}

/// Connected servers and the index of their tools.
#[derive(Default)]
pub struct McpManager {
    clients: Vec<Arc<McpClient>>,
    tool_index: Vec<McpToolEntry>,
}

impl McpManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_server(
        &mut self,
        name: &str,
        config: McpServerConfig,
    ) -> Result<(), McpError> {
        let client = McpClient::spawn(name, config).await?;
        self.clients.push(Arc::new(client));
        Ok(())
    }

    /// Build the tool index from all connected servers.
    pub async fn build_index(&mut self) -> Result<(), McpError> {
        self.tool_index.clear();
        for client in &self.clients {
            let tools = client.list_tools().await?;
            for tool_def in tools {
                self.tool_index.push(McpToolEntry {
                    qualified_name: qualified_name(client.name(), &tool_def.name),
                    tool_name: tool_def.name,
                    description: tool_def.description,
                    input_schema: tool_def.input_schema,
                    client: client.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tool_index.len()
    }

    #[must_use]
    pub fn server_count(&self) -> usize {
        self.clients.len()
    }
}

#[async_trait]
impl ToolSource for McpManager {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_index
            .iter()
            .map(|entry| ToolDefinition {
                name: entry.qualified_name.clone(),
                description: entry.description.clone(),
                parameters: entry.input_schema.clone(),
            })
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, McpError> {
        let entry = self
            .tool_index
            .iter()
            .find(|e| e.qualified_name == name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;
        entry.client.call_tool(&entry.tool_name, arguments).await
    }
}

fn qualified_name(server: &str, tool: &str) -> String {
    format!("{server}_{tool}")
}
