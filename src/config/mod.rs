use crate::mcp::McpServerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment variable holding the OpenAI API key.
    pub api_key_env: String,

    pub openai: OpenAiSettings,

    pub server: ServerSettings,

    /// MCP server configurations, keyed by the name agents refer to them by.
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on model/tool round trips per command.
    pub max_iterations: usize,
    pub temperature: Option<f32>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 2048,
            max_iterations: 10,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8501".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut mcp_servers = HashMap::new();
        mcp_servers.insert(
            "puppeteer".to_string(),
            McpServerConfig {
                command: "npx".to_string(),
                args: vec![
                    "-y".to_string(),
                    "@modelcontextprotocol/server-puppeteer".to_string(),
                ],
                env: None,
            },
        );

        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            openai: OpenAiSettings::default(),
            server: ServerSettings::default(),
            mcp_servers,
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("browser-agent").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".browser-agent/config.toml"))
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}
