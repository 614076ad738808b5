use crate::conversation::HistoryMode;
use crate::orchestrator::{
    CatalogRefresh, CycleLimitPolicy, DEFAULT_MAX_CYCLES, DEFAULT_SYSTEM_PROMPT, LoopConfig,
};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "kimi-k2-0711-preview";
pub const DEFAULT_API_BASE: &str = "https://api.moonshot.cn/v1";
pub const DEFAULT_API_KEY_ENV: &str = "KIMI_API_KEY";

/// Chat with a language model that can call the tools of an MCP server.
#[derive(Debug, Parser)]
#[command(name = "toolchat", version)]
pub struct Args {
    /// Tool server endpoint, e.g. http://127.0.0.1:8083/mcp
    #[arg(required_unless_present = "local", conflicts_with = "local")]
    pub server_url: Option<String>,

    /// Serve the built-in example tools in-process instead of connecting
    #[arg(long)]
    pub local: bool,

    #[arg(long, env = "TOOLCHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "TOOLCHAT_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Environment variable holding the API key
    #[arg(long, value_name = "VAR", default_value = DEFAULT_API_KEY_ENV)]
    pub api_key_env: String,

    #[arg(long, value_enum, env = "TOOLCHAT_HISTORY", default_value_t)]
    pub history: HistoryMode,

    #[arg(long, value_enum, env = "TOOLCHAT_CATALOG_REFRESH", default_value_t)]
    pub catalog_refresh: CatalogRefresh,

    /// Model round trips allowed per query, 0 for no limit
    #[arg(long, env = "TOOLCHAT_MAX_CYCLES", default_value_t = DEFAULT_MAX_CYCLES)]
    pub max_cycles: usize,

    #[arg(long, value_enum, default_value_t)]
    pub on_cycle_limit: CycleLimitPolicy,

    /// Deadline in seconds for each tool listing, tool call and completion
    #[arg(long, value_name = "SECS", env = "TOOLCHAT_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Send the conversation without the tool-use instructions
    #[arg(long)]
    pub no_system_prompt: bool,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    Local,
    Remote(String),
}

impl Args {
    pub fn target(&self) -> Result<BackendTarget> {
        match (&self.server_url, self.local) {
            (_, true) => Ok(BackendTarget::Local),
            (Some(url), false) => Ok(BackendTarget::Remote(url.clone())),
            (None, false) => bail!("a tool server URL or --local is required"),
        }
    }

    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).with_context(|| {
            format!("{} must be set (in the environment or .env)", self.api_key_env)
        })
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            system_prompt: (!self.no_system_prompt).then(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_cycles: (self.max_cycles > 0).then_some(self.max_cycles),
            on_cycle_limit: self.on_cycle_limit,
            catalog_refresh: self.catalog_refresh,
            call_timeout: self.timeout.map(Duration::from_secs),
        }
    }
}
