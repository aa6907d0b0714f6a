//! Process configuration read from the environment.

use anyhow::{bail, Context};
use claude::Claude;
use game_maker_core::{
    assemble, AgentConfig, ClaudeGenerator, DesignAgent, StageAgents, StoryAgent,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:5001";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings for the HTTP service and the agents behind it.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub api_key: String,
    /// Model override for both agents.
    pub model: Option<String>,
    /// Per-call generation timeout.
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("GAME_MAKER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse()
            .with_context(|| format!("invalid GAME_MAKER_BIND: {bind}"))?;

        let api_key = lookup("ANTHROPIC_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!(
                "ANTHROPIC_API_KEY environment variable not set. \
                 Set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here"
            );
        }

        let model = lookup("GAME_MAKER_MODEL").filter(|m| !m.trim().is_empty());

        let timeout_secs = match lookup("GAME_MAKER_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid GAME_MAKER_TIMEOUT_SECS: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr,
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    fn agent_config(&self, base: AgentConfig) -> AgentConfig {
        let config = base.with_timeout(self.timeout);
        match &self.model {
            Some(model) => config.with_model(model.clone()),
            None => config,
        }
    }

    /// Build both stage agents over one Claude client.
    pub fn agents(&self) -> anyhow::Result<StageAgents> {
        let client = Claude::with_timeout(self.api_key.clone(), self.timeout)
            .context("failed to create Claude client")?;
        let generator = Arc::new(ClaudeGenerator::new(client));

        Ok(StageAgents {
            story: StoryAgent::new(generator.clone())
                .with_config(self.agent_config(AgentConfig::story())),
            design: DesignAgent::new(generator)
                .with_config(self.agent_config(AgentConfig::design())),
            assembler: Box::new(assemble),
        })
    }
}
