use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `wallet.network_id`
pub const NETWORK_ID_ENV: &str = "NETWORK_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub limits: LimitsConfig,
    pub pacing: PacingConfig,
    pub wallet: WalletConfig,
    pub social: SocialConfig,
    pub storage: StorageConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 4096,
            timeout_ms: 120000,
        }
    }
}

/// How the planner asks for and parses its task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// Free-text numbered list, split on lines
    #[default]
    Numbered,
    /// JSON object with task details
    Structured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub initial_goal: String,
    pub max_iterations: Option<u64>,
    pub min_tasks: usize,
    pub max_tasks: usize,
    /// Model calls per task, the final answer included
    pub max_tool_steps: usize,
    pub planner_mode: PlannerMode,
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            initial_goal: "Deploy an NFT called \"My NFT\" with the metadata \"This is my NFT\"".to_string(),
            max_iterations: None,
            min_tasks: 3,
            max_tasks: 5,
            max_tool_steps: 5,
            planner_mode: PlannerMode::Numbered,
            system_prompt: "You are an autonomous onchain agent operating a wallet. \
                            You act through the tools you are given and report concrete outcomes \
                            such as transaction hashes and addresses."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub result_max_chars: usize,
    pub goal_max_chars: usize,
    pub error_max_chars: usize,
    pub context_max_entries: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            result_max_chars: 200,
            goal_max_chars: 100,
            error_max_chars: 200,
            context_max_entries: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub service_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5000,
            max_delay_ms: 60000,
            service_retries: 3,
            retry_base_ms: 1000,
            retry_max_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network_id: String,
    pub bootstrap_faucet: bool,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network_id: "base-sepolia".to_string(),
            bootstrap_faucet: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    pub enabled: bool,
    pub handle: Option<String>,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            handle: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(env!("CARGO_PKG_NAME")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
    pub recent_limit: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            recent_limit: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            limits: LimitsConfig::default(),
            pacing: PacingConfig::default(),
            wallet: WalletConfig::default(),
            social: SocialConfig::default(),
            storage: StorageConfig::default(),
            status: StatusConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config = Self::load_file_chain(config_path)?;
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup(NETWORK_ID_ENV).filter(|v| !v.trim().is_empty()) {
            log::info!("Network overridden by {}: {}", NETWORK_ID_ENV, network);
            self.wallet.network_id = network;
        }
        self
    }

    /// Reject settings the loop can't run with
    pub fn validate(&self) -> Result<()> {
        if self.agent.initial_goal.trim().is_empty() {
            eyre::bail!("agent.initial_goal must not be empty");
        }
        if self.agent.min_tasks == 0 || self.agent.min_tasks > self.agent.max_tasks {
            eyre::bail!(
                "agent.min_tasks ({}) must be between 1 and agent.max_tasks ({})",
                self.agent.min_tasks,
                self.agent.max_tasks
            );
        }
        if self.agent.max_tool_steps == 0 {
            eyre::bail!("agent.max_tool_steps must be at least 1");
        }
        if self.limits.context_max_entries == 0 {
            eyre::bail!("limits.context_max_entries must be at least 1");
        }
        for (name, value) in [
            ("result_max_chars", self.limits.result_max_chars),
            ("goal_max_chars", self.limits.goal_max_chars),
            ("error_max_chars", self.limits.error_max_chars),
        ] {
            if value == 0 {
                eyre::bail!("limits.{} must be at least 1", name);
            }
        }
        if self.pacing.base_delay_ms > self.pacing.max_delay_ms {
            eyre::bail!("pacing.base_delay_ms must not exceed pacing.max_delay_ms");
        }
        if self.wallet.network_id.trim().is_empty() {
            eyre::bail!("wallet.network_id must not be empty");
        }
        Ok(())
    }

    /// Directory for the task store
    pub fn data_dir(&self) -> &Path {
        &self.storage.data_dir
    }
}
