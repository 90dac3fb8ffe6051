//! Configuration management for the AEP catalog and orchestration crate.

use serde::{Deserialize, Serialize};

/// Top-level configuration composing every component's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// RIFX/AEP parser configuration
    #[serde(default)]
    pub rifx: RifxConfig,

    /// Catalog store configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Agent runtime (message bus) configuration
    #[serde(default)]
    pub agent_runtime: AgentRuntimeConfig,

    /// Meta-orchestrator configuration
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rifx: RifxConfig::default(),
            catalog: CatalogConfig::default(),
            agent_runtime: AgentRuntimeConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Configuration for the RIFX reader / AEP parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RifxConfig {
    /// Maximum nesting depth guarded against runaway/cyclic LIST blocks.
    pub max_nesting_depth: usize,

    /// Maximum total file size accepted, in bytes.
    pub max_file_size_bytes: u64,

    /// Whether to record `ParseWarning`s for feature-detected ambiguous layouts.
    pub record_parse_warnings: bool,
}

impl Default for RifxConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 256,
            max_file_size_bytes: 2 * 1024 * 1024 * 1024,
            record_parse_warnings: true,
        }
    }
}

/// Configuration for the catalog store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite connection string, e.g. `sqlite://catalog.db` or `sqlite::memory:`.
    pub database_url: String,

    /// Maximum results returned from `search`/`filter`/`similar` when the caller
    /// does not specify a limit.
    pub default_limit: usize,

    /// Pool size for the underlying connection pool.
    pub max_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://catalog.db".to_string(),
            default_limit: 20,
            max_connections: 5,
        }
    }
}

/// Configuration for the agent runtime message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeConfig {
    /// Maximum queued messages per agent mailbox before `QueueFull`.
    pub max_queue_depth: usize,

    /// Base backoff duration in milliseconds for message retry.
    pub retry_base_ms: u64,

    /// Backoff multiplier per retry attempt.
    pub retry_factor: f64,

    /// Maximum backoff duration in milliseconds.
    pub retry_max_ms: u64,

    /// Maximum retry attempts before moving a message to the dead-letter store.
    pub max_retry_attempts: u32,

    /// Grace window in milliseconds a handler has to return before being abandoned.
    pub handler_grace_ms: u64,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 1024,
            retry_base_ms: 1_000,
            retry_factor: 2.0,
            retry_max_ms: 60_000,
            max_retry_attempts: 3,
            handler_grace_ms: 5_000,
        }
    }
}

/// Configuration for the meta-orchestrator workflow state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum times a stage may be re-entered before `loop_detected`.
    pub loop_limit: u32,

    /// Whether each stage requires human approval before advancing.
    pub require_approval: bool,

    /// Timeout in seconds waiting for an approval message.
    pub approval_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            loop_limit: 50,
            require_approval: false,
            approval_timeout_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file, dispatching on extension.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("unsupported config file format")),
        };
        Ok(config)
    }

    /// Save configuration to a file, dispatching on extension.
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)?,
            Some("yaml") | Some("yml") => serde_yml::to_string(self)?,
            _ => return Err(anyhow::anyhow!("unsupported config file format")),
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.orchestrator.loop_limit, 50);
        assert_eq!(config.agent_runtime.max_retry_attempts, 3);
    }

    #[test]
    fn test_roundtrip_json() {
        let config = AppConfig::default();
        let dir = std::env::temp_dir().join(format!("aep_config_test_{}.json", std::process::id()));
        config.to_file(&dir).unwrap();
        let loaded = AppConfig::from_file(&dir).unwrap();
        assert_eq!(loaded.catalog.database_url, config.catalog.database_url);
        std::fs::remove_file(&dir).ok();
    }
}
