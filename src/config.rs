//! Configuration Management
//!
//! Handles persistent configuration storage for accessreq.

use crate::graph::auth::DEFAULT_AUTHORITY;
use crate::graph::client::{ApiVersion, ConsistencyRetry, DEFAULT_ENDPOINT};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Consistency retry settings as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let retry = ConsistencyRetry::default();
        Self {
            attempts: retry.attempts,
            initial_delay_ms: retry.initial_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory (tenant) ID or verified domain
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Application (client) ID for the client-credentials grant
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub api_version: Option<ApiVersion>,
    /// Graph endpoint, for national clouds
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub consistency_retry: Option<RetryConfig>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("accessreq").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective tenant (CLI > config > AZURE_TENANT_ID)
    pub fn effective_tenant(&self) -> String {
        self.tenant_id
            .clone()
            .or_else(|| std::env::var("AZURE_TENANT_ID").ok())
            .unwrap_or_default()
    }

    /// Get effective client ID (CLI > config > AZURE_CLIENT_ID)
    pub fn effective_client_id(&self) -> Option<String> {
        self.client_id
            .clone()
            .or_else(|| std::env::var("AZURE_CLIENT_ID").ok())
    }

    pub fn effective_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn effective_authority(&self) -> String {
        self.authority
            .clone()
            .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string())
    }

    pub fn consistency_retry(&self) -> ConsistencyRetry {
        let retry = self.consistency_retry.unwrap_or_default();
        ConsistencyRetry {
            attempts: retry.attempts.max(1),
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
        }
    }

    /// Set tenant and save
    pub fn set_tenant(&mut self, tenant_id: &str) -> Result<()> {
        self.tenant_id = Some(tenant_id.to_string());
        self.save()
    }
}
