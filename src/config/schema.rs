use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::cascade::CascadeSettings;
use crate::tools::DispatchSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub automation: AutomationConfig,
    pub capture: CaptureConfig,
    pub agent: AgentConfig,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Completion-service base URL; the OpenAI default when unset.
    pub base_url: Option<String>,
    /// Credential; falls back to LINKCLAW_API_KEY then OPENAI_API_KEY.
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        let from_config = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        from_config
            .or_else(|| std::env::var("LINKCLAW_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub base_url: String,
    /// Namespace prefix proxied tool names must carry.
    pub proxy_prefix: String,
    pub request_timeout_secs: u64,
    pub settle_ms: u64,
    pub navigation_timeout_ms: u64,
    pub click_timeout_ms: u64,
    pub root_poll_timeout_ms: u64,
    pub root_poll_interval_ms: u64,
    pub snapshot_char_budget: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        let cascade = CascadeSettings::default();
        Self {
            base_url: "http://127.0.0.1:8931".to_string(),
            proxy_prefix: "pw.".to_string(),
            request_timeout_secs: 60,
            settle_ms: cascade.settle_ms,
            navigation_timeout_ms: cascade.navigation_timeout_ms,
            click_timeout_ms: cascade.click_timeout_ms,
            root_poll_timeout_ms: cascade.root_poll_timeout_ms,
            root_poll_interval_ms: cascade.root_poll_interval_ms,
            snapshot_char_budget: 60_000,
        }
    }
}

impl AutomationConfig {
    pub fn cascade_settings(&self) -> CascadeSettings {
        CascadeSettings {
            settle_ms: self.settle_ms,
            navigation_timeout_ms: self.navigation_timeout_ms,
            click_timeout_ms: self.click_timeout_ms,
            root_poll_timeout_ms: self.root_poll_timeout_ms,
            root_poll_interval_ms: self.root_poll_interval_ms,
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            proxy_prefix: self.proxy_prefix.clone(),
            snapshot_char_budget: self.snapshot_char_budget,
            cascade: self.cascade_settings(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8932".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Extra seed candidates merged into the compiled-in baseline, keyed by
/// feature wire name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub extra_seeds: HashMap<String, Vec<String>>,
}
