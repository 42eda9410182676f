//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.taskman/config.json`) and environment.
//! Secrets and endpoints are resolved once at startup and handed to the components
//! that need them; request handlers never consult the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Messenger platform credentials and endpoint.
    #[serde(default)]
    pub messenger: MessengerConfig,

    /// Remote task service.
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Limits applied to every outbound call.
    #[serde(default)]
    pub outbound: OutboundConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 1337). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the platform must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

/// Messenger page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessengerConfig {
    /// Secret the platform presents during the subscription handshake.
    /// Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,

    /// Page access token sent with every Send API call. Overridden by PAGE_ACCESS_TOKEN env.
    pub page_access_token: Option<String>,

    /// Graph API base; the Send API lives at `<base>/me/messages`.
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
}

/// Task service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksConfig {
    /// Base URL; tasks are listed from `<base>/task`. Overridden by TASKMAN_API_BASE env.
    #[serde(default = "default_tasks_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundConfig {
    /// Whole-request timeout for Send API and task service calls (default 5).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_gateway_port() -> u16 {
    1337
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v2.6".to_string()
}

fn default_tasks_base_url() -> String {
    "https://larataskman.herokuapp.com/api".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            page_access_token: None,
            graph_api_base: default_graph_api_base(),
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            base_url: default_tasks_base_url(),
        }
    }
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OutboundConfig {
    /// Timeout as a Duration; zero is raised to one second so calls stay bounded.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Trimmed, non-empty value of an env var.
fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the listening port: env PORT overrides config.
/// An unparsable PORT is ignored with a warning.
pub fn resolve_port(config: &Config) -> u16 {
    match env_override("PORT") {
        Some(p) => p.parse().unwrap_or_else(|_| {
            log::warn!("ignoring invalid PORT value: {}", p);
            config.gateway.port
        }),
        None => config.gateway.port,
    }
}

/// Resolve the verify token: env VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_override("VERIFY_TOKEN").or_else(|| non_empty(config.messenger.verify_token.as_ref()))
}

/// Resolve the page access token: env PAGE_ACCESS_TOKEN overrides config.
pub fn resolve_page_access_token(config: &Config) -> Option<String> {
    env_override("PAGE_ACCESS_TOKEN")
        .or_else(|| non_empty(config.messenger.page_access_token.as_ref()))
}

/// Resolve the task service base URL: env TASKMAN_API_BASE overrides config.
/// Trailing slashes are dropped.
pub fn resolve_tasks_base_url(config: &Config) -> String {
    env_override("TASKMAN_API_BASE")
        .unwrap_or_else(|| config.tasks.base_url.trim().to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Runtime settings: config plus environment overrides, resolved once at startup
/// and passed to the gateway.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub verify_token: Option<String>,
    pub page_access_token: Option<String>,
    pub graph_api_base: String,
    pub tasks_base_url: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(config: &Config) -> Self {
        Self {
            bind: config.gateway.bind.trim().to_string(),
            port: resolve_port(config),
            verify_token: resolve_verify_token(config),
            page_access_token: resolve_page_access_token(config),
            graph_api_base: config.messenger.graph_api_base.trim().to_string(),
            tasks_base_url: resolve_tasks_base_url(config),
            timeout: config.outbound.timeout(),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TASKMAN_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".taskman").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or TASKMAN_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
