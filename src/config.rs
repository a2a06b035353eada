//! Relay configuration loading and validation.
//!
//! Sources, later wins:
//! 1. Built-in defaults (the docker-compose service names).
//! 2. An optional YAML file named by `RELAY_CONFIG`. String values support
//!    `${VAR}` and `${VAR:-default}` interpolation.
//! 3. Environment variables.
//!
//! The resolved `RelayConfig` is read-only after startup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ─── Defaults ────────────────────────────────────────────────────────────────

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_AGENT_URL: &str = "http://qwen-agent:8000/v1/chat/completions";
pub const DEFAULT_DESKTOP_URL: &str = "http://cua-desktop:14500/jsonrpc";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variable naming the optional YAML config file.
pub const CONFIG_PATH_VAR: &str = "RELAY_CONFIG";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, event fields flattened.
    #[default]
    Json,
    /// Human-readable console output.
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Fully resolved relay configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub agent_url: String,
    pub desktop_url: String,
    pub agent_timeout: Duration,
    pub desktop_timeout: Duration,
    pub log_format: LogFormat,
    /// When set, logs go to `<dir>/relay.log` instead of stdout.
    pub log_dir: Option<PathBuf>,
}

/// One layer of optional settings (file or environment).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    #[serde(default)]
    bind: Option<String>,
    #[serde(default)]
    agent_url: Option<String>,
    #[serde(default)]
    desktop_url: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    agent_timeout_secs: Option<u64>,
    #[serde(default)]
    desktop_timeout_secs: Option<u64>,
    #[serde(default)]
    log_format: Option<LogFormat>,
    #[serde(default)]
    log_dir: Option<PathBuf>,
}

impl ConfigLayer {
    /// Overlay `other` on top of `self`; fields set in `other` win.
    fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            bind: other.bind.or(self.bind),
            agent_url: other.agent_url.or(self.agent_url),
            desktop_url: other.desktop_url.or(self.desktop_url),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            agent_timeout_secs: other.agent_timeout_secs.or(self.agent_timeout_secs),
            desktop_timeout_secs: other.desktop_timeout_secs.or(self.desktop_timeout_secs),
            log_format: other.log_format.or(self.log_format),
            log_dir: other.log_dir.or(self.log_dir),
        }
    }

    fn from_env<F>(lookup: F) -> Result<ConfigLayer, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match get("RELAY_LOG_FORMAT") {
            Some(raw) => Some(LogFormat::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "RELAY_LOG_FORMAT",
                value: raw.clone(),
                reason: "expected 'json' or 'pretty'".into(),
            })?),
            None => None,
        };

        Ok(ConfigLayer {
            bind: get("RELAY_BIND"),
            agent_url: get("AGENT_URL"),
            desktop_url: get("DESKTOP_URL"),
            request_timeout_secs: parse_secs("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"))?,
            agent_timeout_secs: parse_secs("AGENT_TIMEOUT_SECS", get("AGENT_TIMEOUT_SECS"))?,
            desktop_timeout_secs: parse_secs("DESKTOP_TIMEOUT_SECS", get("DESKTOP_TIMEOUT_SECS"))?,
            log_format,
            log_dir: get("RELAY_LOG_DIR").map(PathBuf::from),
        })
    }

    fn resolve(self) -> Result<RelayConfig, ConfigError> {
        let bind = self.bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind.parse().map_err(|e| ConfigError::InvalidValue {
            key: "bind",
            value: bind.clone(),
            reason: format!("{e}"),
        })?;

        let agent_url = validate_url(
            "agent_url",
            self.agent_url.unwrap_or_else(|| DEFAULT_AGENT_URL.to_string()),
        )?;
        let desktop_url = validate_url(
            "desktop_url",
            self.desktop_url
                .unwrap_or_else(|| DEFAULT_DESKTOP_URL.to_string()),
        )?;

        let shared = self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let agent_timeout = validate_timeout(
            "agent_timeout_secs",
            self.agent_timeout_secs.unwrap_or(shared),
        )?;
        let desktop_timeout = validate_timeout(
            "desktop_timeout_secs",
            self.desktop_timeout_secs.unwrap_or(shared),
        )?;

        Ok(RelayConfig {
            bind_addr,
            agent_url,
            desktop_url,
            agent_timeout,
            desktop_timeout,
            log_format: self.log_format.unwrap_or_default(),
            log_dir: self.log_dir,
        })
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl RelayConfig {
    /// Load from the process environment (and `RELAY_CONFIG`, if set).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    ///
    /// `${VAR}` interpolation inside the YAML file still reads the real
    /// process environment.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_layer = match lookup(CONFIG_PATH_VAR).filter(|p| !p.trim().is_empty()) {
            Some(path) => load_config_file(Path::new(&path))?,
            None => ConfigLayer::default(),
        };
        let env_layer = ConfigLayer::from_env(&lookup)?;

        file_layer.merge(env_layer).resolve()
    }
}

/// Read and parse a YAML config file, interpolating environment variables.
fn load_config_file(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw);
    if interpolated.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }

    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: format!("{}: {e}", path.display()),
    })
}

fn parse_secs(key: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: value.clone(),
                reason: e.to_string(),
            })
    })
    .transpose()
}

fn validate_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    match reqwest::Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        Ok(url) => Err(ConfigError::InvalidValue {
            key,
            value: value.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}

fn validate_timeout(key: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: secs.to_string(),
            reason: "timeout must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
