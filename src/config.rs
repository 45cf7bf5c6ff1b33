//! Service configuration read from the environment

use crate::ingest::DispatchMode;
use crate::llm::GeminiModel;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GATEWAY_BASE: &str = "https://apibot.luffa.im/robot";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the generative-AI fallback
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    /// Proxy base URL; when set the key is left to the proxy
    pub gateway: Option<String>,
    pub model: GeminiModel,
}

/// Configuration for the messaging gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Robot secret. `None` disables polling and outbound delivery.
    pub secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub poll_interval: Duration,
    pub dispatch_mode: DispatchMode,
    pub log_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Zero disables idle eviction
    pub idle_ttl: Duration,
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub gateway: GatewayConfig,
    pub ingest: IngestConfig,
    pub sessions: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: parse_or(&get, "AGENT_PORT", 8000)?,
            llm: LlmConfig {
                api_key: get("GEMINI_API_KEY"),
                gateway: get("LLM_GATEWAY"),
                model: parse_or(&get, "GEMINI_MODEL", GeminiModel::default())?,
            },
            gateway: GatewayConfig {
                base_url: get("LUFFA_API_BASE").unwrap_or_else(|| DEFAULT_GATEWAY_BASE.to_string()),
                secret: get("LUFFA_ROBOT_SECRET"),
            },
            ingest: IngestConfig {
                poll_interval: Duration::from_millis(parse_or(&get, "POLL_INTERVAL_MS", 1000)?),
                dispatch_mode: parse_or(&get, "DISPATCH_MODE", DispatchMode::default())?,
                log_capacity: parse_or(&get, "MESSAGE_LOG_CAPACITY", 1000)?,
            },
            sessions: SessionConfig {
                idle_ttl: Duration::from_secs(parse_or(&get, "SESSION_IDLE_TTL_SECS", 86_400)?),
                capacity: parse_or(&get, "SESSION_CAPACITY", 10_000)?,
            },
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.gateway.base_url, DEFAULT_GATEWAY_BASE);
        assert!(config.gateway.secret.is_none());
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, GeminiModel::Flash);
        assert_eq!(config.ingest.poll_interval, Duration::from_secs(1));
        assert_eq!(config.ingest.dispatch_mode, DispatchMode::PerUser);
        assert_eq!(config.ingest.log_capacity, 1000);
        assert_eq!(config.sessions.idle_ttl, Duration::from_secs(86_400));
        assert_eq!(config.sessions.capacity, 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AGENT_PORT", "9100"),
            ("LUFFA_ROBOT_SECRET", "s3cret"),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("POLL_INTERVAL_MS", "250"),
            ("DISPATCH_MODE", "sequential"),
            ("SESSION_IDLE_TTL_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.gateway.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.llm.model, GeminiModel::Pro);
        assert_eq!(config.ingest.poll_interval, Duration::from_millis(250));
        assert_eq!(config.ingest.dispatch_mode, DispatchMode::Sequential);
        assert_eq!(config.sessions.idle_ttl, Duration::ZERO);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config =
            AppConfig::from_lookup(lookup(&[("LUFFA_ROBOT_SECRET", "  "), ("AGENT_PORT", "")]))
                .unwrap();
        assert!(config.gateway.secret.is_none());
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("AGENT_PORT", "eighty")])).unwrap_err();
        let ConfigError::Invalid { var, value, .. } = err;
        assert_eq!(var, "AGENT_PORT");
        assert_eq!(value, "eighty");
    }
}
