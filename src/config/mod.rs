//! Session configuration (layered: code > env > defaults).

use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{AgentError, Result};
use crate::functions::FunctionDispatcher;
use crate::types::GenerationOptions;

/// Rounds a single turn may take before giving up.
pub const DEFAULT_MAX_ROUNDS: usize = 20;

const ENV_PREFIX: &str = "CACTUS_AGENT_";

/// What happens to the transcript when a turn fails or is cancelled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the user message (and a system prompt inserted by the turn);
    /// drop everything the turn appended after it.
    #[default]
    KeepRequest,
    /// Drop everything the turn appended.
    Rollback,
}

/// Per-session settings.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Inserted as the first message when a turn starts on an empty transcript.
    #[builder(into)]
    pub system_prompt: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub options: GenerationOptions,
    #[builder(default = DEFAULT_MAX_ROUNDS)]
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Upper bound on concurrently running function calls; unbounded if unset.
    pub max_concurrent_calls: Option<usize>,
    pub function_timeout_ms: Option<u64>,
    #[builder(default)]
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    /// Load from `CACTUS_AGENT_*` environment variables, reading `.env` first.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `CACTUS_AGENT_SYSTEM_PROMPT` | `system_prompt` |
    /// | `CACTUS_AGENT_MAX_ROUNDS` | `max_rounds` |
    /// | `CACTUS_AGENT_MAX_CONCURRENT_CALLS` | `max_concurrent_calls` |
    /// | `CACTUS_AGENT_FUNCTION_TIMEOUT_MS` | `function_timeout_ms` |
    /// | `CACTUS_AGENT_FAILURE_POLICY` | `failure_policy` (`keep_request`, `rollback`) |
    /// | `CACTUS_AGENT_MAX_TOKENS` | `options.max_tokens` |
    /// | `CACTUS_AGENT_TEMPERATURE` | `options.temperature` |
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(prompt) = var("SYSTEM_PROMPT") {
            config.system_prompt = Some(prompt);
        }
        if let Some(raw) = var("MAX_ROUNDS") {
            config.max_rounds = parse("MAX_ROUNDS", &raw)?;
        }
        if let Some(raw) = var("MAX_CONCURRENT_CALLS") {
            config.max_concurrent_calls = Some(parse("MAX_CONCURRENT_CALLS", &raw)?);
        }
        if let Some(raw) = var("FUNCTION_TIMEOUT_MS") {
            config.function_timeout_ms = Some(parse("FUNCTION_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = var("FAILURE_POLICY") {
            config.failure_policy = parse("FAILURE_POLICY", &raw)?;
        }
        if let Some(raw) = var("MAX_TOKENS") {
            config.options.max_tokens = Some(parse("MAX_TOKENS", &raw)?);
        }
        if let Some(raw) = var("TEMPERATURE") {
            config.options.temperature = Some(parse("TEMPERATURE", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no turn could run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(AgentError::Configuration("max_rounds must be at least 1".into()));
        }
        if self.max_concurrent_calls == Some(0) {
            return Err(AgentError::Configuration(
                "max_concurrent_calls must be at least 1".into(),
            ));
        }
        if let Some(prompt) = &self.system_prompt {
            if prompt.trim().is_empty() {
                return Err(AgentError::InvalidSystemPrompt("system prompt is empty".into()));
            }
        }
        Ok(())
    }

    pub fn function_timeout(&self) -> Option<Duration> {
        self.function_timeout_ms.map(Duration::from_millis)
    }

    /// The default dispatcher for these settings.
    pub fn dispatcher(&self) -> FunctionDispatcher {
        let mut dispatcher = FunctionDispatcher::new();
        if let Some(limit) = self.max_concurrent_calls {
            dispatcher = dispatcher.with_max_concurrency(limit);
        }
        if let Some(timeout) = self.function_timeout() {
            dispatcher = dispatcher.with_call_timeout(timeout);
        }
        dispatcher
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        AgentError::Configuration(format!("invalid {ENV_PREFIX}{name} '{raw}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.failure_policy, FailurePolicy::KeepRequest);
        assert!(config.system_prompt.is_none());
        assert!(config.dispatcher().max_concurrency().is_none());
    }

    #[test]
    fn builder_sets_fields() {
        let config = SessionConfig::builder()
            .system_prompt("be brief")
            .max_rounds(3)
            .max_concurrent_calls(2)
            .function_timeout_ms(500)
            .failure_policy(FailurePolicy::Rollback)
            .build();
        assert_eq!(config.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(config.dispatcher().max_concurrency(), Some(2));
        assert_eq!(config.function_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn env_layer_overrides_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("CACTUS_AGENT_SYSTEM_PROMPT", "You are terse."),
            ("CACTUS_AGENT_MAX_ROUNDS", "5"),
            ("CACTUS_AGENT_FAILURE_POLICY", "rollback"),
            ("CACTUS_AGENT_TEMPERATURE", "0.2"),
            ("CACTUS_AGENT_MAX_CONCURRENT_CALLS", " "),
        ]))
        .unwrap();
        assert_eq!(config.system_prompt.as_deref(), Some("You are terse."));
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.failure_policy, FailurePolicy::Rollback);
        assert_eq!(config.options.temperature, Some(0.2));
        assert_eq!(config.max_concurrent_calls, None);
    }

    #[test]
    fn malformed_env_values_are_configuration_errors() {
        let err = SessionConfig::from_lookup(lookup(&[("CACTUS_AGENT_MAX_ROUNDS", "many")])).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(ref m) if m.contains("MAX_ROUNDS")));

        let err = SessionConfig::from_lookup(lookup(&[("CACTUS_AGENT_FAILURE_POLICY", "shrug")])).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));

        let err = SessionConfig::from_lookup(lookup(&[("CACTUS_AGENT_MAX_ROUNDS", "0")])).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn failure_policy_names() {
        assert_eq!(FailurePolicy::KeepRequest.to_string(), "keep_request");
        assert_eq!("rollback".parse::<FailurePolicy>().unwrap(), FailurePolicy::Rollback);
        let json = serde_json::to_string(&FailurePolicy::Rollback).unwrap();
        assert_eq!(json, "\"rollback\"");
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"system_prompt": "hi"}"#).unwrap();
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.failure_policy, FailurePolicy::KeepRequest);
    }
}
