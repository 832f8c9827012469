//! Runtime settings
//!
//! Loaded from the process environment after `creds.txt` and `.env` are read
//! with dotenv. Unset keys fall back to defaults; malformed values are errors.

use crate::error::RelayError;
use crate::memory::{ContextConfig, CHARS_PER_TOKEN};
use crate::rate_limit::RateLimitConfig;
use crate::Result;
use std::str::FromStr;

pub const DEFAULT_DEEPSEEK_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// DeepSeek chat-completion settings
#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Extra attempts after the first failure
    pub retries: u32,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_DEEPSEEK_URL.to_string(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 30,
            max_tokens: 500,
            temperature: 0.7,
            retries: 2,
        }
    }
}

impl DeepSeekConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub deepseek: DeepSeekConfig,
    pub context: ContextConfig,
    pub rate_limit: RateLimitConfig,
    pub sweep_interval_secs: u64,
    pub port: u16,
    pub log_level: String,
    /// Log file written next to console output; `LOG_FILE=none` disables it
    pub log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deepseek: DeepSeekConfig::default(),
            context: ContextConfig::default(),
            rate_limit: RateLimitConfig::default(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            port: 8080,
            log_level: "info".to_string(),
            log_file: Some("bot.log".to_string()),
        }
    }
}

impl Settings {
    /// Load `creds.txt` and `.env`, then read the environment
    pub fn from_env() -> Result<Self> {
        dotenv::from_filename("creds.txt").ok();
        dotenv::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Settings::default();
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let deepseek = DeepSeekConfig {
            api_key: lookup("DEEPSEEK_API_KEY").unwrap_or_default(),
            api_url: lookup("DEEPSEEK_API_URL").unwrap_or(defaults.deepseek.api_url),
            model: lookup("DEEPSEEK_MODEL").unwrap_or(defaults.deepseek.model),
            timeout_secs: parse_or(&lookup, "DEEPSEEK_TIMEOUT_SECS", defaults.deepseek.timeout_secs)?,
            max_tokens: parse_or(&lookup, "DEEPSEEK_MAX_TOKENS", defaults.deepseek.max_tokens)?,
            temperature: parse_or(&lookup, "DEEPSEEK_TEMPERATURE", defaults.deepseek.temperature)?,
            retries: parse_or(&lookup, "DEEPSEEK_RETRIES", defaults.deepseek.retries)?,
        };

        let timeout_minutes: u64 = parse_or(
            &lookup,
            "CONTEXT_TIMEOUT_MINUTES",
            defaults.context.ttl_secs / 60,
        )?;
        let max_tokens: usize = parse_or(
            &lookup,
            "CONTEXT_MAX_TOKENS",
            defaults.context.max_rendered_chars / CHARS_PER_TOKEN,
        )?;

        let context = ContextConfig {
            max_entries: parse_or(&lookup, "CONTEXT_MAX_MESSAGES", defaults.context.max_entries)?,
            ttl_secs: timeout_minutes.saturating_mul(60),
            max_rendered_chars: max_tokens.saturating_mul(CHARS_PER_TOKEN),
            min_entry_chars: parse_or(&lookup, "CONTEXT_MIN_CHARS", defaults.context.min_entry_chars)?,
        };

        let rate_limit = RateLimitConfig {
            max_actions: parse_or(&lookup, "RATE_LIMIT_MESSAGES", defaults.rate_limit.max_actions)?,
            window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW", defaults.rate_limit.window_secs)?,
        };

        let port = match lookup("PORT") {
            Some(_) => parse_or(&lookup, "PORT", defaults.port)?,
            None => parse_or(&lookup, "API_PORT", defaults.port)?,
        };

        Ok(Self {
            deepseek,
            context,
            rate_limit,
            sweep_interval_secs: parse_or(&lookup, "SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            port,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_file: match lookup("LOG_FILE") {
                Some(path) if path.trim().eq_ignore_ascii_case("none") => None,
                Some(path) => Some(path.trim().to_string()),
                None => defaults.log_file,
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            RelayError::invalid_config(format!("{} has invalid value {:?}: {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();

        assert_eq!(settings.rate_limit.max_actions, 5);
        assert_eq!(settings.rate_limit.window_secs, 60);
        assert_eq!(settings.context.max_entries, 10);
        assert_eq!(settings.context.ttl_secs, 1800);
        assert_eq!(settings.context.max_rendered_chars, 16_000);
        assert_eq!(settings.context.min_entry_chars, 5);
        assert_eq!(settings.sweep_interval_secs, 600);
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.deepseek.api_url, DEFAULT_DEEPSEEK_URL);
        assert!(!settings.deepseek.has_api_key());
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("CONTEXT_TIMEOUT_MINUTES", "5"),
            ("CONTEXT_MAX_TOKENS", "100"),
            ("RATE_LIMIT_MESSAGES", "3"),
            ("API_PORT", "9000"),
            ("DEEPSEEK_TEMPERATURE", "0.2"),
        ])
        .unwrap();

        assert!(settings.deepseek.has_api_key());
        assert_eq!(settings.context.ttl_secs, 300);
        assert_eq!(settings.context.max_rendered_chars, 400);
        assert_eq!(settings.rate_limit.max_actions, 3);
        assert_eq!(settings.port, 9000);
        assert!((settings.deepseek.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_log_file_setting() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.log_file.as_deref(), Some("bot.log"));

        let settings = settings_from(&[("LOG_FILE", "/var/log/relay.log")]).unwrap();
        assert_eq!(settings.log_file.as_deref(), Some("/var/log/relay.log"));

        let settings = settings_from(&[("LOG_FILE", "none")]).unwrap();
        assert!(settings.log_file.is_none());
    }

    #[test]
    fn test_port_takes_precedence_over_api_port() {
        let settings = settings_from(&[("PORT", "3000"), ("API_PORT", "9000")]).unwrap();
        assert_eq!(settings.port, 3000);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let settings = settings_from(&[("RATE_LIMIT_WINDOW", "  ")]).unwrap();
        assert_eq!(settings.rate_limit.window_secs, 60);
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let result = settings_from(&[("RATE_LIMIT_WINDOW", "a minute")]);
        match result {
            Err(RelayError::InvalidConfig(message)) => assert!(message.contains("RATE_LIMIT_WINDOW")),
            other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
        }
    }
}
