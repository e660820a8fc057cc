//! Environment-driven configuration.
//!
//! All settings come from environment variables; anything optional has a
//! default chosen to work for local development against a localhost
//! Postgres. `Config::from_env()` validates everything up front so both
//! binaries fail fast with a precise message instead of mid-request.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Which LLM provider backs content generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    /// Deterministic in-process provider for development and tests.
    Mock,
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
}

/// LLM provider settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Selected provider implementation.
    pub provider: LlmProviderKind,
    /// Base URL of the OpenAI-compatible endpoint.
    pub openai_base_url: String,
    /// API key for the endpoint. Required when `provider` is `OpenAi`.
    pub openai_api_key: String,
    /// Model identifier passed through to the endpoint.
    pub openai_model: String,
}

/// Content length caps, in Unicode scalar values (runes).
#[derive(Debug, Clone, Copy)]
pub struct ContentLimits {
    /// Maximum draft/battle-opening length.
    pub draft_max_len: usize,
    /// Maximum reply length.
    pub reply_max_len: usize,
    /// Maximum digest summary length.
    pub summary_max_len: usize,
}

/// Default daily quotas applied to newly created personas.
#[derive(Debug, Clone, Copy)]
pub struct QuotaDefaults {
    /// Drafts per persona per UTC day.
    pub draft: i32,
    /// Worker-generated replies per persona per UTC day.
    pub reply: i32,
    /// Preview generations per persona per UTC day.
    pub preview: i32,
}

/// Full application configuration shared by the server and the worker.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the API server listens on.
    pub port: u16,
    /// Postgres connection string.
    pub database_url: String,
    /// Secret for signing short-lived remix tokens.
    pub jwt_secret: String,
    /// Allowed CORS origin for the browser UI.
    pub frontend_origin: String,
    /// LLM provider settings.
    pub llm: LlmConfig,
    /// Content length caps.
    pub limits: ContentLimits,
    /// Default daily quotas for new personas.
    pub quotas: QuotaDefaults,
    /// Worker poll interval.
    pub worker_poll_every: Duration,
    /// Port for the worker's /healthz and /metrics listener.
    pub worker_observability_port: u16,
}

impl Config {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require_var("DATABASE_URL")?;
        let jwt_secret = require_var("JWT_SECRET")?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue {
                name: "JWT_SECRET".to_string(),
                message: "must be at least 16 characters".to_string(),
            });
        }

        let provider = match optional_var("LLM_PROVIDER").as_deref() {
            None | Some("mock") => LlmProviderKind::Mock,
            Some("openai") => LlmProviderKind::OpenAi,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "LLM_PROVIDER".to_string(),
                    message: format!("unknown provider '{other}', expected 'mock' or 'openai'"),
                });
            }
        };

        let openai_api_key = optional_var("OPENAI_API_KEY").unwrap_or_default();
        if provider == LlmProviderKind::OpenAi && openai_api_key.is_empty() {
            return Err(ConfigError::MissingVar {
                name: "OPENAI_API_KEY".to_string(),
            });
        }

        Ok(Self {
            port: parse_var("PORT", 8080)?,
            database_url,
            jwt_secret,
            frontend_origin: optional_var("FRONTEND_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            llm: LlmConfig {
                provider,
                openai_base_url: optional_var("OPENAI_BASE_URL")
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                openai_api_key,
                openai_model: optional_var("OPENAI_MODEL")
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            },
            limits: ContentLimits {
                draft_max_len: parse_positive("DRAFT_MAX_LEN", 500)?,
                reply_max_len: parse_positive("REPLY_MAX_LEN", 280)?,
                summary_max_len: parse_positive("SUMMARY_MAX_LEN", 400)?,
            },
            quotas: QuotaDefaults {
                draft: parse_positive("DEFAULT_DRAFT_QUOTA", 5)?,
                reply: parse_positive("DEFAULT_REPLY_QUOTA", 25)?,
                preview: parse_positive("DEFAULT_PREVIEW_QUOTA", 5)?,
            },
            worker_poll_every: parse_duration("WORKER_POLL_EVERY", Duration::from_secs(3))?,
            worker_observability_port: parse_var("WORKER_OBSERVABILITY_PORT", 9090)?,
        })
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ConfigError::MissingVar {
            name: name.to_string(),
        }),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(val) => val.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("could not parse '{val}'"),
        }),
        None => Ok(default),
    }
}

/// Parse a duration given in whole seconds, with an optional trailing
/// `s` ("3" and "3s" both mean three seconds).
fn parse_duration(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    let Some(val) = optional_var(name) else {
        return Ok(default);
    };
    let digits = val.trim().trim_end_matches('s');
    match digits.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("could not parse '{val}' as a duration in seconds"),
        }),
    }
}

fn parse_positive<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display,
{
    let value: T = parse_var(name, default)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("must be positive, got {value}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment mutation is process-global, so tests that need variables
    // set funnel through this lock to avoid interleaving.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn with_base_env<R>(extra: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let all_keys = [
            "PORT",
            "DATABASE_URL",
            "JWT_SECRET",
            "FRONTEND_ORIGIN",
            "LLM_PROVIDER",
            "OPENAI_BASE_URL",
            "OPENAI_API_KEY",
            "OPENAI_MODEL",
            "DRAFT_MAX_LEN",
            "REPLY_MAX_LEN",
            "SUMMARY_MAX_LEN",
            "DEFAULT_DRAFT_QUOTA",
            "DEFAULT_REPLY_QUOTA",
            "DEFAULT_PREVIEW_QUOTA",
            "WORKER_POLL_EVERY",
            "WORKER_OBSERVABILITY_PORT",
        ];
        for key in all_keys {
            env::remove_var(key);
        }
        env::set_var("DATABASE_URL", "postgres://localhost/personaworlds");
        env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        for (key, val) in extra {
            env::set_var(key, val);
        }
        let result = f();
        for key in all_keys {
            env::remove_var(key);
        }
        result
    }

    #[test]
    fn defaults_applied() {
        with_base_env(&[], || {
            let config = Config::from_env().expect("config");
            assert_eq!(config.port, 8080);
            assert_eq!(config.limits.draft_max_len, 500);
            assert_eq!(config.limits.reply_max_len, 280);
            assert_eq!(config.limits.summary_max_len, 400);
            assert_eq!(config.quotas.draft, 5);
            assert_eq!(config.quotas.reply, 25);
            assert_eq!(config.quotas.preview, 5);
            assert_eq!(config.worker_poll_every, Duration::from_secs(3));
            assert_eq!(config.llm.provider, LlmProviderKind::Mock);
        });
    }

    #[test]
    fn missing_database_url_rejected() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        env::remove_var("DATABASE_URL");
        env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        let err = Config::from_env().expect_err("should fail");
        assert!(err.to_string().contains("DATABASE_URL"));
        env::remove_var("JWT_SECRET");
    }

    #[test]
    fn short_jwt_secret_rejected() {
        with_base_env(&[("JWT_SECRET", "short")], || {
            let err = Config::from_env().expect_err("should fail");
            assert!(err.to_string().contains("JWT_SECRET"));
        });
    }

    #[test]
    fn openai_without_key_rejected() {
        with_base_env(&[("LLM_PROVIDER", "openai")], || {
            let err = Config::from_env().expect_err("should fail");
            assert!(err.to_string().contains("OPENAI_API_KEY"));
        });
    }

    #[test]
    fn openai_with_key_accepted() {
        with_base_env(
            &[("LLM_PROVIDER", "openai"), ("OPENAI_API_KEY", "sk-test")],
            || {
                let config = Config::from_env().expect("config");
                assert_eq!(config.llm.provider, LlmProviderKind::OpenAi);
                assert_eq!(config.llm.openai_model, "gpt-4o-mini");
            },
        );
    }

    #[test]
    fn unknown_provider_rejected() {
        with_base_env(&[("LLM_PROVIDER", "claude")], || {
            let err = Config::from_env().expect_err("should fail");
            assert!(err.to_string().contains("unknown provider"));
        });
    }

    #[test]
    fn zero_quota_rejected() {
        with_base_env(&[("DEFAULT_DRAFT_QUOTA", "0")], || {
            let err = Config::from_env().expect_err("should fail");
            assert!(err.to_string().contains("DEFAULT_DRAFT_QUOTA"));
        });
    }

    #[test]
    fn poll_interval_accepts_suffixed_seconds() {
        with_base_env(&[("WORKER_POLL_EVERY", "10s")], || {
            let config = Config::from_env().expect("config");
            assert_eq!(config.worker_poll_every, Duration::from_secs(10));
        });
    }

    #[test]
    fn poll_interval_rejects_zero() {
        with_base_env(&[("WORKER_POLL_EVERY", "0")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn unparsable_port_rejected() {
        with_base_env(&[("PORT", "not-a-port")], || {
            let err = Config::from_env().expect_err("should fail");
            assert!(err.to_string().contains("PORT"));
        });
    }
}
