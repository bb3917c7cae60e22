//! Process-wide typed configuration (spec.md §6's "recognized options"
//! table). A plain struct with a `from_env()` constructor, in the
//! teacher's style (`llm::client::ClientConfig`, `orchestrator::OrchestratorConfig`)
//! rather than a configuration-framework dependency.

use crate::llm::types::Provider;
use std::env;
use std::time::Duration;

/// Default sampling temperature per deployment posture: deterministic
/// hosted providers default colder than a local model, per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureDefaults {
    pub deterministic_hosted: f32,
    pub local: f32,
}

impl Default for TemperatureDefaults {
    fn default() -> Self {
        Self {
            deterministic_hosted: 0.0,
            local: 0.1,
        }
    }
}

impl TemperatureDefaults {
    /// Resolve the default temperature for `provider`. None of
    /// `Provider`'s current variants represent a local deployment, so
    /// this always resolves to `deterministic_hosted` today; `local`
    /// is retained on the struct for when a local-model provider is
    /// added.
    pub fn for_provider(&self, _provider: Provider) -> f32 {
        self.deterministic_hosted
    }
}

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_provider: Provider,
    pub llm_model: String,
    pub llm_api_key: String,
    pub temperature_default: TemperatureDefaults,

    pub sqlite_enabled: bool,
    pub sqlite_db_path: String,
    pub sqlite_wal_mode: bool,
    pub sqlite_retention_days: u32,

    pub circuit_breaker_max_failures: u32,
    pub circuit_breaker_timeout_seconds: u64,

    pub example_pool_path: Option<String>,
    pub knn_default_k: usize,
    pub strategy_deadline_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables, applying the
    /// documented defaults for anything unset. `LLM_API_KEY` falls back
    /// to a provider-specific variable (`ANTHROPIC_API_KEY`,
    /// `OPENAI_API_KEY`, `OPENROUTER_API_KEY`) when unset, matching the
    /// "LLM_API_KEY / per-provider key" row.
    pub fn from_env() -> Self {
        let llm_provider = parse_provider(&env_or("LLM_PROVIDER", "anthropic"));
        let llm_api_key = env::var("LLM_API_KEY")
            .ok()
            .or_else(|| env::var(provider_key_var(llm_provider)).ok())
            .unwrap_or_default();

        Self {
            llm_provider,
            llm_model: env_or("LLM_MODEL", "claude-3-5-sonnet-20241022"),
            llm_api_key,
            temperature_default: TemperatureDefaults::default(),

            sqlite_enabled: env_bool("SQLITE_ENABLED", true),
            sqlite_db_path: env_or("SQLITE_DB_PATH", "promptforge.db"),
            sqlite_wal_mode: env_bool("SQLITE_WAL_MODE", true),
            sqlite_retention_days: env_parse("SQLITE_RETENTION_DAYS", 90),

            circuit_breaker_max_failures: env_parse("CIRCUIT_BREAKER_MAX_FAILURES", 5),
            circuit_breaker_timeout_seconds: env_parse("CIRCUIT_BREAKER_TIMEOUT_SECONDS", 60),

            example_pool_path: env::var("EXAMPLE_POOL_PATH").ok(),
            knn_default_k: env_parse("KNN_DEFAULT_K", 3),
            strategy_deadline_seconds: env_parse("STRATEGY_DEADLINE_SECONDS", 30),
        }
    }

    /// The global per-request deadline as a `Duration`, for use with
    /// `Instant::now() + config.strategy_deadline()`.
    pub fn strategy_deadline(&self) -> Duration {
        Duration::from_secs(self.strategy_deadline_seconds)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_provider(raw: &str) -> Provider {
    match raw.trim().to_ascii_lowercase().as_str() {
        "openai" => Provider::OpenAI,
        "openrouter" => Provider::OpenRouter,
        _ => Provider::Anthropic,
    }
}

fn provider_key_var(provider: Provider) -> &'static str {
    match provider {
        Provider::Anthropic => "ANTHROPIC_API_KEY",
        Provider::OpenAI => "OPENAI_API_KEY",
        Provider::OpenRouter => "OPENROUTER_API_KEY",
        #[cfg(feature = "gemini")]
        Provider::Google => "GOOGLE_API_KEY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable tests must not run concurrently with each
    // other; std::env is process-global state.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_vars() {
        for key in [
            "LLM_PROVIDER",
            "LLM_MODEL",
            "LLM_API_KEY",
            "ANTHROPIC_API_KEY",
            "SQLITE_ENABLED",
            "SQLITE_DB_PATH",
            "SQLITE_WAL_MODE",
            "SQLITE_RETENTION_DAYS",
            "CIRCUIT_BREAKER_MAX_FAILURES",
            "CIRCUIT_BREAKER_TIMEOUT_SECONDS",
            "EXAMPLE_POOL_PATH",
            "KNN_DEFAULT_K",
            "STRATEGY_DEADLINE_SECONDS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        let config = Config::from_env();
        assert_eq!(config.llm_provider, Provider::Anthropic);
        assert!(config.sqlite_enabled);
        assert!(config.sqlite_wal_mode);
        assert_eq!(config.knn_default_k, 3);
        assert_eq!(config.strategy_deadline_seconds, 30);
    }

    #[test]
    fn test_reads_overridden_values() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        env::set_var("LLM_PROVIDER", "openai");
        env::set_var("KNN_DEFAULT_K", "7");
        env::set_var("SQLITE_ENABLED", "false");
        let config = Config::from_env();
        assert_eq!(config.llm_provider, Provider::OpenAI);
        assert_eq!(config.knn_default_k, 7);
        assert!(!config.sqlite_enabled);
        clear_vars();
    }

    #[test]
    fn test_llm_api_key_falls_back_to_provider_specific_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        env::set_var("LLM_PROVIDER", "anthropic");
        env::set_var("ANTHROPIC_API_KEY", "sk-test-123");
        let config = Config::from_env();
        assert_eq!(config.llm_api_key, "sk-test-123");
        clear_vars();
    }

    #[test]
    fn test_temperature_defaults_by_provider() {
        let temps = TemperatureDefaults::default();
        assert_eq!(temps.for_provider(Provider::Anthropic), 0.0);
        assert_eq!(temps.for_provider(Provider::OpenRouter), 0.0);
        assert_eq!(temps.local, 0.1);
    }

    #[test]
    fn test_strategy_deadline_as_duration() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        env::set_var("STRATEGY_DEADLINE_SECONDS", "45");
        let config = Config::from_env();
        assert_eq!(config.strategy_deadline(), Duration::from_secs(45));
        clear_vars();
    }
}
