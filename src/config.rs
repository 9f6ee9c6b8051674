use crate::defaults;
use crate::error::{Result, ScriptsmithError};
use crate::processing::chunker::Chunker;
use crate::processing::controller::ConcurrencyController;
use crate::processing::dispatch::{DispatchSettings, RetryPolicy};
use crate::processing::strategy::StrategySelector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub processing: ProcessingConfig,
}

/// Text-generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Chunking and dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    pub chunking_threshold: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_concurrent_chunks: usize,
    /// Attempts per segment, the first call included.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub min_result_chars: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            base_url: defaults::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: defaults::API_TIMEOUT_SECS,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunking_threshold: defaults::CHUNKING_THRESHOLD,
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
            max_concurrent_chunks: defaults::MAX_CONCURRENT_CHUNKS,
            max_retries: defaults::MAX_RETRIES,
            retry_delay_secs: defaults::RETRY_DELAY_SECS,
            min_result_chars: defaults::MIN_RESULT_CHARS,
        }
    }
}

fn check_range<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ScriptsmithError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!(
                "{value} is outside the allowed range {}..={}",
                range.start(),
                range.end()
            ),
        })
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "service.model".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        check_range("service.timeout_secs", self.timeout_secs, 30..=600)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<()> {
        check_range(
            "processing.chunking_threshold",
            self.chunking_threshold,
            5_000..=100_000,
        )?;
        check_range("processing.chunk_size", self.chunk_size, 10_000..=50_000)?;
        check_range("processing.chunk_overlap", self.chunk_overlap, 0..=2_000)?;
        if self.chunk_overlap >= self.chunk_size {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "processing.chunk_overlap".to_string(),
                message: format!(
                    "{} must be smaller than chunk_size {}",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }
        check_range(
            "processing.max_concurrent_chunks",
            self.max_concurrent_chunks,
            1..=10,
        )?;
        check_range("processing.max_retries", self.max_retries, 1..=10)?;
        check_range("processing.retry_delay_secs", self.retry_delay_secs, 1..=60)?;
        if self.min_result_chars == 0 {
            return Err(ScriptsmithError::ConfigInvalidValue {
                key: "processing.min_result_chars".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }

    pub fn strategy_selector(&self) -> StrategySelector {
        StrategySelector::new(self.chunking_threshold, self.chunk_size, self.chunk_overlap)
    }

    pub fn controller(&self) -> Result<ConcurrencyController> {
        ConcurrencyController::new(self.max_concurrent_chunks)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.retry_delay_secs),
            Duration::from_secs(defaults::MAX_RETRY_DELAY_SECS),
        )
    }
}

/// First non-empty value among `names`, with the name it came from.
fn env_value(names: &[&str]) -> Option<(String, String)> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| (name.to_string(), value))
    })
}

fn env_number<T: FromStr>(names: &[&str]) -> Result<Option<T>> {
    match env_value(names) {
        Some((name, value)) => value.trim().parse().map(Some).map_err(|_| {
            ScriptsmithError::ConfigInvalidValue {
                key: name,
                message: format!("'{value}' is not a valid number"),
            }
        }),
        None => Ok(None),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. Values are not range-checked here;
    /// call [`Config::validate`] once overrides are applied.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScriptsmithError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ScriptsmithError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(ScriptsmithError::ConfigFileNotFound { .. }) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables (the `SCRIPTSMITH_` name wins over the
    /// legacy one):
    /// - SCRIPTSMITH_MODEL, OPENAI_MODEL → service.model
    /// - SCRIPTSMITH_API_KEY, OPENAI_API_KEY → service.api_key
    /// - SCRIPTSMITH_BASE_URL → service.base_url
    /// - SCRIPTSMITH_CHUNKING_THRESHOLD, CHUNKING_THRESHOLD → processing.chunking_threshold
    /// - SCRIPTSMITH_CHUNK_SIZE, CHUNK_SIZE → processing.chunk_size
    /// - SCRIPTSMITH_CHUNK_OVERLAP, CHUNK_OVERLAP → processing.chunk_overlap
    /// - SCRIPTSMITH_MAX_CONCURRENT_CHUNKS, MAX_CONCURRENT_CHUNKS → processing.max_concurrent_chunks
    ///
    /// Empty values are ignored; unparsable numbers are an error.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some((_, model)) = env_value(&["SCRIPTSMITH_MODEL", "OPENAI_MODEL"]) {
            self.service.model = model;
        }

        if let Some((_, key)) = env_value(&["SCRIPTSMITH_API_KEY", "OPENAI_API_KEY"]) {
            self.service.api_key = Some(key);
        }

        if let Some((_, url)) = env_value(&["SCRIPTSMITH_BASE_URL"]) {
            self.service.base_url = url;
        }

        if let Some(threshold) =
            env_number(&["SCRIPTSMITH_CHUNKING_THRESHOLD", "CHUNKING_THRESHOLD"])?
        {
            self.processing.chunking_threshold = threshold;
        }

        if let Some(size) = env_number(&["SCRIPTSMITH_CHUNK_SIZE", "CHUNK_SIZE"])? {
            self.processing.chunk_size = size;
        }

        if let Some(overlap) = env_number(&["SCRIPTSMITH_CHUNK_OVERLAP", "CHUNK_OVERLAP"])? {
            self.processing.chunk_overlap = overlap;
        }

        if let Some(limit) =
            env_number(&["SCRIPTSMITH_MAX_CONCURRENT_CHUNKS", "MAX_CONCURRENT_CHUNKS"])?
        {
            self.processing.max_concurrent_chunks = limit;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.service.validate()?;
        self.processing.validate()
    }

    /// Dispatch settings for this config and the given system prompt.
    pub fn dispatch_settings(&self, system_prompt: impl Into<String>) -> Result<DispatchSettings> {
        Ok(DispatchSettings::new(self.service.model.clone(), system_prompt)
            .with_timeout(self.service.timeout())
            .with_retry(self.processing.retry_policy()?)
            .with_min_result_chars(self.processing.min_result_chars))
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.service.api_key.is_some() {
            config.service.api_key = Some("********".to_string());
        }
        config
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scriptsmith/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("scriptsmith")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_NAMES: &[&str] = &[
        "SCRIPTSMITH_MODEL",
        "SCRIPTSMITH_API_KEY",
        "SCRIPTSMITH_BASE_URL",
        "SCRIPTSMITH_CHUNKING_THRESHOLD",
        "SCRIPTSMITH_CHUNK_SIZE",
        "SCRIPTSMITH_CHUNK_OVERLAP",
        "SCRIPTSMITH_MAX_CONCURRENT_CHUNKS",
        "OPENAI_MODEL",
        "OPENAI_API_KEY",
        "CHUNKING_THRESHOLD",
        "CHUNK_SIZE",
        "CHUNK_OVERLAP",
        "MAX_CONCURRENT_CHUNKS",
    ];

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_env() {
        for name in ENV_NAMES {
            remove_env(name);
        }
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.service.model, "gpt-4o-mini");
        assert_eq!(config.service.base_url, "https://api.openai.com/v1");
        assert_eq!(config.service.api_key, None);
        assert_eq!(config.service.timeout_secs, 120);
        assert_eq!(config.processing.chunking_threshold, 20_000);
        assert_eq!(config.processing.chunk_size, 35_000);
        assert_eq!(config.processing.chunk_overlap, 500);
        assert_eq!(config.processing.max_concurrent_chunks, 3);
        assert_eq!(config.processing.max_retries, 3);
        assert_eq!(config.processing.retry_delay_secs, 1);
        assert_eq!(config.processing.min_result_chars, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [service]
            model = "gpt-4o"
            base_url = "http://localhost:8080/v1"
            timeout_secs = 300

            [processing]
            chunking_threshold = 15000
            chunk_size = 30000
            chunk_overlap = 1000
            max_concurrent_chunks = 5
            max_retries = 4
            retry_delay_secs = 2
            min_result_chars = 20
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.service.model, "gpt-4o");
        assert_eq!(config.service.base_url, "http://localhost:8080/v1");
        assert_eq!(config.service.timeout_secs, 300);
        assert_eq!(config.processing.chunking_threshold, 15_000);
        assert_eq!(config.processing.chunk_size, 30_000);
        assert_eq!(config.processing.chunk_overlap, 1_000);
        assert_eq!(config.processing.max_concurrent_chunks, 5);
        assert_eq!(config.processing.max_retries, 4);
        assert_eq!(config.processing.retry_delay_secs, 2);
        assert_eq!(config.processing.min_result_chars, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [processing]
            chunk_size = 40000
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.processing.chunk_size, 40_000);
        assert_eq!(config.processing.chunk_overlap, 500);
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let result = Config::load(Path::new("/tmp/nonexistent_scriptsmith_config_12345.toml"));
        assert!(matches!(
            result,
            Err(ScriptsmithError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_scriptsmith_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [processing
            chunk_size = "broken
        "#,
        );

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(ScriptsmithError::Config(_))
        ));
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let cases: Vec<(&str, fn(&mut Config))> = vec![
            ("processing.chunking_threshold", |c: &mut Config| c.processing.chunking_threshold = 4_999),
            ("processing.chunk_size", |c: &mut Config| c.processing.chunk_size = 50_001),
            ("processing.chunk_overlap", |c: &mut Config| c.processing.chunk_overlap = 2_001),
            ("processing.max_concurrent_chunks", |c: &mut Config| c.processing.max_concurrent_chunks = 0),
            ("processing.max_retries", |c: &mut Config| c.processing.max_retries = 11),
            ("processing.retry_delay_secs", |c: &mut Config| c.processing.retry_delay_secs = 0),
            ("processing.min_result_chars", |c: &mut Config| c.processing.min_result_chars = 0),
            ("service.timeout_secs", |c: &mut Config| c.service.timeout_secs = 29),
            ("service.model", |c: &mut Config| c.service.model = " ".to_string()),
        ];

        for (expected_key, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);
            match config.validate() {
                Err(ScriptsmithError::ConfigInvalidValue { key, .. }) => {
                    assert_eq!(key, expected_key)
                }
                other => panic!("Expected invalid {expected_key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_conversions_follow_config() {
        let mut config = Config::default();
        config.processing.max_concurrent_chunks = 7;
        config.processing.max_retries = 5;

        let chunker = config.processing.chunker().unwrap();
        assert_eq!(chunker.target_size(), 35_000);
        assert_eq!(chunker.overlap(), 500);
        assert_eq!(config.processing.controller().unwrap().limit(), 7);

        let settings = config.dispatch_settings("system prompt").unwrap();
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.system_prompt, "system prompt");
        assert_eq!(settings.timeout, Duration::from_secs(120));
        assert_eq!(settings.retry.max_attempts(), 5);
        assert_eq!(settings.retry.delay_for(10), Duration::from_secs(60));
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut config = Config::default();
        assert_eq!(config.redacted().service.api_key, None);

        config.service.api_key = Some("sk-secret".to_string());
        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn test_env_override_service() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("SCRIPTSMITH_MODEL", "gpt-4o");
        set_env("SCRIPTSMITH_API_KEY", "sk-test");
        set_env("SCRIPTSMITH_BASE_URL", "http://localhost:1234/v1");
        let config = Config::default().with_env_overrides().unwrap();

        assert_eq!(config.service.model, "gpt-4o");
        assert_eq!(config.service.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.service.base_url, "http://localhost:1234/v1");

        clear_env();
    }

    #[test]
    fn test_env_override_processing() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("SCRIPTSMITH_CHUNKING_THRESHOLD", "10000");
        set_env("SCRIPTSMITH_CHUNK_SIZE", "20000");
        set_env("SCRIPTSMITH_CHUNK_OVERLAP", "250");
        set_env("SCRIPTSMITH_MAX_CONCURRENT_CHUNKS", "6");
        let config = Config::default().with_env_overrides().unwrap();

        assert_eq!(config.processing.chunking_threshold, 10_000);
        assert_eq!(config.processing.chunk_size, 20_000);
        assert_eq!(config.processing.chunk_overlap, 250);
        assert_eq!(config.processing.max_concurrent_chunks, 6);

        clear_env();
    }

    #[test]
    fn test_env_legacy_names_apply_and_prefixed_wins() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("OPENAI_API_KEY", "sk-legacy");
        set_env("OPENAI_MODEL", "gpt-3.5-turbo");
        set_env("CHUNK_SIZE", "25000");
        set_env("SCRIPTSMITH_CHUNK_SIZE", "45000");
        let config = Config::default().with_env_overrides().unwrap();

        assert_eq!(config.service.api_key.as_deref(), Some("sk-legacy"));
        assert_eq!(config.service.model, "gpt-3.5-turbo");
        assert_eq!(config.processing.chunk_size, 45_000);

        clear_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("SCRIPTSMITH_MODEL", "");
        set_env("SCRIPTSMITH_CHUNK_SIZE", "  ");
        let config = Config::default().with_env_overrides().unwrap();

        assert_eq!(config.service.model, "gpt-4o-mini");
        assert_eq!(config.processing.chunk_size, 35_000);

        clear_env();
    }

    #[test]
    fn test_env_override_rejects_non_numeric() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("MAX_CONCURRENT_CHUNKS", "lots");
        let result = Config::default().with_env_overrides();

        match result {
            Err(ScriptsmithError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "MAX_CONCURRENT_CHUNKS")
            }
            other => panic!("Expected ConfigInvalidValue, got {other:?}"),
        }

        clear_env();
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("scriptsmith"));
        assert!(path_str.ends_with("config.toml"));
    }
}
