//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig as ServerConfig;
use crate::broker::BrokerConfig;
use crate::feed::{PipelineConfig, WindowCapacities, WindowSpans};
use crate::judge::GeminiConfig;
use crate::wiki::WikiConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub broker: BrokerSection,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub wiki: WikiSection,

    #[serde(default)]
    pub judge: JudgeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Refresh pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_cycle_deadline")]
    pub cycle_deadline_secs: u64,

    #[serde(default = "default_judge_timeout")]
    pub judge_timeout_secs: u64,

    #[serde(default = "default_lookback")]
    pub lookback_secs: u64,

    #[serde(default)]
    pub windows: WindowsConfig,
}

fn default_interval() -> u64 {
    60
}

fn default_cycle_deadline() -> u64 {
    30
}

fn default_judge_timeout() -> u64 {
    20
}

fn default_lookback() -> u64 {
    70
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            cycle_deadline_secs: default_cycle_deadline(),
            judge_timeout_secs: default_judge_timeout(),
            lookback_secs: default_lookback(),
            windows: WindowsConfig::default(),
        }
    }
}

/// Time span covered by each window
#[derive(Debug, Clone, Deserialize)]
pub struct WindowsConfig {
    #[serde(default = "default_short_window")]
    pub short_secs: u64,

    #[serde(default = "default_medium_window")]
    pub medium_secs: u64,

    #[serde(default = "default_long_window")]
    pub long_secs: u64,
}

fn default_short_window() -> u64 {
    60
}

fn default_medium_window() -> u64 {
    60 * 60
}

fn default_long_window() -> u64 {
    24 * 60 * 60
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            short_secs: default_short_window(),
            medium_secs: default_medium_window(),
            long_secs: default_long_window(),
        }
    }
}

/// Broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSection {
    #[serde(default = "default_publish_capacity")]
    pub publish_capacity: usize,

    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,

    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

fn default_publish_capacity() -> usize {
    64
}

fn default_subscriber_capacity() -> usize {
    16
}

fn default_max_subscribers() -> usize {
    1000
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            publish_capacity: default_publish_capacity(),
            subscriber_capacity: default_subscriber_capacity(),
            max_subscribers: default_max_subscribers(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    "./static".to_string()
}

fn default_keep_alive() -> u64 {
    15
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Wikipedia source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikiSection {
    #[serde(default = "default_wiki_api_url")]
    pub api_url: String,

    #[serde(default = "default_wiki_timeout")]
    pub request_timeout_secs: u64,

    pub user_agent: Option<String>,
}

fn default_wiki_api_url() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

fn default_wiki_timeout() -> u64 {
    10
}

impl Default for WikiSection {
    fn default() -> Self {
        Self {
            api_url: default_wiki_api_url(),
            request_timeout_secs: default_wiki_timeout(),
            user_agent: None,
        }
    }
}

/// Gemini judge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gemini_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Usually supplied through `GEMINI_API_KEY` instead
    pub api_key: Option<String>,
}

fn default_judge_enabled() -> bool {
    true
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_output_tokens() -> u32 {
    100
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_judge_enabled(),
            base_url: default_gemini_url(),
            model: default_gemini_model(),
            max_output_tokens: default_max_output_tokens(),
            api_key: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("widiff").join("config.toml")),
            Some(PathBuf::from("/etc/widiff/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!(path = ?path, "Loaded config");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "Failed to load config");
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// An explicit path must load; otherwise fall back to the default search.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(variable = key, value = %raw, "Ignoring unparsable override");
                    None
                }
            }
        }

        // Feed overrides
        if let Some(secs) = parsed(&lookup, "WIDIFF_INTERVAL_SECS") {
            self.feed.interval_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "WIDIFF_CYCLE_DEADLINE_SECS") {
            self.feed.cycle_deadline_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "WIDIFF_JUDGE_TIMEOUT_SECS") {
            self.feed.judge_timeout_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "WIDIFF_LOOKBACK_SECS") {
            self.feed.lookback_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "WIDIFF_WINDOW_SHORT_SECS") {
            self.feed.windows.short_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "WIDIFF_WINDOW_MEDIUM_SECS") {
            self.feed.windows.medium_secs = secs;
        }
        if let Some(secs) = parsed(&lookup, "WIDIFF_WINDOW_LONG_SECS") {
            self.feed.windows.long_secs = secs;
        }

        // API overrides
        if let Some(host) = lookup("WIDIFF_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = parsed(&lookup, "WIDIFF_API_PORT") {
            self.api.port = port;
        }
        if let Some(dir) = lookup("WIDIFF_STATIC_DIR") {
            self.api.static_dir = dir;
        }

        // Source and judge overrides
        if let Some(url) = lookup("WIDIFF_WIKI_API_URL") {
            self.wiki.api_url = url;
        }
        if let Some(model) = lookup("WIDIFF_JUDGE_MODEL") {
            self.judge.model = model;
        }
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
            self.judge.api_key = Some(key);
        }

        // Logging overrides
        if let Some(level) = lookup("WIDIFF_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("WIDIFF_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.interval_secs == 0 {
            return Err(ConfigError::Invalid("feed.interval_secs must be > 0".into()));
        }
        if self.feed.cycle_deadline_secs == 0 {
            return Err(ConfigError::Invalid(
                "feed.cycle_deadline_secs must be > 0".into(),
            ));
        }
        self.window_capacities()?;

        if self.broker.publish_capacity == 0
            || self.broker.subscriber_capacity == 0
            || self.broker.max_subscribers == 0
        {
            return Err(ConfigError::Invalid(
                "broker capacities and max_subscribers must be > 0".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        if self.feed.judge_timeout_secs >= self.feed.cycle_deadline_secs {
            tracing::warn!(
                judge_timeout_secs = self.feed.judge_timeout_secs,
                cycle_deadline_secs = self.feed.cycle_deadline_secs,
                "Judge timeout is not shorter than the cycle deadline; slow reviews will skip cycles"
            );
        }
        Ok(())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            interval: Duration::from_secs(self.feed.interval_secs),
            cycle_deadline: Duration::from_secs(self.feed.cycle_deadline_secs),
            judge_timeout: Duration::from_secs(self.feed.judge_timeout_secs),
            lookback: Duration::from_secs(self.feed.lookback_secs),
        }
    }

    pub fn window_spans(&self) -> WindowSpans {
        WindowSpans {
            short: Duration::from_secs(self.feed.windows.short_secs),
            medium: Duration::from_secs(self.feed.windows.medium_secs),
            long: Duration::from_secs(self.feed.windows.long_secs),
        }
    }

    /// Ring buffer sizes implied by the window spans and the interval
    pub fn window_capacities(&self) -> Result<WindowCapacities, ConfigError> {
        let capacities = WindowCapacities::from_spans(self.pipeline().interval, self.window_spans())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        capacities
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(capacities)
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            publish_capacity: self.broker.publish_capacity,
            subscriber_capacity: self.broker.subscriber_capacity,
            max_subscribers: self.broker.max_subscribers,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.api.host.clone(),
            port: self.api.port,
            static_dir: PathBuf::from(&self.api.static_dir),
            keep_alive: Duration::from_secs(self.api.keep_alive_secs.max(1)),
        }
    }

    pub fn wiki_config(&self) -> WikiConfig {
        let defaults = WikiConfig::default();
        WikiConfig {
            api_url: self.wiki.api_url.clone(),
            request_timeout: Duration::from_secs(self.wiki.request_timeout_secs),
            user_agent: self.wiki.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    /// Judge settings, or `None` when disabled or no API key is set.
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        if !self.judge.enabled {
            return None;
        }
        let api_key = self.judge.api_key.clone().filter(|k| !k.is_empty())?;
        Some(GeminiConfig {
            base_url: self.judge.base_url.clone(),
            model: self.judge.model.clone(),
            api_key,
            max_output_tokens: self.judge.max_output_tokens,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# widiff Configuration
#
# Environment variables override these settings:
# - WIDIFF_INTERVAL_SECS
# - WIDIFF_CYCLE_DEADLINE_SECS
# - WIDIFF_JUDGE_TIMEOUT_SECS
# - WIDIFF_LOOKBACK_SECS
# - WIDIFF_WINDOW_SHORT_SECS
# - WIDIFF_WINDOW_MEDIUM_SECS
# - WIDIFF_WINDOW_LONG_SECS
# - WIDIFF_API_HOST
# - WIDIFF_API_PORT
# - WIDIFF_STATIC_DIR
# - WIDIFF_WIKI_API_URL
# - WIDIFF_JUDGE_MODEL
# - WIDIFF_LOG_LEVEL
# - WIDIFF_LOG_FORMAT
# - GEMINI_API_KEY

[feed]
# Seconds between refresh cycles
interval_secs = 60

# Budget for fetching and reviewing one change (seconds)
cycle_deadline_secs = 30

# Budget for the review alone; on expiry the change is kept without one
judge_timeout_secs = 20

# How far back each fetch looks for changes (seconds)
lookback_secs = 70

[feed.windows]
# Span of the minute, hour and day windows (seconds)
short_secs = 60
medium_secs = 3600
long_secs = 86400

[broker]
# Reports waiting to be fanned out
publish_capacity = 64

# Reports buffered per client before the oldest is dropped
subscriber_capacity = 16

# Maximum concurrent /notify clients
max_subscribers = 1000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Directory served under /view
static_dir = "./static"

# Seconds between SSE keep-alive comments
keep_alive_secs = 15

[wiki]
# MediaWiki action API endpoint
api_url = "https://en.wikipedia.org/w/api.php"

# Per-request timeout (seconds)
request_timeout_secs = 10

# user_agent = "widiff/0.1 (you@example.org)"

[judge]
# Review each change with Gemini (requires GEMINI_API_KEY)
enabled = true
base_url = "https://generativelanguage.googleapis.com"
model = "gemini-2.0-flash"
max_output_tokens = 100

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.feed.interval_secs, 60);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.judge.model, "gemini-2.0-flash");
        assert!(config.validate().is_ok());

        let capacities = config.window_capacities().unwrap();
        assert_eq!(capacities, WindowCapacities::new(1, 60, 1440));
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.feed.lookback_secs, defaults.feed.lookback_secs);
        assert_eq!(config.feed.windows.long_secs, defaults.feed.windows.long_secs);
        assert_eq!(config.broker.max_subscribers, defaults.broker.max_subscribers);
        assert_eq!(config.api.static_dir, defaults.api.static_dir);
        assert_eq!(config.wiki.api_url, defaults.wiki.api_url);
        assert_eq!(config.logging.format, defaults.logging.format);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[feed]\ninterval_secs = 30\n\n[api]\nport = 9000\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.feed.interval_secs, 30);
        assert_eq!(config.feed.cycle_deadline_secs, 30);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.logging.format, "json");

        // Halving the interval doubles every ring buffer
        assert_eq!(
            config.window_capacities().unwrap(),
            WindowCapacities::new(2, 120, 2880)
        );
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            Config::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[feed\ninterval_secs = ").unwrap();
        assert!(matches!(
            Config::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
        assert!(Config::resolve(Some(&broken)).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("WIDIFF_API_PORT", "9999"),
            ("WIDIFF_INTERVAL_SECS", "not-a-number"),
            ("WIDIFF_LOG_LEVEL", "debug"),
            ("GEMINI_API_KEY", "secret"),
        ]));

        assert_eq!(config.api.port, 9999);
        assert_eq!(config.feed.interval_secs, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.judge.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_env_overrides_feed_spans() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("WIDIFF_LOOKBACK_SECS", "90"),
            ("WIDIFF_WINDOW_SHORT_SECS", "120"),
            ("WIDIFF_WINDOW_MEDIUM_SECS", "7200"),
            ("WIDIFF_WINDOW_LONG_SECS", "172800"),
        ]));

        assert_eq!(config.pipeline().lookback, Duration::from_secs(90));
        assert_eq!(
            config.window_capacities().unwrap(),
            WindowCapacities::new(2, 120, 2880)
        );
        assert!(generate_default_config().contains("WIDIFF_LOOKBACK_SECS"));
    }

    #[test]
    fn test_gemini_config_requires_key_and_enabled() {
        let mut config = Config::default();
        assert!(config.gemini_config().is_none());

        config.judge.api_key = Some("secret".into());
        let gemini = config.gemini_config().unwrap();
        assert_eq!(gemini.api_key, "secret");
        assert_eq!(gemini.max_output_tokens, 100);

        config.judge.enabled = false;
        assert!(config.gemini_config().is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.feed.interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.feed.windows.long_secs = 1800;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.broker.subscriber_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.broker.max_subscribers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        // Only a warning
        let mut config = Config::default();
        config.feed.judge_timeout_secs = config.feed.cycle_deadline_secs;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_conversions() {
        let config = Config::default();
        let pipeline = config.pipeline();
        assert_eq!(pipeline.interval, Duration::from_secs(60));
        assert_eq!(pipeline.lookback, Duration::from_secs(70));

        let server = config.server_config();
        assert_eq!(server.addr(), "0.0.0.0:8080");
        assert_eq!(server.static_dir, PathBuf::from("./static"));

        let wiki = config.wiki_config();
        assert!(wiki.user_agent.starts_with("widiff/"));
        assert_eq!(wiki.request_timeout, Duration::from_secs(10));

        assert_eq!(config.broker_config().subscriber_capacity, 16);
    }
}
