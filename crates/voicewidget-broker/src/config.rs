//! Broker configuration loading from file and environment variables.

use crate::upstream::DEFAULT_API_BASE;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level broker configuration. Read once at startup and never mutated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Voice provider credentials and mock mode.
    #[serde(default)]
    pub retell: RetellConfig,

    /// Static widget assets.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Credentials for the upstream voice provider.
#[derive(Clone, Deserialize)]
pub struct RetellConfig {
    /// Server-held API key. Never sent to the browser.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Agent that answers web calls.
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Provider API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Serve a fixed mock token instead of calling the provider.
    #[serde(default)]
    pub use_mock_token: bool,
}

/// Where the widget's static files live.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory with `index.html` and the widget script. Unknown paths
    /// fall back to its `index.html`.
    #[serde(default = "default_public_dir")]
    pub public_dir: String,

    /// Directory with the voice SDK bundle, mounted at `/sdk`.
    #[serde(default)]
    pub sdk_dir: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "voicewidget_broker=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RetellConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            agent_id: None,
            api_base: default_api_base(),
            use_mock_token: false,
        }
    }
}

impl fmt::Debug for RetellConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetellConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("agent_id", &self.agent_id)
            .field("api_base", &self.api_base)
            .field("use_mock_token", &self.use_mock_token)
            .finish()
    }
}

impl RetellConfig {
    /// The API key, if configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|v| !v.is_empty())
    }

    /// The agent id, if configured and non-empty.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref().filter(|v| !v.is_empty())
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            sdk_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Environment variables holding the API key, first non-empty wins.
const API_KEY_VARS: [&str; 3] = ["RETELL_API_KEY", "RETELL_API_TOKEN", "RETELL_KEY"];

/// Environment variables holding the agent id, first non-empty wins.
const AGENT_ID_VARS: [&str; 3] = ["RETELL_AGENT_ID", "AGENT_ID", "RETELL_AGENT"];

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides from the process environment.
///
/// Environment variable overrides:
/// - `VOICEWIDGET_HOST` overrides `server.host`
/// - `PORT` overrides `server.port`
/// - `RETELL_API_KEY` / `RETELL_API_TOKEN` / `RETELL_KEY` override `retell.api_key`
/// - `RETELL_AGENT_ID` / `AGENT_ID` / `RETELL_AGENT` override `retell.agent_id`
/// - `RETELL_API_BASE` overrides `retell.api_base`
/// - `USE_MOCK_TOKEN` overrides `retell.use_mock_token` ("true", any case, enables)
/// - `VOICEWIDGET_PUBLIC_DIR` overrides `assets.public_dir`
/// - `VOICEWIDGET_SDK_DIR` overrides `assets.sdk_dir`
/// - `VOICEWIDGET_LOG_LEVEL` overrides `logging.level`
/// - `VOICEWIDGET_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env<F>(path: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, env);
    Ok(config)
}

/// First variable among `names` that is set and non-empty.
fn first_set<F>(env: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| env(name).filter(|v| !v.is_empty()))
}

fn apply_env_overrides<F>(config: &mut Config, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env("VOICEWIDGET_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(api_key) = first_set(&env, &API_KEY_VARS) {
        config.retell.api_key = Some(api_key);
    }
    if let Some(agent_id) = first_set(&env, &AGENT_ID_VARS) {
        config.retell.agent_id = Some(agent_id);
    }
    if let Some(api_base) = first_set(&env, &["RETELL_API_BASE"]) {
        config.retell.api_base = api_base;
    }
    if let Some(mock) = env("USE_MOCK_TOKEN") {
        config.retell.use_mock_token = mock.eq_ignore_ascii_case("true");
    }
    if let Some(dir) = first_set(&env, &["VOICEWIDGET_PUBLIC_DIR"]) {
        config.assets.public_dir = dir;
    }
    if let Some(dir) = first_set(&env, &["VOICEWIDGET_SDK_DIR"]) {
        config.assets.sdk_dir = Some(dir);
    }
    if let Some(level) = env("VOICEWIDGET_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("VOICEWIDGET_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = load_config_with_env(None, env_of(&[])).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.retell.api_base, "https://api.retellai.com");
        assert!(!config.retell.use_mock_token);
        assert!(config.retell.api_key().is_none());
        assert!(config.retell.agent_id().is_none());
        assert_eq!(config.assets.public_dir, "public");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config_with_env(path.to_str(), env_of(&[])).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[retell]
api_key = "key_file"
agent_id = "agent_file"
api_base = "http://localhost:9000"

[assets]
sdk_dir = "node_modules/retell-client-js-sdk/dist"

[logging]
json = true
"#
        )
        .unwrap();

        let config = load_config_with_env(file.path().to_str(), env_of(&[])).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.retell.api_key(), Some("key_file"));
        assert_eq!(config.retell.agent_id(), Some("agent_file"));
        assert_eq!(config.retell.api_base, "http://localhost:9000");
        assert_eq!(
            config.assets.sdk_dir.as_deref(),
            Some("node_modules/retell-client-js-sdk/dist")
        );
        assert!(config.logging.json);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let result = load_config_with_env(file.path().to_str(), env_of(&[]));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retell]\napi_key = \"key_file\"").unwrap();

        let env = env_of(&[("RETELL_API_KEY", "key_env"), ("PORT", "4100")]);
        let config = load_config_with_env(file.path().to_str(), env).unwrap();
        assert_eq!(config.retell.api_key(), Some("key_env"));
        assert_eq!(config.server.port, 4100);
    }

    #[test]
    fn credential_aliases_apply_in_order() {
        let env = env_of(&[
            ("RETELL_API_KEY", ""),
            ("RETELL_API_TOKEN", "token_alias"),
            ("RETELL_KEY", "key_alias"),
            ("RETELL_AGENT", "agent_last"),
            ("AGENT_ID", "agent_middle"),
        ]);
        let config = load_config_with_env(None, env).unwrap();
        assert_eq!(config.retell.api_key(), Some("token_alias"));
        assert_eq!(config.retell.agent_id(), Some("agent_middle"));
    }

    #[test]
    fn mock_flag_is_case_insensitive() {
        for (value, expected) in [("true", true), ("TRUE", true), ("True", true), ("1", false), ("no", false)] {
            let config = load_config_with_env(None, env_of(&[("USE_MOCK_TOKEN", value)])).unwrap();
            assert_eq!(config.retell.use_mock_token, expected, "USE_MOCK_TOKEN={value}");
        }
    }

    #[test]
    fn invalid_port_keeps_previous_value() {
        let config = load_config_with_env(None, env_of(&[("PORT", "not-a-port")])).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = load_config_with_env(None, env_of(&[("RETELL_API_KEY", "key_secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("key_secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
