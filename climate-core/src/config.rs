use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const ENV_API_KEY: &str = "CLIMATE_API_KEY";
const ENV_API_URL: &str = "CLIMATE_API_URL";
const ENV_DB_PATH: &str = "CLIMATE_DB_PATH";
const ENV_BIND: &str = "CLIMATE_BIND";

/// Settings the weather fetcher is constructed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: base_url.into() }
    }
}

/// Provider section as stored on disk; the key may still be missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Budget for one ingestion, covering the provider call and the store write.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSection {
    /// Database file; falls back to the platform data directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [provider]
/// api_key = "..."
/// base_url = "https://api.openweathermap.org/data/2.5/weather"
///
/// [store]
/// path = "/var/lib/climate/observations.db"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub server: ServerSection,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Config {
    /// Load config from the default location, or defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::read_or_default(&path)?;
        cfg.apply_env_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Load config from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
        let mut cfg = Self::read_or_default(path)?;
        cfg.apply_env_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    fn read_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.provider.base_url = url;
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
            self.server.bind = bind;
        }
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "climate", "climate")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Database file to open: the configured one or the platform default.
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("observations.db")),
        }
    }

    /// Settings for the fetcher; fails when no API key is configured.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let api_key = self.provider.api_key.as_deref().filter(|k| !k.is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured for the weather provider.\n\
                 Hint: run `climate configure` or set {ENV_API_KEY}."
            )
        })?;

        Ok(ProviderConfig::new(api_key, self.provider.base_url.clone()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    /// Convenience helper: set/replace the provider API key and base URL.
    pub fn set_provider(&mut self, api_key: String, base_url: Option<String>) {
        self.provider.api_key = Some(api_key);
        if let Some(url) = base_url {
            self.provider.base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn provider_config_errors_when_key_missing() {
        let cfg = Config::default();
        let err = cfg.provider_config().unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured"));
        assert!(msg.contains("Hint: run `climate configure`"));
    }

    #[test]
    fn defaults_point_at_openweather() {
        let cfg = Config::default();

        assert_eq!(cfg.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.server.bind, DEFAULT_BIND);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn set_provider_keeps_base_url_unless_given() {
        let mut cfg = Config::default();

        cfg.set_provider("KEY".into(), None);
        let provider = cfg.provider_config().expect("key must be set");
        assert_eq!(provider, ProviderConfig::new("KEY", DEFAULT_BASE_URL));

        cfg.set_provider("OTHER".into(), Some("http://localhost:9000/weather".into()));
        let provider = cfg.provider_config().expect("key must be set");
        assert_eq!(provider.api_key, "OTHER");
        assert_eq!(provider.base_url, "http://localhost:9000/weather");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [provider]
            api_key = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.provider.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.provider.timeout_secs, 10);
        assert!(cfg.store.path.is_none());
        assert_eq!(cfg.server.bind, DEFAULT_BIND);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut cfg: Config = toml::from_str(
            r#"
            [provider]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "from-env"),
            (ENV_API_URL, "http://example.test/weather"),
            (ENV_DB_PATH, "/tmp/obs.db"),
            (ENV_BIND, ""),
        ]);
        cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.provider.api_key.as_deref(), Some("from-env"));
        assert_eq!(cfg.provider.base_url, "http://example.test/weather");
        assert_eq!(cfg.store.path, Some(PathBuf::from("/tmp/obs.db")));
        // Empty values are ignored.
        assert_eq!(cfg.server.bind, DEFAULT_BIND);
    }

    #[test]
    fn save_and_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_provider("SAVED".into(), None);
        cfg.store.path = Some(dir.path().join("obs.db"));
        cfg.save_to(&path).unwrap();

        let loaded = Config::read_or_default(&path).unwrap();
        assert_eq!(loaded.provider.api_key.as_deref(), Some("SAVED"));
        assert_eq!(loaded.store.path, Some(dir.path().join("obs.db")));
    }

    #[test]
    fn load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
