use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("mlproj"))
}

// ============================================================================
// User Config
// ============================================================================

/// User-level defaults, from `~/.config/mlproj/config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    /// Default values of user parameters
    pub params: BTreeMap<String, String>,
    pub connect: ConnectDefaults,
    pub http: HttpConfig,
}

/// Default connection parameters
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectDefaults {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub restart_timeout_secs: u64,
    pub restart_poll_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            restart_timeout_secs: 120,
            restart_poll_ms: 1000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    pub fn restart_poll(&self) -> Duration {
        Duration::from_millis(self.restart_poll_ms)
    }
}

impl UserConfig {
    /// Load the user config, defaults if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no user config at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parameter defaults, connection defaults under their `@` names
    pub fn defaults(&self) -> BTreeMap<String, String> {
        let mut defaults = self.params.clone();
        let connect = [
            ("@host", &self.connect.host),
            ("@user", &self.connect.user),
            ("@password", &self.connect.password),
        ];
        for (key, value) in connect {
            if let Some(value) = value {
                defaults.insert(key.to_string(), value.clone());
            }
        }
        defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.params.is_empty());
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_defaults_include_connection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[params]
port = "7010"

[connect]
user = "admin"

[http]
restart_poll_ms = 250
"#,
        )
        .unwrap();
        let config = UserConfig::load_from(&path).unwrap();
        let defaults = config.defaults();
        assert_eq!(defaults["port"], "7010");
        assert_eq!(defaults["@user"], "admin");
        assert!(!defaults.contains_key("@host"));
        assert_eq!(config.http.restart_poll(), Duration::from_millis(250));
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[connect]\nhots = \"x\"\n").unwrap();
        assert!(UserConfig::load_from(&path).is_err());
    }
}
