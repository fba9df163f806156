//! Configuration file management for nutricoach.
//!
//! Provides a TOML-based config file at `~/.config/nutricoach/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use nutricoach_core::llm::{AnthropicClient, DEFAULT_BASE_URL, LlmError};
use nutricoach_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub model: ModelSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the nutricoach config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/nutricoach` or
/// `~/.config/nutricoach`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("nutricoach");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nutricoach")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file may hold an API key, so it is made owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Language-model connection settings after resolution.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ModelConfig {
    /// Build the HTTP client. Fails with [`LlmError::MissingApiKey`] when no
    /// key was configured anywhere.
    pub fn client(&self) -> Result<AnthropicClient, LlmError> {
        let key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        AnthropicClient::new(key, self.base_url.clone())
    }
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct NutricoachConfig {
    pub db_config: DbConfig,
    pub model: ModelConfig,
}

impl NutricoachConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `NUTRICOACH_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - API key: `ANTHROPIC_API_KEY` > `model.api_key` > none
    /// - Base URL: `ANTHROPIC_BASE_URL` > `model.base_url` > the public API
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var("NUTRICOACH_DATABASE_URL") {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let mut db_config = DbConfig::from_env();
        db_config.database_url = db_url;

        let file_model = file_config.as_ref().map(|c| &c.model);
        let api_key = non_empty_env("ANTHROPIC_API_KEY")
            .or_else(|| file_model.and_then(|m| m.api_key.clone()))
            .filter(|k| !k.trim().is_empty());
        let base_url = non_empty_env("ANTHROPIC_BASE_URL")
            .or_else(|| file_model.and_then(|m| m.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            db_config,
            model: ModelConfig { api_key, base_url },
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point the config directory at an empty temp dir for the duration of
    /// `f`, restoring the previous value afterwards.
    fn with_empty_config_dir<T>(f: impl FnOnce() -> T) -> T {
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        let out = f();
        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
        out
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_string(),
            },
            model: ModelSection {
                api_key: Some("sk-test".to_string()),
                base_url: None,
            },
        };

        let (loaded, mode) = with_empty_config_dir(|| {
            save_config(&original).unwrap();
            let mode = {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::metadata(config_path()).unwrap().permissions().mode() & 0o777
                }
                #[cfg(not(unix))]
                {
                    0o600
                }
            };
            (load_config().unwrap(), mode)
        });

        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.model.base_url, None);
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn model_section_is_optional() {
        let cfg: ConfigFile = toml::from_str("[database]\nurl = \"postgresql://h/db\"\n").unwrap();
        assert!(cfg.model.api_key.is_none());
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        unsafe { std::env::set_var("NUTRICOACH_DATABASE_URL", "postgresql://env:5432/envdb") };

        let config = NutricoachConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        unsafe { std::env::remove_var("NUTRICOACH_DATABASE_URL") };
    }

    #[test]
    fn resolve_env_overrides_config_file() {
        let _lock = lock_env();

        let config = with_empty_config_dir(|| {
            save_config(&ConfigFile {
                database: DatabaseSection {
                    url: "postgresql://file:5432/filedb".to_string(),
                },
                model: ModelSection {
                    api_key: Some("sk-file".to_string()),
                    base_url: Some("http://file.local".to_string()),
                },
            })
            .unwrap();
            unsafe { std::env::set_var("NUTRICOACH_DATABASE_URL", "postgresql://env:5432/envdb") };
            unsafe { std::env::set_var("ANTHROPIC_API_KEY", "sk-env") };
            unsafe { std::env::remove_var("ANTHROPIC_BASE_URL") };
            let config = NutricoachConfig::resolve(None).unwrap();
            unsafe { std::env::remove_var("NUTRICOACH_DATABASE_URL") };
            unsafe { std::env::remove_var("ANTHROPIC_API_KEY") };
            config
        });

        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.model.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.model.base_url, "http://file.local");
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        unsafe { std::env::remove_var("NUTRICOACH_DATABASE_URL") };
        unsafe { std::env::remove_var("ANTHROPIC_API_KEY") };
        unsafe { std::env::remove_var("ANTHROPIC_BASE_URL") };

        let config = with_empty_config_dir(|| NutricoachConfig::resolve(None).unwrap());
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.model.base_url, DEFAULT_BASE_URL);
        assert!(matches!(config.model.client(), Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("nutricoach/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
