use crate::config::{Config, ConfigError, ConfigResult};
use log::info;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Loads, validates and saves the config file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config from `path`, creating it with defaults when missing.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let mut config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        // SPRIG_API_URL wins over the file for quick local testing.
        if let Ok(url) = std::env::var("SPRIG_API_URL") {
            config.api.base_url = url;
        }

        Self::validate(&config)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Load from the default location (`~/.sprig/config.json`).
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))?;
        Ok(home.join(".sprig").join("config.json"))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the current config back to its file.
    pub async fn save(&self) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&self.config)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    pub fn validate(config: &Config) -> ConfigResult<()> {
        if !config.api.base_url.starts_with("http://") && !config.api.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                config.api.base_url
            )));
        }

        if config.api.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if config.identity.client_id.is_empty() {
            return Err(ConfigError::Validation(
                "identity.client_id cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand `${VAR}` and `${VAR:-default}` references.
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = cap.get(0).unwrap().as_str();
            let var_expr = cap.get(1).unwrap().as_str();

            let (var_name, default_value) = if let Some(pos) = var_expr.find(":-") {
                let (name, rest) = var_expr.split_at(pos);
                (name, Some(&rest[2..]))
            } else {
                (var_expr, None)
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        return Err(ConfigError::EnvVarNotFound(var_name.to_string()));
                    }
                }
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_creates_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        assert!(config_path.exists());
        assert_eq!(manager.config().api.timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_env_var_expansion() {
        std::env::set_var("SPRIG_TEST_VAR", "test_value");

        let content = r#"{"key": "${SPRIG_TEST_VAR}"}"#;
        let expanded = ConfigManager::expand_env_vars(content).unwrap();
        assert!(expanded.contains("test_value"));

        let with_default = r#"{"key": "${SPRIG_UNSET_VAR:-fallback}"}"#;
        let expanded = ConfigManager::expand_env_vars(with_default).unwrap();
        assert!(expanded.contains("fallback"));
    }

    #[tokio::test]
    async fn test_config_validation() {
        let mut config = Config::default();
        config.api.base_url = "not-a-url".to_string();
        assert!(ConfigManager::validate(&config).is_err());

        config.api.base_url = "https://tasks.example.com".to_string();
        assert!(ConfigManager::validate(&config).is_ok());

        config.api.timeout_seconds = 0;
        assert!(ConfigManager::validate(&config).is_err());
    }
}
