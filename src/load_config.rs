use crate::config::UserConfig;
use crate::contract::{ConfigError, ConfigStore};
use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Env var consulted when `gist.access_token` is empty.
pub const GIST_TOKEN_ENV: &str = "GIST_ACCESS_TOKEN";

/// Prefix of the env var consulted when a WebDAV password is empty; the
/// account's index in the `webdav` list is appended.
pub const WEBDAV_PASSWORD_ENV_PREFIX: &str = "WEBDAV_PASSWORD_";

/// Loads the YAML config file and injects secrets that were left empty from
/// the environment. Returns the merged UserConfig or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UserConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config: UserConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    inject_secrets(&mut config);
    config.trace_loaded();
    Ok(config)
}

fn inject_secrets(config: &mut UserConfig) {
    if let Some(gist) = config.gist.as_mut().filter(|g| g.access_token.is_empty()) {
        match std::env::var(GIST_TOKEN_ENV) {
            Ok(token) => {
                info!(token_len = token.len(), "{GIST_TOKEN_ENV} found in env");
                gist.access_token = token;
            }
            Err(_) => info!("{GIST_TOKEN_ENV} not set, Gist access token stays empty"),
        }
    }

    for (index, account) in config.webdav.iter_mut().enumerate() {
        if !account.password.is_empty() {
            continue;
        }
        let var = format!("{WEBDAV_PASSWORD_ENV_PREFIX}{index}");
        if let Ok(password) = std::env::var(&var) {
            info!(var = %var, "WebDAV password found in env");
            account.password = password;
        }
    }
}

/// Clears secrets that came from the environment so they are not persisted.
fn strip_env_secrets(config: &mut UserConfig) {
    if let Some(gist) = config.gist.as_mut() {
        if std::env::var(GIST_TOKEN_ENV).is_ok_and(|token| token == gist.access_token) {
            gist.access_token.clear();
        }
    }
    for (index, account) in config.webdav.iter_mut().enumerate() {
        let var = format!("{WEBDAV_PASSWORD_ENV_PREFIX}{index}");
        if std::env::var(&var).is_ok_and(|password| password == account.password) {
            account.password.clear();
        }
    }
}

/// [`ConfigStore`] over a YAML file. `load` goes through [`load_config`], so
/// env secrets are merged in; `save` writes the config back without them.
#[derive(Debug, Clone)]
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for YamlConfigStore {
    async fn load(&self) -> Result<UserConfig, ConfigError> {
        load_config(&self.path).map_err(|e| e.into())
    }

    async fn save(&self, config: &UserConfig) -> Result<(), ConfigError> {
        let mut config = config.clone();
        strip_env_secrets(&mut config);
        let yaml = serde_yaml::to_string(&config)?;
        tokio::fs::write(&self.path, yaml).await.map_err(|e| {
            error!(error = ?e, config_path = ?self.path, "Failed to write config file");
            e
        })?;
        info!(config_path = ?self.path, "Config file written");
        Ok(())
    }
}
