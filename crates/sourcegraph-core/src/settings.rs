use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;
use sourcegraph_client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_CLIENT_ID};
use thiserror::Error;
use tracing::debug;

use crate::context::ResolverConfig;

pub const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// User-tunable behaviour, read from an optional TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    pub base_url: String,
    pub client_id: String,
    /// Language sent with every assist request.
    pub language: String,
    pub default_libs: String,
    pub manifest_name: String,
    pub manifest_command: Vec<String>,
    pub fallback_command: Vec<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        let resolver = ResolverConfig::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            language: "ruby".to_string(),
            default_libs: resolver.default_libs,
            manifest_name: resolver.manifest_name,
            manifest_command: resolver.manifest_command,
            fallback_command: client.fallback_command,
            user_agent: None,
            timeout_secs: None,
        }
    }
}

impl PluginSettings {
    /// Location of the per-user settings file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "Sourcegraph", "sourcegraph-assist")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE_NAME))
    }

    /// Loads settings from `path`, which must exist, or from the per-user
    /// file when `path` is `None`, which may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(default) = Self::default_path() {
                    debug!(target: "sourcegraph_settings", path = %default.display(), "looking for settings");
                    builder = builder.add_source(
                        File::from(default)
                            .format(FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(SettingsError::Invalid {
                key: "base_url",
                message: format!("expected an http(s) URL, got `{}`", self.base_url),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "client_id",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            base_url: self.base_url.clone(),
            client_id: self.client_id.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout: self.timeout_secs.map(Duration::from_secs),
            fallback_command: self.fallback_command.clone(),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            manifest_name: self.manifest_name.clone(),
            manifest_command: self.manifest_command.clone(),
            default_libs: self.default_libs.clone(),
        }
    }
}
