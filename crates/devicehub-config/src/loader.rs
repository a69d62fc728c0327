use std::path::{Path, PathBuf};

use devicehub_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const CONFIG_DIR_NAME: &str = ".devicehub";
const CONFIG_FILE_NAME: &str = "config.yml";

/// Locates and parses `config.yml`.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Loader rooted at `~/.devicehub`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("could not determine home directory".into()))?;
        Ok(Self {
            config_dir: home.join(CONFIG_DIR_NAME),
        })
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn default_config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Load the default config file, falling back to defaults when absent.
    pub fn load(&self) -> Result<AppConfig> {
        self.load_from(&self.default_config_path())
    }

    pub fn load_from(&self, path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }

        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(AppConfig::default());
        }

        let config: AppConfig = serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }
}
