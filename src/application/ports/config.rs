//! Configuration persistence port

use std::path::Path;

use async_trait::async_trait;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Where the user's [`AppConfig`] lives between runs
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Location of the backing file
    fn path(&self) -> &Path;

    /// Stored settings; a store that was never written yields [`AppConfig::empty`]
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Replace the stored settings with `config`
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Seed the store with [`AppConfig::defaults`]; never overwrites.
    async fn init(&self) -> Result<AppConfig, ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(self.path().to_path_buf()));
        }
        let defaults = AppConfig::defaults();
        self.save(&defaults).await?;
        Ok(defaults)
    }
}
