use crate::config::dashboard::DashboardConfig;
use crate::config::sources::SourcesConfig;
use crate::config::{LoggingConfig, ServerConfig};
use crate::error::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub symbol: String,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sources: SourcesConfig,
    pub dashboard: DashboardConfig,
    pub settings_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            symbol: crate::DEFAULT_SYMBOL.to_string(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            sources: SourcesConfig::default(),
            dashboard: DashboardConfig::default(),
            settings_path: None,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        Self::load_from("config", env)
    }

    pub fn load_from(dir: &str, env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", dir, env)).required(false))
            .add_source(Environment::with_prefix("WHALEPULSE").separator("__"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))
    }
}
