use crate::stats::DayBucketing;
use crate::storage::resolve_data_path;
use std::{env, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_DAY_BUCKETING: {0}")]
    Bucketing(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub bucketing: DayBucketing,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        let bucketing = match env::var("APP_DAY_BUCKETING") {
            Ok(value) => value.parse().map_err(ConfigError::Bucketing)?,
            Err(_) => DayBucketing::default(),
        };

        Ok(Self {
            port,
            data_path: resolve_data_path(),
            bucketing,
        })
    }
}
