use thiserror::Error;

use crate::common::error::ClusterWatchError::GenericError;

#[derive(Debug, Error)]
pub enum ClusterWatchError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<serde_json::error::Error> for ClusterWatchError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for ClusterWatchError {
    fn from(error: toml::de::Error) -> Self {
        Self::DeserializationError(error.to_string())
    }
}

impl From<anyhow::Error> for ClusterWatchError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(format!("{error:?}"))
    }
}

impl From<String> for ClusterWatchError {
    fn from(e: String) -> Self {
        GenericError(e)
    }
}

pub fn config_error<T>(message: impl Into<String>) -> crate::Result<T> {
    Err(ClusterWatchError::ConfigError(message.into()))
}
