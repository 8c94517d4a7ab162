use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("security material unavailable: {0}")]
    Security(String),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Payment(#[from] crate::payment::PaymentError),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}
