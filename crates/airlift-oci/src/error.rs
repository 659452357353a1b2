//! Registry and package source error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OciError {
    #[error("Invalid package reference: {reference} - {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Published package for {url} does not exist: {message}")]
    RootNotFound { url: String, message: String },

    #[error("Layer {path} not found in the package manifest")]
    LayerNotFound { path: String },

    #[error("Image {image} not found in the package image index")]
    ImageNotFound { image: String },

    #[error("Component {name} does not exist in this package")]
    ComponentNotFound { name: String },

    #[error("Registry error: {message}")]
    Registry { message: String },

    #[error("Unknown package source: {location}")]
    UnknownSource { location: String },

    #[error("HTTP error while fetching {url}: {message}")]
    Http { url: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] airlift_core::CoreError),

    #[error(transparent)]
    Compose(#[from] airlift_compose::ComposeError),
}

pub type Result<T> = std::result::Result<T, OciError>;

impl From<oci_distribution::errors::OciDistributionError> for OciError {
    fn from(e: oci_distribution::errors::OciDistributionError) -> Self {
        OciError::Registry {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for OciError {
    fn from(e: serde_json::Error) -> Self {
        OciError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for OciError {
    fn from(e: serde_yaml::Error) -> Self {
        OciError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for OciError {
    fn from(e: reqwest::Error) -> Self {
        OciError::Http {
            url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            message: e.to_string(),
        }
    }
}
