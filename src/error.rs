//! Error types for the battle-map core.
//!
//! Errors that travel through shared futures (`ready`, texture loads) are
//! `Clone`, so every waiter observes the same value.

use thiserror::Error;

pub use crate::color::ColorError;

/// Failures reported by a [`Host`](crate::render::Host) or its surfaces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("render surface unavailable: {0}")]
    Unavailable(String),

    #[error("failed to attach surface: {0}")]
    Attach(String),

    #[error("failed to detach surface: {0}")]
    Detach(String),

    #[error("render surface lost: {0}")]
    Lost(String),
}

/// Construction and lifecycle failures of an [`Adapter`](crate::adapter::Adapter).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("invalid host container: {0}")]
    InvalidContainer(String),

    #[error("invalid adapter options: {0}")]
    InvalidOptions(#[from] ConfigError),

    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("adapter destroyed")]
    Destroyed,
}

/// Texture fetch or decode failures. The cache evicts the url on either.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Configuration parsing and validation failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse options: {0}")]
    Parse(String),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
