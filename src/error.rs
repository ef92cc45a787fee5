//! Error types. Everything here is absorbed at the boundary where it happens
//! (manifest load, asset fetch, observer setup) and only ever logged.

use thiserror::Error;

/// Manifest could not be produced from its source (ManifestUnavailable).
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest transport error: {0}")]
    Transport(String),
    #[error("manifest request failed with status {0}")]
    Status(u16),
    #[error("manifest io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed manifest: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("manifest has no images")]
    Empty,
    #[error("duplicate identifier {0} in manifest")]
    DuplicateId(String),
}

/// A full-resolution asset fetch failed (AssetLoadFailed).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("status {0}")]
    Status(u16),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// The host has no proximity-detection mechanism.
#[derive(Debug, Error)]
#[error("viewport proximity observation is not supported by this host")]
pub struct ObserverUnsupported;
