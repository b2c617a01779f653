//! Error types for overlays, legends and annotation ingestion.

use thiserror::Error;

/// Errors produced by the layer registry and the active layer controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    #[error("unsupported layer protocol '{protocol}' for layer {id}")]
    UnsupportedProtocol { id: String, protocol: String },

    #[error("invalid endpoint '{url}' for layer {id}: {reason}")]
    InvalidEndpoint { id: String, url: String, reason: String },

    #[error("layer not found: {0}")]
    NotFound(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),
}

/// Why a single legend candidate was rejected. Never surfaced to the user,
/// the cascade moves on to the next candidate.
#[derive(Error, Debug)]
pub enum LegendFetchFailure {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("legend service answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("legend request timed out")]
    Timeout,

    #[error("legend image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("legend image is a {width}x{height} placeholder")]
    Degenerate { width: u32, height: u32 },
}

/// Terminal failure of an annotation ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("could not fetch annotation archive: {0}")]
    Fetch(String),

    #[error("could not open annotation archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("annotation archive contains no KML document")]
    NoMarkupDocument,

    #[error("annotation document is not valid KML: {0}")]
    Parse(String),

    #[error("annotation features could not be rendered: {0}")]
    Render(String),
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        IngestError::Fetch(e.to_string())
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Fetch(e.to_string())
    }
}

impl From<roxmltree::Error> for IngestError {
    fn from(e: roxmltree::Error) -> Self {
        IngestError::Parse(e.to_string())
    }
}

/// Malformed embedded or environment configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
