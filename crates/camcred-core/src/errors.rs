use std::io;
use std::path::PathBuf;

/// Why a manifest could not be derived for an asset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("content type could not be detected")]
    UndetectableType,
    #[error("capture timestamp unavailable")]
    MissingTimestamp,
    #[error("content type {0} has no registered MIME type or extension")]
    NoFormatMapping(String),
}

/// Failures reported by an [`Embedder`](crate::traits::Embedder).
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("signing identity invalid: {0}")]
    IdentityInvalid(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("internal embedder failure: {0}")]
    Internal(String),
}

/// Every way a signing call can fall back to the original asset.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(#[from] MetadataError),
    #[error("scratch area unavailable at {path}: {source}")]
    ScratchUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("embed failed: {0}")]
    Embed(#[from] EmbedError),
    #[error("cannot read back {path}: {source}")]
    Readback {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("embedder output rejected: {0}")]
    InvalidOutput(String),
}

impl SignError {
    /// Pipeline stage the error originated in, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            SignError::MetadataUnavailable(_) => "metadata",
            SignError::ScratchUnavailable { .. } => "scratch",
            SignError::Embed(_) => "embed",
            SignError::Readback { .. } => "readback",
            SignError::InvalidOutput(_) => "validate",
        }
    }
}
