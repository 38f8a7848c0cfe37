#![forbid(unsafe_code)]

pub mod assets;
pub mod content_type;
pub mod errors;
pub mod identity;
pub mod manifest;
pub mod metadata;
pub mod traits;

pub use assets::{CaptureTime, MediaAsset, Movie, Photo, SignableAsset};
pub use content_type::ContentType;
pub use errors::{EmbedError, MetadataError, SignError};
pub use identity::{SigningAlg, SigningIdentity};
pub use manifest::{ManifestBuilder, ManifestDescription};
pub use metadata::MetadataResolver;
pub use traits::Embedder;
