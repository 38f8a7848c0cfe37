use crate::assets::{ReadSeek, ReadWriteSeek};
use crate::errors::EmbedError;
use crate::identity::SigningIdentity;
use crate::manifest::ManifestDescription;

/// Streams `source` into `destination` with `manifest` embedded and signed.
///
/// Called synchronously; implementations may block on I/O. On error the
/// destination contents are unspecified and the caller discards them.
pub trait Embedder: Send + Sync {
    fn embed(
        &self,
        manifest: &ManifestDescription,
        source: &mut dyn ReadSeek,
        destination: &mut dyn ReadWriteSeek,
        identity: &SigningIdentity,
    ) -> Result<(), EmbedError>;
}
