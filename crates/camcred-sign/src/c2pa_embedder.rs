use c2pa::{create_signer, Builder};
use camcred_core::assets::{ReadSeek, ReadWriteSeek};
use camcred_core::errors::EmbedError;
use camcred_core::identity::{SigningAlg, SigningIdentity};
use camcred_core::manifest::ManifestDescription;
use camcred_core::traits::Embedder;

/// Embeds a C2PA manifest store into the asset's native container.
#[derive(Debug, Clone, Copy, Default)]
pub struct C2paEmbedder;

impl Embedder for C2paEmbedder {
    fn embed(
        &self,
        manifest: &ManifestDescription,
        mut source: &mut dyn ReadSeek,
        mut destination: &mut dyn ReadWriteSeek,
        identity: &SigningIdentity,
    ) -> Result<(), EmbedError> {
        identity.ensure_usable()?;

        let json = manifest
            .to_json()
            .map_err(|e| EmbedError::Internal(format!("cannot serialize manifest: {e}")))?;
        let mut builder = Builder::from_json(&json).map_err(map_c2pa_error)?;

        let signer = create_signer::from_keys(
            identity.certificate_pem().as_bytes(),
            identity.private_key_pem().as_bytes(),
            c2pa_alg(identity.algorithm()),
            None,
        )
        .map_err(|e| EmbedError::IdentityInvalid(e.to_string()))?;

        builder
            .sign(signer.as_ref(), manifest.format(), &mut source, &mut destination)
            .map_err(map_c2pa_error)?;
        Ok(())
    }
}

fn c2pa_alg(alg: SigningAlg) -> c2pa::SigningAlg {
    match alg {
        SigningAlg::Es256 => c2pa::SigningAlg::Es256,
        SigningAlg::Es384 => c2pa::SigningAlg::Es384,
        SigningAlg::Es512 => c2pa::SigningAlg::Es512,
        SigningAlg::Ps256 => c2pa::SigningAlg::Ps256,
        SigningAlg::Ps384 => c2pa::SigningAlg::Ps384,
        SigningAlg::Ps512 => c2pa::SigningAlg::Ps512,
        SigningAlg::Ed25519 => c2pa::SigningAlg::Ed25519,
    }
}

fn map_c2pa_error(err: c2pa::Error) -> EmbedError {
    match err {
        c2pa::Error::UnsupportedType => EmbedError::UnsupportedFormat(err.to_string()),
        c2pa::Error::IoError(io) => EmbedError::Io(io),
        other => EmbedError::Internal(other.to_string()),
    }
}
