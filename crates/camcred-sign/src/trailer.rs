use std::io::{self, SeekFrom, Write};

use base64::Engine;
use camcred_core::assets::{ReadSeek, ReadWriteSeek};
use camcred_core::content_type::ContentType;
use camcred_core::errors::EmbedError;
use camcred_core::identity::{SigningAlg, SigningIdentity};
use camcred_core::manifest::ManifestDescription;
use camcred_core::traits::Embedder;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;

/// Marker closing every trailer.
pub const TRAILER_MAGIC: &[u8; 8] = b"CAMCRED1";

/// Container-agnostic embedder that appends a signed claim after the media.
///
/// Layout: original bytes, canonical claim JSON, claim length as a big-endian
/// `u64`, then [`TRAILER_MAGIC`]. The claim carries the manifest, the SHA-256
/// of the original bytes, the certificate, and an Ed25519 signature over the
/// canonical claim without its `signature` member.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailerEmbedder;

impl Embedder for TrailerEmbedder {
    fn embed(
        &self,
        manifest: &ManifestDescription,
        source: &mut dyn ReadSeek,
        destination: &mut dyn ReadWriteSeek,
        identity: &SigningIdentity,
    ) -> Result<(), EmbedError> {
        if ContentType::from_mime_type(manifest.format()).is_none() {
            return Err(EmbedError::UnsupportedFormat(manifest.format().to_string()));
        }
        let signing_key = load_signing_key(identity)?;

        source.seek(SeekFrom::Start(0))?;
        let mut hashing = HashingWriter::new(&mut *destination);
        io::copy(source, &mut hashing)?;
        let digest = hashing.finalize();

        let claim = build_claim(manifest, &digest, identity, &signing_key)?;
        destination.write_all(&claim)?;
        destination.write_all(&(claim.len() as u64).to_be_bytes())?;
        destination.write_all(TRAILER_MAGIC)?;
        destination.flush()?;

        tracing::debug!(
            title = manifest.title(),
            claim_len = claim.len(),
            "trailer claim written"
        );
        Ok(())
    }
}

fn load_signing_key(identity: &SigningIdentity) -> Result<SigningKey, EmbedError> {
    identity.ensure_usable()?;
    if identity.algorithm() != SigningAlg::Ed25519 {
        return Err(EmbedError::IdentityInvalid(format!(
            "trailer claims are signed with ed25519, identity uses {}",
            identity.algorithm()
        )));
    }

    let signing_key = SigningKey::from_pkcs8_pem(identity.private_key_pem())
        .map_err(|e| EmbedError::IdentityInvalid(format!("cannot parse private key: {e}")))?;
    let certified = VerifyingKey::from_public_key_pem(identity.certificate_pem())
        .map_err(|e| EmbedError::IdentityInvalid(format!("cannot parse certificate: {e}")))?;
    if certified != signing_key.verifying_key() {
        return Err(EmbedError::IdentityInvalid(
            "certificate does not match private key".into(),
        ));
    }
    Ok(signing_key)
}

fn build_claim(
    manifest: &ManifestDescription,
    digest: &[u8],
    identity: &SigningIdentity,
    signing_key: &SigningKey,
) -> Result<Vec<u8>, EmbedError> {
    let manifest_value = manifest
        .to_value()
        .map_err(|e| EmbedError::Internal(format!("cannot serialize manifest: {e}")))?;

    let digest_hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let mut claim = serde_json::json!({
        "manifest": manifest_value,
        "content_digest": format!("sha256:{digest_hex}"),
        "algorithm": SigningAlg::Ed25519,
        "certificate": identity.certificate_pem(),
        "signed_at": chrono::Utc::now().to_rfc3339(),
    });

    let signature = signing_key.sign(&canonicalize(&claim));
    let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());
    claim
        .as_object_mut()
        .ok_or_else(|| EmbedError::Internal("claim is not an object".into()))?
        .insert("signature".to_string(), sig_b64.into());

    Ok(canonicalize(&claim))
}

/// Passes writes through while hashing them.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finalize(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Split a trailer-signed buffer into (original bytes, claim JSON bytes).
pub fn split_trailer(signed: &[u8]) -> Option<(&[u8], &[u8])> {
    let magic_at = signed.len().checked_sub(TRAILER_MAGIC.len())?;
    if &signed[magic_at..] != TRAILER_MAGIC {
        return None;
    }
    let len_at = magic_at.checked_sub(8)?;
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&signed[len_at..magic_at]);
    let claim_len = usize::try_from(u64::from_be_bytes(len_bytes)).ok()?;
    let claim_at = len_at.checked_sub(claim_len)?;
    Some((&signed[..claim_at], &signed[claim_at..len_at]))
}
