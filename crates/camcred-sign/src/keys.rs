use anyhow::{anyhow, Result};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::SigningKey;

/// Generate an Ed25519 key pair as (public key PEM, PKCS#8 private key PEM).
///
/// The public key PEM stands in for the certificate resource when signing
/// with [`TrailerEmbedder`](crate::trailer::TrailerEmbedder).
pub fn generate_ed25519_pems() -> Result<(String, String)> {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| anyhow!("cannot encode private key: {e}"))?;
    let public_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| anyhow!("cannot encode public key: {e}"))?;
    Ok((public_pem, private_pem.as_str().to_owned()))
}
