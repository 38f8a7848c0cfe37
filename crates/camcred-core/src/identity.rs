use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::EmbedError;

/// Default resource name of the certificate chain.
pub const DEFAULT_CERTIFICATE_RESOURCE: &str = "es256_certs.pem";
/// Default resource name of the private key.
pub const DEFAULT_PRIVATE_KEY_RESOURCE: &str = "es256_private.key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlg {
    #[default]
    Es256,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
    Ed25519,
}

impl fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigningAlg::Es256 => "es256",
            SigningAlg::Es384 => "es384",
            SigningAlg::Es512 => "es512",
            SigningAlg::Ps256 => "ps256",
            SigningAlg::Ps384 => "ps384",
            SigningAlg::Ps512 => "ps512",
            SigningAlg::Ed25519 => "ed25519",
        };
        f.write_str(name)
    }
}

/// Certificate chain, private key, and algorithm used to sign manifests.
///
/// Built once at startup and shared read-only across signing calls. Missing
/// material is stored as empty text; [`SigningIdentity::ensure_usable`] turns
/// that into an identity-invalid error at first use.
#[derive(Clone)]
pub struct SigningIdentity {
    algorithm: SigningAlg,
    certificate_pem: String,
    private_key_pem: Zeroizing<String>,
}

impl SigningIdentity {
    pub fn new(
        algorithm: SigningAlg,
        certificate_pem: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            algorithm,
            certificate_pem: certificate_pem.into(),
            private_key_pem: Zeroizing::new(private_key_pem.into()),
        }
    }

    /// Load certificate and key from a resources directory.
    ///
    /// A missing or unreadable resource becomes empty text, never an error.
    pub fn from_resources(
        dir: &Path,
        certificate_resource: &str,
        private_key_resource: &str,
        algorithm: SigningAlg,
    ) -> Self {
        let cert = read_resource(dir, certificate_resource);
        let key = read_resource(dir, private_key_resource);
        Self::new(algorithm, cert, key)
    }

    pub fn algorithm(&self) -> SigningAlg {
        self.algorithm
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Fail if either certificate or key material is empty.
    pub fn ensure_usable(&self) -> Result<(), EmbedError> {
        if self.certificate_pem.trim().is_empty() {
            return Err(EmbedError::IdentityInvalid("certificate is empty".into()));
        }
        if self.private_key_pem.trim().is_empty() {
            return Err(EmbedError::IdentityInvalid("private key is empty".into()));
        }
        Ok(())
    }
}

fn read_resource(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "signing resource unavailable");
            String::new()
        }
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("algorithm", &self.algorithm)
            .field("certificate_pem", &format!("{} bytes", self.certificate_pem.len()))
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}
