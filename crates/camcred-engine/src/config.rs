use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use camcred_core::identity::{
    SigningAlg, SigningIdentity, DEFAULT_CERTIFICATE_RESOURCE, DEFAULT_PRIVATE_KEY_RESOURCE,
};
use camcred_core::manifest::{GeneratorInfo, ManifestBuilder, DEFAULT_TITLE_PREFIX};
use camcred_core::metadata::MetadataResolver;
use camcred_core::traits::Embedder;
use serde::{Deserialize, Serialize};

use crate::coordinator::SigningCoordinator;

/// Signer settings, usually read from a JSON file.
///
/// Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignerConfig {
    /// Scratch directory; the user cache directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    pub title_prefix: String,
    /// Directory holding the certificate and key resources.
    pub resources_dir: PathBuf,
    pub certificate_resource: String,
    pub private_key_resource: String,
    pub algorithm: SigningAlg,
    /// Stamp titles in UTC instead of the host's local offset.
    pub utc_timestamps: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
            resources_dir: PathBuf::from("."),
            certificate_resource: DEFAULT_CERTIFICATE_RESOURCE.to_string(),
            private_key_resource: DEFAULT_PRIVATE_KEY_RESOURCE.to_string(),
            algorithm: SigningAlg::default(),
            utc_timestamps: false,
        }
    }
}

/// Load a config file. Relative directories are taken relative to the file.
pub fn load_config(path: &Path) -> Result<SignerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let mut config: SignerConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid config {}", path.display()))?;

    let base = path.parent().unwrap_or(Path::new("."));
    config.resources_dir = base.join(&config.resources_dir);
    config.scratch_dir = config.scratch_dir.map(|dir| base.join(dir));
    Ok(config)
}

impl SignerConfig {
    /// Read the signing identity from the configured resources.
    pub fn load_identity(&self) -> SigningIdentity {
        SigningIdentity::from_resources(
            &self.resources_dir,
            &self.certificate_resource,
            &self.private_key_resource,
            self.algorithm,
        )
    }

    pub fn manifest_builder(&self) -> ManifestBuilder {
        ManifestBuilder::new(self.title_prefix.clone(), GeneratorInfo::current())
    }

    pub fn metadata_resolver(&self) -> MetadataResolver {
        let resolver = MetadataResolver::system();
        if self.utc_timestamps {
            resolver.with_utc()
        } else {
            resolver
        }
    }

    /// Build a coordinator that signs with `embedder`.
    pub fn coordinator(&self, embedder: Arc<dyn Embedder>) -> SigningCoordinator {
        let identity = Arc::new(self.load_identity());
        tracing::debug!(identity = ?identity, "signing identity loaded");
        let coordinator = SigningCoordinator::new(embedder, identity)
            .with_resolver(self.metadata_resolver())
            .with_manifest_builder(self.manifest_builder());
        match &self.scratch_dir {
            Some(dir) => coordinator.with_scratch_dir(dir),
            None => coordinator,
        }
    }
}
