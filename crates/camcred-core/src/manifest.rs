use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::content_type::ContentType;
use crate::errors::MetadataError;
use crate::metadata::AssetMetadata;

/// Title prefix used when none is configured.
pub const DEFAULT_TITLE_PREFIX: &str = "c2pa-cam";

/// IPTC digital source type for media captured by a camera sensor.
pub const DIGITAL_CAPTURE: &str = "http://cv.iptc.org/newscodes/digitalsourcetype/digitalCapture";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "c2pa.created")]
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub action: ActionKind,
    #[serde(rename = "digitalSourceType")]
    pub digital_source_type: String,
}

/// A provenance assertion, tagged by its C2PA label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "label", content = "data")]
pub enum Assertion {
    #[serde(rename = "c2pa.actions")]
    Actions { actions: Vec<Action> },
}

/// Who generated the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub name: String,
    pub version: String,
    pub operating_system: String,
}

impl GeneratorInfo {
    /// This build of camcred running on the current operating system.
    pub fn current() -> Self {
        Self {
            name: "camcred".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            operating_system: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

/// Immutable description of the manifest to embed.
///
/// Only [`ManifestBuilder`] constructs these, which keeps `title` ending in
/// the extension that matches `format`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestDescription {
    claim_generator_info: Vec<GeneratorInfo>,
    format: String,
    title: String,
    assertions: Vec<Assertion>,
    #[serde(skip)]
    extension: &'static str,
}

impl ManifestDescription {
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn claim_generator_info(&self) -> &[GeneratorInfo] {
        &self.claim_generator_info
    }

    /// Target MIME type.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Filename extension matching `format`, without the dot.
    pub fn extension(&self) -> &str {
        self.extension
    }

    /// Manifest-definition JSON consumed by embedders.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Turns (content type, timestamp) into a [`ManifestDescription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBuilder {
    title_prefix: String,
    generator: GeneratorInfo,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_PREFIX, GeneratorInfo::current())
    }
}

impl ManifestBuilder {
    pub fn new(title_prefix: impl Into<String>, generator: GeneratorInfo) -> Self {
        Self {
            title_prefix: title_prefix.into(),
            generator,
        }
    }

    pub fn build(
        &self,
        content_type: &ContentType,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<ManifestDescription, MetadataError> {
        let no_mapping = || MetadataError::NoFormatMapping(content_type.identifier().to_string());
        let format = content_type.preferred_mime_type().ok_or_else(no_mapping)?;
        let extension = content_type.preferred_extension().ok_or_else(no_mapping)?;

        let title = format!(
            "{}_{}.{}",
            self.title_prefix,
            filename_timestamp(timestamp),
            extension
        );

        Ok(ManifestDescription {
            claim_generator_info: vec![self.generator.clone()],
            format: format.to_string(),
            title,
            assertions: vec![Assertion::Actions {
                actions: vec![Action {
                    action: ActionKind::Created,
                    digital_source_type: DIGITAL_CAPTURE.to_string(),
                }],
            }],
            extension,
        })
    }

    pub fn build_for(&self, metadata: &AssetMetadata) -> Result<ManifestDescription, MetadataError> {
        self.build(&metadata.content_type, metadata.timestamp)
    }
}

/// ISO-8601 with milliseconds and offset, colons swapped for periods.
pub fn filename_timestamp(timestamp: DateTime<FixedOffset>) -> String {
    timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', ".")
}
