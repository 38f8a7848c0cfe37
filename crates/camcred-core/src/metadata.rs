use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

use crate::assets::SignableAsset;
use crate::content_type::ContentType;
use crate::errors::MetadataError;

/// Source of "now" on both the host (capture) clock and the wall clock.
pub trait HostClock: Send + Sync {
    /// Seconds on the monotonic host clock that capture times are stamped with.
    fn host_seconds(&self) -> f64;
    fn wall_now(&self) -> DateTime<Utc>;
}

/// Host clock anchored at first use within the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostClock;

fn host_anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

impl HostClock for SystemHostClock {
    fn host_seconds(&self) -> f64 {
        host_anchor().elapsed().as_secs_f64()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant. Useful for deterministic titles.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    wall: DateTime<Utc>,
    host_seconds: f64,
}

impl FixedClock {
    pub fn new(wall: DateTime<Utc>, host_seconds: f64) -> Self {
        Self { wall, host_seconds }
    }
}

impl HostClock for FixedClock {
    fn host_seconds(&self) -> f64 {
        self.host_seconds
    }

    fn wall_now(&self) -> DateTime<Utc> {
        self.wall
    }
}

/// Content type and capture time needed to build a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    pub content_type: ContentType,
    pub timestamp: DateTime<FixedOffset>,
}

/// Derives [`AssetMetadata`] from any [`SignableAsset`].
pub struct MetadataResolver {
    clock: Box<dyn HostClock>,
    offset: FixedOffset,
}

impl MetadataResolver {
    /// Resolver on the system clock, rendering times in the host's local offset.
    pub fn system() -> Self {
        Self::new(Box::new(SystemHostClock), *Local::now().offset())
    }

    pub fn new(clock: Box<dyn HostClock>, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    /// Render timestamps in UTC instead of the configured offset.
    pub fn with_utc(mut self) -> Self {
        self.offset = Utc.fix();
        self
    }

    pub fn clock(&self) -> &dyn HostClock {
        self.clock.as_ref()
    }

    pub fn resolve(&self, asset: &dyn SignableAsset) -> Result<AssetMetadata, MetadataError> {
        let content_type = asset
            .content_type_hint()
            .ok_or(MetadataError::UndetectableType)?;
        let timestamp = asset
            .timestamp_hint(self.clock.as_ref())
            .ok_or(MetadataError::MissingTimestamp)?;
        Ok(AssetMetadata {
            content_type,
            timestamp: timestamp.with_timezone(&self.offset),
        })
    }
}
