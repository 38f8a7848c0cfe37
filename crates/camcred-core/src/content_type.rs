use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// (identifier, MIME type, preferred extension, extension aliases)
type Registration = (&'static str, &'static str, &'static str, &'static [&'static str]);

const REGISTRY: &[Registration] = &[
    ("public.jpeg", "image/jpeg", "jpg", &["jpeg", "jpe"]),
    ("public.png", "image/png", "png", &[]),
    ("com.compuserve.gif", "image/gif", "gif", &[]),
    ("public.tiff", "image/tiff", "tiff", &["tif"]),
    ("com.adobe.raw-image", "image/x-adobe-dng", "dng", &[]),
    ("org.webmproject.webp", "image/webp", "webp", &[]),
    ("public.heic", "image/heic", "heic", &[]),
    ("public.heif", "image/heif", "heif", &["hif"]),
    ("public.avif", "image/avif", "avif", &[]),
    ("com.apple.quicktime-movie", "video/quicktime", "mov", &["qt"]),
    ("public.mpeg-4", "video/mp4", "mp4", &["mpeg4"]),
    ("com.apple.m4v-video", "video/x-m4v", "m4v", &[]),
];

/// A uniform type identifier such as `public.jpeg`.
///
/// Identifiers outside the registry are representable but carry no MIME or
/// extension mapping, so no manifest can be built for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    pub const JPEG: &'static str = "public.jpeg";
    pub const HEIC: &'static str = "public.heic";
    pub const QUICKTIME_MOVIE: &'static str = "com.apple.quicktime-movie";

    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    pub fn identifier(&self) -> &str {
        &self.0
    }

    fn entry(&self) -> Option<&'static Registration> {
        REGISTRY.iter().find(|(id, ..)| *id == self.0)
    }

    /// Canonical MIME type, if the identifier is registered.
    pub fn preferred_mime_type(&self) -> Option<&'static str> {
        self.entry().map(|(_, mime, _, _)| *mime)
    }

    /// Canonical filename extension (without the dot), if registered.
    pub fn preferred_extension(&self) -> Option<&'static str> {
        self.entry().map(|(_, _, ext, _)| *ext)
    }

    /// Look up a type by filename extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        REGISTRY
            .iter()
            .find(|(_, _, preferred, aliases)| {
                *preferred == ext || aliases.iter().any(|alias| *alias == ext)
            })
            .map(|(id, ..)| Self::new(*id))
    }

    /// Look up a type from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Look up a type by MIME string.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(_, m, _, _)| m.eq_ignore_ascii_case(mime))
            .map(|(id, ..)| Self::new(*id))
    }

    /// Detect the container type from leading bytes.
    ///
    /// Looks at magic numbers only; filenames are never consulted.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        let id = if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "public.jpeg"
        } else if header.starts_with(b"\x89PNG\r\n\x1a\n") {
            "public.png"
        } else if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
            "com.compuserve.gif"
        } else if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
            "public.tiff"
        } else if header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WEBP" {
            "org.webmproject.webp"
        } else if header.len() >= 12 && &header[4..8] == b"ftyp" {
            sniff_ftyp_brand(&header[8..12])?
        } else {
            return None;
        };
        Some(Self::new(id))
    }

    pub fn is_video(&self) -> bool {
        self.preferred_mime_type()
            .is_some_and(|mime| mime.starts_with("video/"))
    }
}

/// Number of leading bytes `sniff` needs to recognize every registered type.
pub const SNIFF_LEN: usize = 16;

fn sniff_ftyp_brand(brand: &[u8]) -> Option<&'static str> {
    match brand {
        b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx" => Some("public.heic"),
        b"mif1" | b"msf1" => Some("public.heif"),
        b"avif" | b"avis" => Some("public.avif"),
        b"qt  " => Some("com.apple.quicktime-movie"),
        b"M4V " | b"M4VH" | b"M4VP" => Some("com.apple.m4v-video"),
        b"isom" | b"iso2" | b"iso4" | b"iso5" | b"iso6" | b"mp41" | b"mp42" | b"avc1" | b"dash" => {
            Some("public.mpeg-4")
        }
        _ => None,
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
