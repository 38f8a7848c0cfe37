#![forbid(unsafe_code)]

pub mod canonical;
pub mod keys;
pub mod trailer;

#[cfg(feature = "c2pa")]
pub mod c2pa_embedder;

pub use trailer::TrailerEmbedder;

#[cfg(feature = "c2pa")]
pub use c2pa_embedder::C2paEmbedder;
