#![forbid(unsafe_code)]

pub mod atomic;
pub mod config;
pub mod coordinator;
pub mod scratch;

pub use config::{load_config, SignerConfig};
pub use coordinator::SigningCoordinator;
