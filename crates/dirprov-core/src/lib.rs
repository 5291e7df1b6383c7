//! Dirprov Core Library
//!
//! Core types, errors, and configuration shared by the directory
//! provisioning crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::ProvisioningConfig;
pub use error::{Error, Result};

/// Dirprov version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of random bytes drawn for a generated password
pub const DEFAULT_PASSWORD_BYTES: usize = 60;

/// Default directory connection timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Maximum depth of an organizational-unit path
pub const MAX_PATH_DEPTH: usize = 64;
