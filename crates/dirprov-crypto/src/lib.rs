//! Cryptography utilities for Dirprov

pub mod hash;
pub mod password;

pub use hash::*;
pub use password::*;
