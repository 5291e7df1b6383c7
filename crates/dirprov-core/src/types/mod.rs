//! Core types for Dirprov

mod attribute;
mod directory;
mod identity;
mod password;
mod path;
mod report;

pub use attribute::*;
pub use directory::*;
pub use identity::*;
pub use password::*;
pub use path::*;
pub use report::*;
