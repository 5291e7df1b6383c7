//! LDAP / Active Directory collaborator
//!
//! Provides:
//! - Simple bind over LDAP, LDAPS or STARTTLS
//! - One-level container lookup and creation
//! - Entry creation and attribute replacement
//! - `unicodePwd` password writes
//! - Group lookup and member addition

mod client;
mod groups;
mod types;

pub use client::{LdapConnector, LdapTransport};
pub use groups::LdapGroupDirectory;
pub use types::{encode_unicode_pwd, LdapSettings};
