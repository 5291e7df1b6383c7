//! Directory access for Dirprov
//!
//! Defines the narrow collaborator interfaces the provisioning core consumes
//! and the session built on top of them:
//! - `DirectoryConnector` / `DirectoryTransport`: bind, lookup, create, commit, set-password
//! - `GroupDirectory`: group lookup and member add (no removal)
//! - `DirectorySession`: one authenticated connection to a domain root
//! - `PathResolver`: organizational-unit path walking
//!
//! Backends: LDAP / Active Directory (`ldap3`), the cloud identity graph
//! (group mirroring only), and an in-memory directory.

pub mod graph;
pub mod ldap;
pub mod memory;
mod resolver;
mod session;
mod traits;

pub use graph::GraphGroupDirectory;
pub use ldap::{LdapConnector, LdapSettings};
pub use memory::{DirectoryCalls, MemoryDirectory};
pub use resolver::{PathResolution, PathResolver};
pub use session::{BindCredentials, DirectorySession, EntryHandle};
pub use traits::{
    AddMemberOutcome, ChangeSet, CommitMode, DirectoryConnector, DirectoryTransport,
    GroupDirectory,
};
