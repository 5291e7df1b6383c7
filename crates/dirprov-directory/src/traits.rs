//! Collaborator interfaces consumed by the provisioning core

use async_trait::async_trait;
use dirprov_core::types::{MemberIdentity, ObjectHandle, ObjectKind};
use dirprov_core::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Establishes authenticated connections to a directory service
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Bind to `uri` as `principal`. A returned transport is always usable;
    /// failures never yield a half-initialised handle.
    async fn bind(
        &self,
        uri: &str,
        principal: &str,
        credential: &str,
    ) -> Result<Arc<dyn DirectoryTransport>>;
}

/// How a commit is applied remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// The object does not exist yet and is created with the change set
    Create(ObjectKind),
    /// The object exists and the change set replaces attribute values
    Update,
}

/// Ordered set of single-valued attribute writes flushed by one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    attributes: BTreeMap<String, String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `name = value`, replacing any earlier value for `name`
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into this set without overwriting values already staged here
    pub fn merge_missing(&mut self, other: ChangeSet) {
        for (name, value) in other.attributes {
            self.attributes.entry(name).or_insert(value);
        }
    }
}

/// One authenticated connection to a directory service
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Look up the child of `parent` named `name` of the given kind
    async fn find_child(
        &self,
        parent: &ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<Option<ObjectHandle>>;

    /// Create a child object immediately
    async fn create_child(
        &self,
        parent: &ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<ObjectHandle>;

    /// Flush `changes` to the object at `dn`. Attempted exactly once.
    async fn commit(&self, dn: &str, mode: CommitMode, changes: &ChangeSet) -> Result<()>;

    /// Privileged set-password side channel
    async fn set_password(&self, dn: &str, secret: &str) -> Result<()>;

    /// Group directory sharing this connection. `default_base` is used when
    /// no group search base is configured.
    fn group_directory(&self, default_base: &ObjectHandle) -> Arc<dyn GroupDirectory>;
}

/// Result of adding a member to a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMemberOutcome {
    Added,
    AlreadyMember,
}

/// Group lookup and membership additions.
///
/// Exposes no operation that removes a member or deletes a group. Any undo
/// capability belongs in a separate, separately reviewed interface.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn find_group(&self, name: &str) -> Result<Option<ObjectHandle>>;

    async fn add_member(
        &self,
        group: &ObjectHandle,
        member: &MemberIdentity,
    ) -> Result<AddMemberOutcome>;
}
