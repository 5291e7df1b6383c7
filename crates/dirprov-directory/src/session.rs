//! Authenticated directory session
//!
//! A session owns one bound transport and the domain root it was bound to.
//! It is built only from a successful bind; an authentication failure
//! returns an error and no session exists to misuse afterwards.

use crate::traits::{ChangeSet, CommitMode, DirectoryConnector, DirectoryTransport, GroupDirectory};
use dirprov_core::types::{ObjectHandle, ObjectKind};
use dirprov_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Principal, credential and target domain for a session bind
#[derive(Clone)]
pub struct BindCredentials {
    pub principal: String,
    pub credential: String,
    pub domain: String,
    pub realm: String,
    /// Explicit URL; defaults to `ldap://<domain>.<realm>`
    pub server_url: Option<String>,
}

impl BindCredentials {
    pub fn new(
        principal: impl Into<String>,
        credential: impl Into<String>,
        domain: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            credential: credential.into(),
            domain: domain.into(),
            realm: realm.into(),
            server_url: None,
        }
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn uri(&self) -> String {
        match &self.server_url {
            Some(url) => url.clone(),
            None => format!("ldap://{}.{}", self.domain, self.realm),
        }
    }

    pub fn from_config(config: &dirprov_core::config::DirectoryConfig) -> Self {
        Self {
            principal: config.bind_principal.clone(),
            credential: config.bind_password.clone(),
            domain: config.domain.clone(),
            realm: config.realm.clone(),
            server_url: config.server_url.clone(),
        }
    }
}

impl fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindCredentials")
            .field("principal", &self.principal)
            .field("credential", &"<redacted>")
            .field("domain", &self.domain)
            .field("realm", &self.realm)
            .field("server_url", &self.server_url)
            .finish()
    }
}

/// A user entry created through a session.
///
/// Uncommitted entries exist only as a pending change set.
#[derive(Debug, Clone)]
pub struct EntryHandle {
    dn: String,
    name: String,
    committed: bool,
    staged: ChangeSet,
}

impl EntryHandle {
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Unescaped CN value
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn staged(&self) -> &ChangeSet {
        &self.staged
    }

    /// Remove and return everything currently staged
    pub fn take_staged(&mut self) -> ChangeSet {
        std::mem::take(&mut self.staged)
    }

    /// Put back attributes previously taken, without overwriting newer values
    pub fn restage(&mut self, changes: ChangeSet) {
        self.staged.merge_missing(changes);
    }

    pub fn as_handle(&self) -> ObjectHandle {
        ObjectHandle::new(self.dn.clone(), self.name.clone(), ObjectKind::User)
    }
}

/// One authenticated connection to a directory root
pub struct DirectorySession {
    transport: Arc<dyn DirectoryTransport>,
    root: ObjectHandle,
    domain: String,
    realm: String,
    principal: String,
    uri: String,
}

impl DirectorySession {
    /// Bind and build the session. Any transport or credential failure is
    /// returned as `Error::Auth`.
    #[instrument(skip(connector, credentials), fields(domain = %credentials.domain, realm = %credentials.realm))]
    pub async fn connect(
        connector: &dyn DirectoryConnector,
        credentials: &BindCredentials,
    ) -> Result<Self> {
        let uri = credentials.uri();

        if credentials.domain.is_empty() || credentials.realm.is_empty() {
            return Err(Error::InvalidArgument(
                "Domain and realm are required to connect".into(),
            ));
        }

        debug!(uri = %uri, principal = %credentials.principal, "Binding to directory");

        let transport = connector
            .bind(&uri, &credentials.principal, &credentials.credential)
            .await
            .map_err(|e| match e {
                Error::Auth { .. } => e,
                other => Error::Auth {
                    uri: uri.clone(),
                    cause: other.to_string(),
                },
            })?;

        let root = ObjectHandle::domain_root(&credentials.domain, &credentials.realm);
        info!(uri = %uri, root = %root.dn, "Directory session established");

        Ok(Self {
            transport,
            root,
            domain: credentials.domain.clone(),
            realm: credentials.realm.clone(),
            principal: credentials.principal.clone(),
            uri,
        })
    }

    pub fn root(&self) -> &ObjectHandle {
        &self.root
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Find the container named `name` directly below `parent`
    pub async fn find_container(&self, parent: &ObjectHandle, name: &str) -> Result<ObjectHandle> {
        self.transport
            .find_child(parent, name, ObjectKind::Container)
            .await?
            .ok_or_else(|| Error::not_found("container", parent.child_dn(name, ObjectKind::Container)))
    }

    /// Create the container named `name` directly below `parent`
    pub async fn create_container(&self, parent: &ObjectHandle, name: &str) -> Result<ObjectHandle> {
        let handle = self
            .transport
            .create_child(parent, name, ObjectKind::Container)
            .await?;
        info!(dn = %handle.dn, "Created container");
        Ok(handle)
    }

    /// Stage a new user entry named `name` under `parent`. No remote effect
    /// until `commit`.
    pub fn create_entry(&self, parent: &ObjectHandle, name: &str) -> EntryHandle {
        let dn = parent.child_dn(name, ObjectKind::User);
        debug!(dn = %dn, "Staged new entry");
        EntryHandle {
            dn,
            name: name.to_string(),
            committed: false,
            staged: ChangeSet::new(),
        }
    }

    /// Stage a single attribute on `entry`
    pub fn set_attribute(&self, entry: &mut EntryHandle, name: &str, value: &str) {
        entry.staged.set(name, value);
    }

    /// Flush the entry's staged attributes. The staged set is consumed
    /// whether or not the commit succeeds, and the commit is never retried.
    #[instrument(skip(self, entry), fields(dn = %entry.dn))]
    pub async fn commit(&self, entry: &mut EntryHandle) -> Result<()> {
        let changes = entry.take_staged();
        let mode = if entry.committed {
            CommitMode::Update
        } else {
            CommitMode::Create(ObjectKind::User)
        };

        match self.transport.commit(&entry.dn, mode, &changes).await {
            Ok(()) => {
                entry.committed = true;
                debug!(attributes = changes.len(), "Commit succeeded");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Commit failed");
                Err(Error::Commit {
                    dn: entry.dn.clone(),
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Set the entry's password through the privileged side channel. The
    /// entry must already exist remotely.
    #[instrument(skip(self, entry, secret), fields(dn = %entry.dn))]
    pub async fn set_credential(&self, entry: &EntryHandle, secret: &str) -> Result<()> {
        if !entry.committed {
            return Err(Error::Credential {
                dn: entry.dn.clone(),
                cause: "entry does not exist remotely".into(),
            });
        }

        self.transport
            .set_password(&entry.dn, secret)
            .await
            .map_err(|e| Error::Credential {
                dn: entry.dn.clone(),
                cause: e.to_string(),
            })
    }

    /// Group directory reached through this session's connection
    pub fn group_directory(&self) -> Arc<dyn GroupDirectory> {
        self.transport.group_directory(&self.root)
    }
}

impl fmt::Debug for DirectorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySession")
            .field("uri", &self.uri)
            .field("root", &self.root.dn)
            .field("principal", &self.principal)
            .finish()
    }
}
