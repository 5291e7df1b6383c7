//! LDAP connector and transport
//!
//! Binds with a simple bind over LDAP, LDAPS or STARTTLS, then performs the
//! directory primitives over the single bound connection.

use crate::ldap::groups::LdapGroupDirectory;
use crate::ldap::types::*;
use crate::traits::{ChangeSet, CommitMode, DirectoryConnector, DirectoryTransport, GroupDirectory};
use async_trait::async_trait;
use dirprov_core::config::DirectoryConfig;
use dirprov_core::types::{ObjectHandle, ObjectKind};
use dirprov_core::{Error, Result};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Opens authenticated LDAP connections
#[derive(Debug, Clone, Default)]
pub struct LdapConnector {
    settings: LdapSettings,
}

impl LdapConnector {
    pub fn new(settings: LdapSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(LdapSettings::from_config(config))
    }

    pub fn settings(&self) -> &LdapSettings {
        &self.settings
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    #[instrument(skip(self, credential))]
    async fn bind(
        &self,
        uri: &str,
        principal: &str,
        credential: &str,
    ) -> Result<Arc<dyn DirectoryTransport>> {
        let auth_error = |cause: String| Error::Auth {
            uri: uri.to_string(),
            cause,
        };

        // An empty password turns a simple bind into an anonymous bind
        if credential.is_empty() {
            return Err(auth_error("Empty credential".to_string()));
        }

        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(self.settings.timeout)
            .set_starttls(self.settings.start_tls && uri.starts_with("ldap://"));

        debug!("Connecting to LDAP server: {}", uri);

        let (conn, mut ldap) = LdapConnAsync::with_settings(conn_settings, uri)
            .await
            .map_err(|e| auth_error(format!("Failed to connect to LDAP server: {}", e)))?;

        ldap3::drive!(conn);

        let result = ldap
            .simple_bind(principal, credential)
            .await
            .map_err(|e| auth_error(format!("Bind failed: {}", e)))?;

        if result.rc != rc::SUCCESS {
            let _ = ldap.unbind().await;
            return Err(auth_error(describe(result.rc, &result.text)));
        }

        Ok(Arc::new(LdapTransport {
            ldap,
            settings: self.settings.clone(),
        }))
    }
}

/// One bound LDAP connection
pub struct LdapTransport {
    ldap: Ldap,
    settings: LdapSettings,
}

impl LdapTransport {
    async fn add(&self, dn: &str, kind: ObjectKind, changes: &ChangeSet) -> Result<()> {
        let mut attrs: Vec<(&str, HashSet<&str>)> = vec![(
            "objectClass",
            self.settings.object_classes(kind).into_iter().collect(),
        )];
        for (name, value) in changes.iter() {
            attrs.push((name, HashSet::from([value])));
        }

        let mut ldap = self.ldap.clone();
        let result = ldap
            .add(dn, attrs)
            .await
            .map_err(|e| Error::remote(format!("Add failed: {}", e)))?;

        check_write(&result, dn)
    }
}

#[async_trait]
impl DirectoryTransport for LdapTransport {
    async fn find_child(
        &self,
        parent: &ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<Option<ObjectHandle>> {
        let filter = child_filter(name, kind);
        debug!("Searching {} with filter: {}", parent.dn, filter);

        let mut ldap = self.ldap.clone();
        let SearchResult(entries, result) = ldap
            .search(&parent.dn, Scope::OneLevel, &filter, vec!["1.1"])
            .await
            .map_err(|e| Error::remote(format!("Search failed: {}", e)))?;

        match result.rc {
            rc::SUCCESS => Ok(entries.into_iter().next().map(|entry| {
                let entry = ldap3::SearchEntry::construct(entry);
                ObjectHandle::new(entry.dn, name, kind)
            })),
            rc::NO_SUCH_OBJECT => Ok(None),
            code => Err(Error::Remote(describe(code, &result.text))),
        }
    }

    #[instrument(skip(self, parent), fields(parent = %parent.dn))]
    async fn create_child(
        &self,
        parent: &ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<ObjectHandle> {
        let dn = parent.child_dn(name, kind);
        let mut changes = ChangeSet::new();
        changes.set(naming_attribute(kind), name);

        match self.add(&dn, kind, &changes).await {
            Ok(()) => Ok(ObjectHandle::new(dn, name, kind)),
            Err(Error::NotFound { .. }) => Err(Error::not_found("parent", parent.dn.clone())),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, changes), fields(attributes = changes.len()))]
    async fn commit(&self, dn: &str, mode: CommitMode, changes: &ChangeSet) -> Result<()> {
        match mode {
            CommitMode::Create(kind) => self.add(dn, kind, changes).await,
            CommitMode::Update => {
                if changes.is_empty() {
                    return Ok(());
                }
                let mods: Vec<Mod<&str>> = changes
                    .iter()
                    .map(|(name, value)| Mod::Replace(name, HashSet::from([value])))
                    .collect();

                let mut ldap = self.ldap.clone();
                let result = ldap
                    .modify(dn, mods)
                    .await
                    .map_err(|e| Error::remote(format!("Modify failed: {}", e)))?;

                check_write(&result, dn)
            }
        }
    }

    #[instrument(skip(self, secret))]
    async fn set_password(&self, dn: &str, secret: &str) -> Result<()> {
        let encoded = encode_unicode_pwd(secret)?;
        let mods = vec![Mod::Replace(
            b"unicodePwd".to_vec(),
            HashSet::from([encoded]),
        )];

        let mut ldap = self.ldap.clone();
        let result = ldap
            .modify(dn, mods)
            .await
            .map_err(|e| Error::remote(format!("Password modify failed: {}", e)))?;

        if result.rc != rc::SUCCESS {
            warn!(rc = result.rc, "Directory rejected password");
        }
        check_write(&result, dn)
    }

    fn group_directory(&self, default_base: &ObjectHandle) -> Arc<dyn GroupDirectory> {
        let group_base = self
            .settings
            .group_base_dn
            .clone()
            .unwrap_or_else(|| default_base.dn.clone());
        Arc::new(LdapGroupDirectory::new(
            self.ldap.clone(),
            group_base,
            default_base.dn.clone(),
        ))
    }
}
