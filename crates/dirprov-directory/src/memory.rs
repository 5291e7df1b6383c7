//! In-memory directory
//!
//! Implements every collaborator trait over a process-local tree. Used as
//! the dry-run backend of the CLI and as the recording mock in tests: every
//! primitive call is counted and failures can be injected per operation.

use crate::traits::{
    AddMemberOutcome, ChangeSet, CommitMode, DirectoryConnector, DirectoryTransport,
    GroupDirectory,
};
use async_trait::async_trait;
use dirprov_core::types::{IdentityType, MemberIdentity, ObjectHandle, ObjectKind};
use dirprov_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Number of primitive calls made against a `MemoryDirectory`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryCalls {
    pub binds: usize,
    pub finds: usize,
    pub creates: usize,
    pub commits: usize,
    pub set_passwords: usize,
    pub group_lookups: usize,
    pub member_adds: usize,
}

impl DirectoryCalls {
    pub fn total(&self) -> usize {
        self.binds
            + self.finds
            + self.creates
            + self.commits
            + self.set_passwords
            + self.group_lookups
            + self.member_adds
    }
}

#[derive(Debug, Clone)]
struct Object {
    dn: String,
    name: String,
    kind: ObjectKind,
    /// Keyed by lower-cased attribute name
    attributes: BTreeMap<String, String>,
    /// Lower-cased member DNs
    members: BTreeSet<String>,
    password: Option<String>,
}

impl Object {
    fn new(dn: String, name: String, kind: ObjectKind) -> Self {
        Self {
            dn,
            name,
            kind,
            attributes: BTreeMap::new(),
            members: BTreeSet::new(),
            password: None,
        }
    }

    fn handle(&self) -> ObjectHandle {
        ObjectHandle::new(self.dn.clone(), self.name.clone(), self.kind)
    }
}

#[derive(Debug)]
struct State {
    root: ObjectHandle,
    /// Keyed by lower-cased DN
    objects: HashMap<String, Object>,
    calls: DirectoryCalls,
    credentials: Option<(String, String)>,
    bind_failure: Option<String>,
    rejected_attributes: HashMap<String, String>,
    failing_commits: HashMap<String, String>,
    set_password_failure: Option<String>,
    failing_group_lookups: HashMap<String, String>,
}

impl State {
    fn get(&self, dn: &str) -> Option<&Object> {
        self.objects.get(&dn.to_ascii_lowercase())
    }

    fn get_mut(&mut self, dn: &str) -> Option<&mut Object> {
        self.objects.get_mut(&dn.to_ascii_lowercase())
    }

    fn insert(&mut self, object: Object) {
        self.objects.insert(object.dn.to_ascii_lowercase(), object);
    }

    fn insert_child(&mut self, parent: &ObjectHandle, name: &str, kind: ObjectKind) -> Result<ObjectHandle> {
        if self.get(&parent.dn).is_none() {
            return Err(Error::not_found("parent", parent.dn.clone()));
        }
        let dn = parent.child_dn(name, kind);
        if self.get(&dn).is_some() {
            return Err(Error::AlreadyExists(dn));
        }
        let object = Object::new(dn, name.to_string(), kind);
        let handle = object.handle();
        self.insert(object);
        Ok(handle)
    }

    fn member_dn(&self, member: &MemberIdentity) -> Option<String> {
        if member.identity_type == IdentityType::DistinguishedName {
            return self.get(&member.value).map(|o| o.dn.to_ascii_lowercase());
        }
        let attribute = member.identity_type.attribute().to_ascii_lowercase();
        self.objects
            .iter()
            .find(|(_, o)| {
                o.kind == ObjectKind::User
                    && o.attributes
                        .get(&attribute)
                        .is_some_and(|v| v.eq_ignore_ascii_case(&member.value))
            })
            .map(|(key, _)| key.clone())
    }
}

/// Process-local directory tree rooted at `DC=<domain>,DC=<realm>`
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    pub fn new(domain: &str, realm: &str) -> Self {
        let root = ObjectHandle::domain_root(domain, realm);
        let mut state = State {
            root: root.clone(),
            objects: HashMap::new(),
            calls: DirectoryCalls::default(),
            credentials: None,
            bind_failure: None,
            rejected_attributes: HashMap::new(),
            failing_commits: HashMap::new(),
            set_password_failure: None,
            failing_group_lookups: HashMap::new(),
        };
        state.insert(Object::new(root.dn.clone(), root.name.clone(), ObjectKind::Domain));
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn root(&self) -> ObjectHandle {
        self.state.lock().root.clone()
    }

    // Fault injection

    /// Accept binds only for this principal and credential
    pub fn require_credentials(&self, principal: &str, credential: &str) {
        self.state.lock().credentials = Some((principal.to_string(), credential.to_string()));
    }

    pub fn fail_bind(&self, cause: &str) {
        self.state.lock().bind_failure = Some(cause.to_string());
    }

    /// Reject, as a whole, any commit that writes `attribute`
    pub fn reject_attribute(&self, attribute: &str, cause: &str) {
        self.state
            .lock()
            .rejected_attributes
            .insert(attribute.to_ascii_lowercase(), cause.to_string());
    }

    /// Reject every commit to `dn`
    pub fn fail_entry_commit(&self, dn: &str, cause: &str) {
        self.state
            .lock()
            .failing_commits
            .insert(dn.to_ascii_lowercase(), cause.to_string());
    }

    pub fn fail_set_password(&self, cause: &str) {
        self.state.lock().set_password_failure = Some(cause.to_string());
    }

    /// Fail lookups of the group named `name`
    pub fn fail_group_lookup(&self, name: &str, cause: &str) {
        self.state
            .lock()
            .failing_group_lookups
            .insert(name.to_ascii_lowercase(), cause.to_string());
    }

    // Seeding

    /// Create every missing container of `segments` below the root
    pub fn add_container_path(&self, segments: &[&str]) -> ObjectHandle {
        let mut state = self.state.lock();
        let mut current = state.root.clone();
        for segment in segments {
            let dn = current.child_dn(segment, ObjectKind::Container);
            current = match state.get(&dn).map(Object::handle) {
                Some(existing) => existing,
                None => {
                    let object = Object::new(dn, segment.to_string(), ObjectKind::Container);
                    let handle = object.handle();
                    state.insert(object);
                    handle
                }
            };
        }
        current
    }

    /// Create a group directly below the root
    pub fn add_group(&self, name: &str) -> ObjectHandle {
        let mut state = self.state.lock();
        let dn = state.root.child_dn(name, ObjectKind::Group);
        let mut object = Object::new(dn, name.to_string(), ObjectKind::Group);
        object
            .attributes
            .insert("samaccountname".to_string(), name.to_string());
        let handle = object.handle();
        state.insert(object);
        handle
    }

    /// Create a committed user below `parent` with the given attributes
    pub fn add_user(&self, parent: &ObjectHandle, name: &str, attributes: &[(&str, &str)]) -> ObjectHandle {
        let mut state = self.state.lock();
        let dn = parent.child_dn(name, ObjectKind::User);
        let mut object = Object::new(dn, name.to_string(), ObjectKind::User);
        for (attr, value) in attributes {
            object
                .attributes
                .insert(attr.to_ascii_lowercase(), value.to_string());
        }
        let handle = object.handle();
        state.insert(object);
        handle
    }

    // Inspection

    pub fn calls(&self) -> DirectoryCalls {
        self.state.lock().calls
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.state.lock().get(dn).is_some()
    }

    pub fn attribute(&self, dn: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .get(dn)
            .and_then(|o| o.attributes.get(&name.to_ascii_lowercase()).cloned())
    }

    /// Attribute names written on `dn`, lower-cased
    pub fn attribute_names(&self, dn: &str) -> Vec<String> {
        self.state
            .lock()
            .get(dn)
            .map(|o| o.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn password(&self, dn: &str) -> Option<String> {
        self.state.lock().get(dn).and_then(|o| o.password.clone())
    }

    /// Lower-cased member DNs of the group named `name`
    pub fn members(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .objects
            .values()
            .find(|o| o.kind == ObjectKind::Group && o.name.eq_ignore_ascii_case(name))
            .map(|o| o.members.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn bind(
        &self,
        uri: &str,
        principal: &str,
        credential: &str,
    ) -> Result<Arc<dyn DirectoryTransport>> {
        let mut state = self.state.lock();
        state.calls.binds += 1;

        if let Some(cause) = &state.bind_failure {
            return Err(Error::Auth {
                uri: uri.to_string(),
                cause: cause.clone(),
            });
        }
        if let Some((p, c)) = &state.credentials {
            if p != principal || c != credential {
                return Err(Error::Auth {
                    uri: uri.to_string(),
                    cause: "invalid credentials".to_string(),
                });
            }
        }

        debug!(uri, principal, "In-memory bind");
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl DirectoryTransport for MemoryDirectory {
    async fn find_child(
        &self,
        parent: &ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<Option<ObjectHandle>> {
        let mut state = self.state.lock();
        state.calls.finds += 1;

        let dn = parent.child_dn(name, kind);
        Ok(state
            .get(&dn)
            .filter(|o| o.kind == kind)
            .map(Object::handle))
    }

    async fn create_child(
        &self,
        parent: &ObjectHandle,
        name: &str,
        kind: ObjectKind,
    ) -> Result<ObjectHandle> {
        let mut state = self.state.lock();
        state.calls.creates += 1;
        state.insert_child(parent, name, kind)
    }

    async fn commit(&self, dn: &str, mode: CommitMode, changes: &ChangeSet) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.commits += 1;

        if let Some(cause) = state.failing_commits.get(&dn.to_ascii_lowercase()) {
            return Err(Error::remote(cause));
        }
        for name in changes.names() {
            if let Some(cause) = state.rejected_attributes.get(&name.to_ascii_lowercase()) {
                return Err(Error::remote(format!("{}: {}", name, cause)));
            }
        }

        match mode {
            CommitMode::Create(kind) => {
                if state.get(dn).is_some() {
                    return Err(Error::AlreadyExists(dn.to_string()));
                }
                let (name, parent) = split_dn(dn)
                    .ok_or_else(|| Error::InvalidArgument(format!("Malformed DN: {}", dn)))?;
                if state.get(&parent).is_none() {
                    return Err(Error::not_found("parent", parent));
                }
                let mut object = Object::new(dn.to_string(), name, kind);
                for (attr, value) in changes.iter() {
                    object
                        .attributes
                        .insert(attr.to_ascii_lowercase(), value.to_string());
                }
                state.insert(object);
            }
            CommitMode::Update => {
                let object = state
                    .get_mut(dn)
                    .ok_or_else(|| Error::not_found("entry", dn))?;
                for (attr, value) in changes.iter() {
                    object
                        .attributes
                        .insert(attr.to_ascii_lowercase(), value.to_string());
                }
            }
        }

        debug!(dn, attributes = changes.len(), "In-memory commit");
        Ok(())
    }

    async fn set_password(&self, dn: &str, secret: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.set_passwords += 1;

        if let Some(cause) = &state.set_password_failure {
            return Err(Error::remote(cause));
        }
        let object = state
            .get_mut(dn)
            .ok_or_else(|| Error::not_found("entry", dn))?;
        object.password = Some(secret.to_string());
        Ok(())
    }

    fn group_directory(&self, _default_base: &ObjectHandle) -> Arc<dyn GroupDirectory> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl GroupDirectory for MemoryDirectory {
    async fn find_group(&self, name: &str) -> Result<Option<ObjectHandle>> {
        let mut state = self.state.lock();
        state.calls.group_lookups += 1;

        if let Some(cause) = state.failing_group_lookups.get(&name.to_ascii_lowercase()) {
            return Err(Error::remote(cause));
        }
        Ok(state
            .objects
            .values()
            .find(|o| {
                o.kind == ObjectKind::Group
                    && (o.name.eq_ignore_ascii_case(name)
                        || o
                            .attributes
                            .get("samaccountname")
                            .is_some_and(|v| v.eq_ignore_ascii_case(name)))
            })
            .map(Object::handle))
    }

    async fn add_member(
        &self,
        group: &ObjectHandle,
        member: &MemberIdentity,
    ) -> Result<AddMemberOutcome> {
        let mut state = self.state.lock();
        state.calls.member_adds += 1;

        let member_dn = state
            .member_dn(member)
            .ok_or_else(|| Error::not_found("user", member.value.clone()))?;
        let object = state
            .get_mut(&group.dn)
            .filter(|o| o.kind == ObjectKind::Group)
            .ok_or_else(|| Error::not_found("group", group.name.clone()))?;

        if object.members.insert(member_dn) {
            Ok(AddMemberOutcome::Added)
        } else {
            Ok(AddMemberOutcome::AlreadyMember)
        }
    }
}

/// Split `dn` into its unescaped leading RDN value and the parent DN
fn split_dn(dn: &str) -> Option<(String, String)> {
    let mut escaped = false;
    let mut split_at = None;
    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    let split_at = split_at?;
    let rdn = &dn[..split_at];
    let parent = &dn[split_at + 1..];
    let (_, value) = rdn.split_once('=')?;

    let mut name = String::with_capacity(value.len());
    let mut escaped = false;
    for c in value.chars() {
        if escaped || c != '\\' {
            name.push(c);
            escaped = false;
        } else {
            escaped = true;
        }
    }
    Some((name, parent.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_dn() {
        assert_eq!(
            split_dn("CN=Smith\\, John,OU=Users,DC=corp,DC=com"),
            Some((
                "Smith, John".to_string(),
                "OU=Users,DC=corp,DC=com".to_string()
            ))
        );
        assert_eq!(split_dn("DC=com"), None);
    }

    #[tokio::test]
    async fn test_create_requires_parent() {
        let dir = MemoryDirectory::new("corp", "com");
        let missing = ObjectHandle::new("OU=Gone,DC=corp,DC=com", "Gone", ObjectKind::Container);

        let err = dir
            .create_child(&missing, "Sales", ObjectKind::Container)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let root = dir.root();
        dir.create_child(&root, "Sales", ObjectKind::Container)
            .await
            .unwrap();
        let err = dir
            .create_child(&root, "Sales", ObjectKind::Container)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_rejected_attribute_fails_whole_commit() {
        let dir = MemoryDirectory::new("corp", "com");
        dir.reject_attribute("c", "value out of range");
        let dn = "CN=Jane Doe,DC=corp,DC=com";

        let mut changes = ChangeSet::new();
        changes.set("cn", "Jane Doe");
        dir.commit(dn, CommitMode::Create(ObjectKind::User), &changes)
            .await
            .unwrap();

        let mut address = ChangeSet::new();
        address.set("l", "Springfield");
        address.set("c", "Nowhere");
        assert!(dir.commit(dn, CommitMode::Update, &address).await.is_err());
        assert_eq!(dir.attribute(dn, "l"), None);
    }

    #[tokio::test]
    async fn test_add_member_by_upn_is_idempotent() {
        let dir = MemoryDirectory::new("corp", "com");
        let group = dir.add_group("Sales");
        let root = dir.root();
        dir.add_user(&root, "Jane Doe", &[("userPrincipalName", "jane@corp.com")]);

        let member = MemberIdentity::upn("JANE@corp.com");
        assert_eq!(
            dir.add_member(&group, &member).await.unwrap(),
            AddMemberOutcome::Added
        );
        assert_eq!(
            dir.add_member(&group, &member).await.unwrap(),
            AddMemberOutcome::AlreadyMember
        );
        assert_eq!(dir.members("sales"), vec!["cn=jane doe,dc=corp,dc=com"]);
    }

    #[tokio::test]
    async fn test_find_group_by_sam_account_name() {
        let dir = MemoryDirectory::new("corp", "com");
        dir.add_group("Sales Team");
        assert!(dir.find_group("sales team").await.unwrap().is_some());
        assert!(dir.find_group("Marketing").await.unwrap().is_none());
        assert_eq!(dir.calls().group_lookups, 2);
    }
}
