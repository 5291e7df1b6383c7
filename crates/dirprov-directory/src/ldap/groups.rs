//! Group lookups and member additions over LDAP

use crate::ldap::types::*;
use crate::traits::{AddMemberOutcome, GroupDirectory};
use async_trait::async_trait;
use dirprov_core::types::{IdentityType, MemberIdentity, ObjectHandle, ObjectKind};
use dirprov_core::{Error, Result};
use ldap3::{Ldap, Mod, Scope, SearchEntry, SearchResult};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Group directory sharing a bound LDAP connection
pub struct LdapGroupDirectory {
    ldap: Ldap,
    group_base: String,
    user_base: String,
}

impl LdapGroupDirectory {
    pub fn new(ldap: Ldap, group_base: String, user_base: String) -> Self {
        Self {
            ldap,
            group_base,
            user_base,
        }
    }

    /// First entry under `base` matching `filter`
    async fn search_first(
        &self,
        base: &str,
        filter: &str,
        attrs: Vec<&str>,
    ) -> Result<Option<SearchEntry>> {
        debug!("Searching {} with filter: {}", base, filter);

        let mut ldap = self.ldap.clone();
        let SearchResult(entries, result) = ldap
            .search(base, Scope::Subtree, filter, attrs)
            .await
            .map_err(|e| Error::remote(format!("Search failed: {}", e)))?;

        match result.rc {
            rc::SUCCESS => Ok(entries.into_iter().next().map(SearchEntry::construct)),
            rc::NO_SUCH_OBJECT => Ok(None),
            code => Err(Error::Remote(describe(code, &result.text))),
        }
    }

    async fn member_dn(&self, member: &MemberIdentity) -> Result<String> {
        if member.identity_type == IdentityType::DistinguishedName {
            return Ok(member.value.clone());
        }

        let filter = person_filter(member.identity_type.attribute(), &member.value);
        self.search_first(&self.user_base, &filter, vec!["1.1"])
            .await?
            .map(|entry| entry.dn)
            .ok_or_else(|| Error::not_found("user", member.value.clone()))
    }
}

#[async_trait]
impl GroupDirectory for LdapGroupDirectory {
    #[instrument(skip(self))]
    async fn find_group(&self, name: &str) -> Result<Option<ObjectHandle>> {
        let entry = self
            .search_first(&self.group_base, &group_filter(name), vec!["cn"])
            .await?;

        Ok(entry.map(|entry| {
            let cn = entry
                .attrs
                .get("cn")
                .and_then(|v| v.first().cloned())
                .unwrap_or_else(|| name.to_string());
            ObjectHandle::new(entry.dn, cn, ObjectKind::Group)
        }))
    }

    #[instrument(skip(self, group, member), fields(group = %group.dn, member = %member))]
    async fn add_member(
        &self,
        group: &ObjectHandle,
        member: &MemberIdentity,
    ) -> Result<AddMemberOutcome> {
        let member_dn = self.member_dn(member).await?;
        let mods = vec![Mod::Add("member", HashSet::from([member_dn.as_str()]))];

        let mut ldap = self.ldap.clone();
        let result = ldap
            .modify(&group.dn, mods)
            .await
            .map_err(|e| Error::remote(format!("Modify failed: {}", e)))?;

        match result.rc {
            rc::SUCCESS => Ok(AddMemberOutcome::Added),
            // Active Directory answers 68 for a member already present
            rc::ATTRIBUTE_OR_VALUE_EXISTS | rc::ENTRY_ALREADY_EXISTS => {
                debug!("Member already present");
                Ok(AddMemberOutcome::AlreadyMember)
            }
            rc::NO_SUCH_OBJECT => Err(Error::not_found("group", group.name.clone())),
            code => Err(Error::Remote(describe(code, &result.text))),
        }
    }
}
