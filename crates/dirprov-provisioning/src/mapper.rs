//! Canonical field to directory attribute mapping
//!
//! A static table maps each canonical key to its attribute group and the
//! directory attribute(s) it writes. `AttributeMapper::apply` stages and
//! commits one group at a time; attributes staged by anything else are held
//! aside for the duration of the commit.

use crate::trace::DiagnosticTrace;
use dirprov_core::types::{AttributeGroup, GroupOutcome};
use dirprov_core::{Error, Result};
use dirprov_directory::{ChangeSet, DirectorySession, EntryHandle};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Canonical key/value parameters supplied by a caller
pub type Params = BTreeMap<String, String>;

/// One row of the attribute table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMapping {
    pub key: &'static str,
    pub group: AttributeGroup,
    pub attributes: &'static [&'static str],
}

const fn row(
    group: AttributeGroup,
    key: &'static str,
    attributes: &'static [&'static str],
) -> AttributeMapping {
    AttributeMapping {
        key,
        group,
        attributes,
    }
}

use AttributeGroup::*;

pub static ATTRIBUTE_TABLE: &[AttributeMapping] = &[
    row(Account, "UPN", &["userPrincipalName"]),
    row(Account, "AccountName", &["sAMAccountName"]),
    row(Account, "MailNickname", &["mailNickname"]),
    row(General, "FirstName", &["givenName"]),
    row(General, "LastName", &["sn"]),
    row(General, "DisplayName", &["displayName"]),
    row(General, "Initials", &["initials"]),
    row(General, "Description", &["description"]),
    row(General, "Office", &["physicalDeliveryOfficeName"]),
    row(General, "Email", &["mail"]),
    row(General, "PhoneNumber", &["telephoneNumber"]),
    row(General, "Website", &["wWWHomePage"]),
    row(Address, "Street", &["streetAddress"]),
    row(Address, "POBox", &["postOfficeBox"]),
    row(Address, "City", &["l"]),
    row(Address, "State", &["st"]),
    row(Address, "PostalCode", &["postalCode"]),
    row(Address, "Country", &["c", "msExchUsageLocation"]),
    row(Profile, "ProfilePath", &["profilePath"]),
    row(Profile, "LogonScript", &["scriptPath"]),
    row(Profile, "HomeDirectory", &["homeDirectory"]),
    row(Profile, "HomeDrive", &["homeDrive"]),
    row(Organization, "JobTitle", &["title"]),
    row(Organization, "Department", &["department"]),
    row(Organization, "Company", &["company"]),
    row(Telephone, "HomePhone", &["homePhone"]),
    row(Telephone, "Pager", &["pager"]),
    row(Telephone, "Page", &["pager"]),
    row(Telephone, "Mobile", &["mobile"]),
    row(Telephone, "Fax", &["facsimileTelephoneNumber"]),
    row(Telephone, "IPPhone", &["ipPhone"]),
    row(Telephone, "IP", &["ipPhone"]),
    row(Telephone, "Notes", &["info"]),
    row(OrganizationExtra, "Manager", &["manager"]),
];

/// Table rows belonging to `group`, in table order
pub fn mappings(group: AttributeGroup) -> impl Iterator<Item = &'static AttributeMapping> {
    ATTRIBUTE_TABLE.iter().filter(move |m| m.group == group)
}

pub fn lookup(key: &str) -> Option<&'static AttributeMapping> {
    ATTRIBUTE_TABLE.iter().find(|m| m.key == key)
}

/// Non-blank value of `key`
fn value<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Fields every provisioned entry must have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFields {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

impl RequiredFields {
    /// Validate the name fields of `params` without touching the directory
    pub fn from_params(params: &Params) -> Result<Self> {
        let first_name = value(params, "FirstName")
            .ok_or_else(|| Error::RequiredField("FirstName".into()))?;
        let last_name =
            value(params, "LastName").ok_or_else(|| Error::RequiredField("LastName".into()))?;

        Ok(Self {
            first_name: first_name.to_string(),
            middle_name: value(params, "MiddleName").map(String::from),
            last_name: last_name.to_string(),
        })
    }

    /// `First [Middle ]Last`
    pub fn display_name(&self) -> String {
        match &self.middle_name {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// Attributes written by the initial commit that creates the entry
pub fn creation_attributes(fields: &RequiredFields, params: &Params) -> ChangeSet {
    let display_name = fields.display_name();
    let mut changes = ChangeSet::new();
    changes.set("cn", display_name.as_str());
    changes.set("givenName", fields.first_name.as_str());
    changes.set("sn", fields.last_name.as_str());
    changes.set("displayName", display_name);

    if let Some(account) = value(params, "AccountName").or_else(|| value(params, "Username")) {
        changes.set("sAMAccountName", account);
    }
    if let Some(upn) = value(params, "UPN").or_else(|| value(params, "Email")) {
        changes.set("userPrincipalName", upn);
    }
    changes
}

/// Result of applying one attribute group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedGroupResult {
    pub group: AttributeGroup,
    pub committed: bool,
    /// Directory attributes staged for this group's commit
    pub staged: Vec<String>,
    pub cause: Option<String>,
}

impl AppliedGroupResult {
    pub fn is_ok(&self) -> bool {
        self.committed
    }
}

impl From<AppliedGroupResult> for GroupOutcome {
    fn from(result: AppliedGroupResult) -> Self {
        GroupOutcome {
            group: result.group,
            ok: result.committed,
            cause: result.cause,
        }
    }
}

/// Applies attribute groups to an entry through a session
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeMapper;

impl AttributeMapper {
    pub fn new() -> Self {
        Self
    }

    /// Stage every recognised, non-empty key of `group` from `params` and
    /// commit them together. Keys outside the group are ignored. A group
    /// with nothing to write makes no remote call and reports committed.
    pub async fn apply(
        &self,
        session: &DirectorySession,
        entry: &mut EntryHandle,
        group: AttributeGroup,
        params: &Params,
        trace: &mut DiagnosticTrace,
    ) -> AppliedGroupResult {
        let operation = format!("Update{}", group);
        trace.append(format!("Updating {} attributes", group));

        if !entry.is_committed() {
            let cause = "entry does not exist remotely".to_string();
            trace.append(format!("{} attributes failed: {}", group, cause));
            trace.fail(&operation, &cause);
            return AppliedGroupResult {
                group,
                committed: false,
                staged: Vec::new(),
                cause: Some(cause),
            };
        }

        let foreign = entry.take_staged();
        let mut staged = Vec::new();

        for mapping in mappings(group) {
            let Some(value) = value(params, mapping.key) else {
                continue;
            };
            trace.append(format!("Setting {} to: {}", mapping.key, value));
            for attribute in mapping.attributes {
                session.set_attribute(entry, attribute, value);
                staged.push(attribute.to_string());
            }
        }

        let result = if staged.is_empty() {
            debug!(group = %group, "No attributes to apply");
            trace.append(format!("No {} attributes supplied", group));
            AppliedGroupResult {
                group,
                committed: true,
                staged,
                cause: None,
            }
        } else {
            trace.append("Attempting to commit changes");
            match session.commit(entry).await {
                Ok(()) => {
                    trace.append(format!("{} attributes committed", group));
                    AppliedGroupResult {
                        group,
                        committed: true,
                        staged,
                        cause: None,
                    }
                }
                Err(e) => {
                    warn!(group = %group, error = %e, "Attribute group rejected");
                    trace.append(format!("{} attributes failed: {}", group, e));
                    trace.fail(&operation, &e);
                    AppliedGroupResult {
                        group,
                        committed: false,
                        staged,
                        cause: Some(e.to_string()),
                    }
                }
            }
        };

        entry.restage(foreign);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirprov_directory::{BindCredentials, MemoryDirectory};
    use std::collections::HashSet;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn committed_entry(dir: &MemoryDirectory) -> (DirectorySession, EntryHandle) {
        let creds = BindCredentials::new("svc", "secret", "corp", "com");
        let session = DirectorySession::connect(dir, &creds).await.unwrap();
        let mut entry = session.create_entry(session.root(), "John Smith");
        session.set_attribute(&mut entry, "cn", "John Smith");
        session.commit(&mut entry).await.unwrap();
        (session, entry)
    }

    #[test]
    fn test_table_keys_are_unique() {
        let keys: HashSet<_> = ATTRIBUTE_TABLE.iter().map(|m| m.key).collect();
        assert_eq!(keys.len(), ATTRIBUTE_TABLE.len());
        for group in AttributeGroup::ORDER {
            assert!(mappings(group).count() > 0, "{group} has no keys");
        }
        assert_eq!(lookup("Country").unwrap().attributes, &["c", "msExchUsageLocation"]);
        assert!(lookup("Unknown").is_none());
    }

    #[test]
    fn test_required_fields() {
        let fields = RequiredFields::from_params(&params(&[
            ("FirstName", "John"),
            ("MiddleName", "Q"),
            ("LastName", "Smith"),
        ]))
        .unwrap();
        assert_eq!(fields.display_name(), "John Q Smith");

        let err = RequiredFields::from_params(&params(&[("FirstName", "John"), ("LastName", " ")]))
            .unwrap_err();
        assert!(matches!(err, Error::RequiredField(ref f) if f == "LastName"));

        let err = RequiredFields::from_params(&params(&[("LastName", "Smith")])).unwrap_err();
        assert!(matches!(err, Error::RequiredField(ref f) if f == "FirstName"));
    }

    #[test]
    fn test_creation_attributes_fallbacks() {
        let p = params(&[
            ("FirstName", "John"),
            ("LastName", "Smith"),
            ("Username", "jsmith"),
            ("Email", "john.smith@corp.com"),
        ]);
        let fields = RequiredFields::from_params(&p).unwrap();
        let changes = creation_attributes(&fields, &p);

        assert_eq!(changes.get("cn"), Some("John Smith"));
        assert_eq!(changes.get("displayName"), Some("John Smith"));
        assert_eq!(changes.get("sAMAccountName"), Some("jsmith"));
        assert_eq!(changes.get("userPrincipalName"), Some("john.smith@corp.com"));
    }

    #[tokio::test]
    async fn test_apply_skips_empty_values() {
        let dir = MemoryDirectory::new("corp", "com");
        let (session, mut entry) = committed_entry(&dir).await;
        let mut trace = DiagnosticTrace::default();
        let commits_before = dir.calls().commits;

        let result = AttributeMapper::new()
            .apply(
                &session,
                &mut entry,
                AttributeGroup::Address,
                &params(&[("Street", "1 Main St"), ("City", "")]),
                &mut trace,
            )
            .await;

        assert!(result.committed);
        assert_eq!(result.staged, vec!["streetAddress"]);
        assert_eq!(dir.calls().commits, commits_before + 1);
        assert_eq!(
            dir.attribute(entry.dn(), "streetAddress").as_deref(),
            Some("1 Main St")
        );
        assert_eq!(dir.attribute(entry.dn(), "l"), None);
        assert!(trace.messages().contains(&"Setting Street to: 1 Main St".to_string()));
    }

    #[tokio::test]
    async fn test_apply_ignores_keys_of_other_groups() {
        let dir = MemoryDirectory::new("corp", "com");
        let (session, mut entry) = committed_entry(&dir).await;
        let mut trace = DiagnosticTrace::default();
        let commits_before = dir.calls().commits;

        let result = AttributeMapper::new()
            .apply(
                &session,
                &mut entry,
                AttributeGroup::Profile,
                &params(&[("Street", "1 Main St"), ("Bogus", "x")]),
                &mut trace,
            )
            .await;

        assert!(result.committed);
        assert!(result.staged.is_empty());
        assert_eq!(dir.calls().commits, commits_before);
    }

    #[tokio::test]
    async fn test_country_fans_out() {
        let dir = MemoryDirectory::new("corp", "com");
        let (session, mut entry) = committed_entry(&dir).await;
        let mut trace = DiagnosticTrace::default();

        AttributeMapper::new()
            .apply(
                &session,
                &mut entry,
                AttributeGroup::Address,
                &params(&[("Country", "US")]),
                &mut trace,
            )
            .await;

        assert_eq!(dir.attribute(entry.dn(), "c").as_deref(), Some("US"));
        assert_eq!(
            dir.attribute(entry.dn(), "msExchUsageLocation").as_deref(),
            Some("US")
        );
    }

    #[tokio::test]
    async fn test_rejected_group_is_isolated() {
        let dir = MemoryDirectory::new("corp", "com");
        dir.reject_attribute("streetAddress", "constraint violation");
        let (session, mut entry) = committed_entry(&dir).await;
        let mut trace = DiagnosticTrace::default();

        // Staged by another caller and left pending
        session.set_attribute(&mut entry, "comment", "pending");

        let mapper = AttributeMapper::new();
        let all = params(&[("Street", "1 Main St"), ("JobTitle", "Engineer")]);
        let address = mapper
            .apply(&session, &mut entry, AttributeGroup::Address, &all, &mut trace)
            .await;
        let organization = mapper
            .apply(&session, &mut entry, AttributeGroup::Organization, &all, &mut trace)
            .await;

        assert!(!address.committed);
        assert!(address.cause.unwrap().contains("constraint violation"));
        assert!(organization.committed);
        assert_eq!(dir.attribute(entry.dn(), "title").as_deref(), Some("Engineer"));
        assert_eq!(dir.attribute(entry.dn(), "comment"), None);
        assert_eq!(entry.staged().get("comment"), Some("pending"));
        assert_eq!(trace.terminal().unwrap().operation, "UpdateAddress");
        assert!(trace.messages().iter().any(|m| {
            m.starts_with("Address attributes failed:") && m.contains("constraint violation")
        }));
    }

    #[tokio::test]
    async fn test_short_telephone_keys() {
        let dir = MemoryDirectory::new("corp", "com");
        let (session, mut entry) = committed_entry(&dir).await;
        let mut trace = DiagnosticTrace::default();

        let result = AttributeMapper::new()
            .apply(
                &session,
                &mut entry,
                AttributeGroup::Telephone,
                &params(&[("Page", "555-0101"), ("IP", "555-0102")]),
                &mut trace,
            )
            .await;

        assert!(result.committed);
        assert_eq!(dir.attribute(entry.dn(), "pager").as_deref(), Some("555-0101"));
        assert_eq!(dir.attribute(entry.dn(), "ipPhone").as_deref(), Some("555-0102"));
    }

    #[tokio::test]
    async fn test_apply_requires_committed_entry() {
        let dir = MemoryDirectory::new("corp", "com");
        let creds = BindCredentials::new("svc", "secret", "corp", "com");
        let session = DirectorySession::connect(&dir, &creds).await.unwrap();
        let mut entry = session.create_entry(session.root(), "John Smith");
        let mut trace = DiagnosticTrace::default();

        let result = AttributeMapper::new()
            .apply(
                &session,
                &mut entry,
                AttributeGroup::General,
                &params(&[("Office", "HQ")]),
                &mut trace,
            )
            .await;

        assert!(!result.committed);
        assert_eq!(dir.calls().commits, 0);
    }
}
