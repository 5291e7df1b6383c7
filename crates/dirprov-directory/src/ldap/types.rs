//! LDAP settings, filters and result-code handling

use dirprov_core::config::DirectoryConfig;
use dirprov_core::types::ObjectKind;
use dirprov_core::{Error, Result};
use ldap3::{ldap_escape, LdapResult};
use std::time::Duration;

/// LDAP result codes the transport interprets
pub mod rc {
    pub const SUCCESS: u32 = 0;
    pub const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
    pub const NO_SUCH_OBJECT: u32 = 32;
    pub const INVALID_CREDENTIALS: u32 = 49;
    pub const UNWILLING_TO_PERFORM: u32 = 53;
    pub const CONSTRAINT_VIOLATION: u32 = 19;
    pub const ENTRY_ALREADY_EXISTS: u32 = 68;
}

/// Connection and schema settings for an LDAP directory
#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub timeout: Duration,
    pub start_tls: bool,
    /// Object classes written on newly created users
    pub user_object_classes: Vec<String>,
    /// Base DN for group lookups; the session root when unset
    pub group_base_dn: Option<String>,
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self::from_config(&DirectoryConfig::default())
    }
}

impl LdapSettings {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            start_tls: config.start_tls,
            user_object_classes: config.user_object_classes.clone(),
            group_base_dn: config.group_base_dn.clone(),
        }
    }

    /// Object classes for a new object of `kind`
    pub fn object_classes(&self, kind: ObjectKind) -> Vec<&str> {
        match kind {
            ObjectKind::User => self.user_object_classes.iter().map(String::as_str).collect(),
            ObjectKind::Container => vec!["top", "organizationalUnit"],
            ObjectKind::Group => vec!["top", "group"],
            ObjectKind::Domain => vec!["top", "domainDNS"],
        }
    }
}

/// Naming attribute for a child of `kind` (`ou` or `cn`)
pub fn naming_attribute(kind: ObjectKind) -> String {
    kind.rdn_type().to_ascii_lowercase()
}

/// Filter matching the direct child named `name` of the given kind
pub fn child_filter(name: &str, kind: ObjectKind) -> String {
    format!(
        "(&(objectClass={})({}={}))",
        kind.object_class(),
        naming_attribute(kind),
        ldap_escape(name)
    )
}

/// Filter matching a group by common name or account name
pub fn group_filter(name: &str) -> String {
    let escaped = ldap_escape(name);
    format!(
        "(&(|(objectClass=group)(objectClass=groupOfNames))(|(cn={0})(sAMAccountName={0})))",
        escaped
    )
}

/// Filter matching a person whose `attribute` equals `value`
pub fn person_filter(attribute: &str, value: &str) -> String {
    format!("(&(objectClass=person)({}={}))", attribute, ldap_escape(value))
}

/// Encode a password for the Active Directory `unicodePwd` attribute:
/// the quoted password as UTF-16LE.
pub fn encode_unicode_pwd(password: &str) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(Error::InvalidArgument("Password cannot be empty".into()));
    }
    let quoted = format!("\"{}\"", password);
    Ok(quoted.encode_utf16().flat_map(u16::to_le_bytes).collect())
}

/// Map a write result for `dn` to the crate error taxonomy
pub fn check_write(result: &LdapResult, dn: &str) -> Result<()> {
    match result.rc {
        rc::SUCCESS => Ok(()),
        rc::ENTRY_ALREADY_EXISTS => Err(Error::AlreadyExists(dn.to_string())),
        rc::NO_SUCH_OBJECT => Err(Error::not_found("entry", dn)),
        code => Err(Error::Remote(describe(code, &result.text))),
    }
}

/// Human-readable form of a non-success result code
pub fn describe(code: u32, text: &str) -> String {
    let name = match code {
        rc::CONSTRAINT_VIOLATION => "constraint violation",
        rc::ATTRIBUTE_OR_VALUE_EXISTS => "attribute or value exists",
        rc::NO_SUCH_OBJECT => "no such object",
        rc::INVALID_CREDENTIALS => "invalid credentials",
        rc::UNWILLING_TO_PERFORM => "unwilling to perform",
        rc::ENTRY_ALREADY_EXISTS => "entry already exists",
        _ => "operation failed",
    };
    if text.is_empty() {
        format!("{} (rc={})", name, code)
    } else {
        format!("{} (rc={}): {}", name, code, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rc: u32, text: &str) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: text.to_string(),
            refs: vec![],
            ctrls: vec![],
        }
    }

    #[test]
    fn test_child_filter_escapes_value() {
        assert_eq!(
            child_filter("Sales", ObjectKind::Container),
            "(&(objectClass=organizationalUnit)(ou=Sales))"
        );
        assert_eq!(
            child_filter("R&D (EMEA)*", ObjectKind::Container),
            "(&(objectClass=organizationalUnit)(ou=R&D \\28EMEA\\29\\2a))"
        );
    }

    #[test]
    fn test_group_filter() {
        assert_eq!(
            group_filter("Sales"),
            "(&(|(objectClass=group)(objectClass=groupOfNames))(|(cn=Sales)(sAMAccountName=Sales)))"
        );
    }

    #[test]
    fn test_encode_unicode_pwd() {
        let encoded = encode_unicode_pwd("ab").unwrap();
        assert_eq!(encoded, vec![0x22, 0, 0x61, 0, 0x62, 0, 0x22, 0]);
        assert!(encode_unicode_pwd("").is_err());
    }

    #[test]
    fn test_check_write_codes() {
        assert!(check_write(&result(0, ""), "CN=x").is_ok());
        assert!(matches!(
            check_write(&result(68, ""), "CN=x"),
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            check_write(&result(32, ""), "CN=x"),
            Err(Error::NotFound { .. })
        ));
        match check_write(&result(19, "0000052D: password policy"), "CN=x") {
            Err(Error::Remote(cause)) => {
                assert_eq!(cause, "constraint violation (rc=19): 0000052D: password policy")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_object_classes() {
        let settings = LdapSettings::default();
        assert_eq!(
            settings.object_classes(ObjectKind::User),
            vec!["top", "person", "organizationalPerson", "user"]
        );
        assert_eq!(
            settings.object_classes(ObjectKind::Container),
            vec!["top", "organizationalUnit"]
        );
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }
}
