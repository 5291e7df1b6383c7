//! Directory object handles and distinguished-name helpers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of directory object a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Domain root (`DC=...`)
    Domain,
    /// Organizational unit (`OU=...`)
    Container,
    /// User entry (`CN=...`)
    User,
    /// Group entry (`CN=...`)
    Group,
}

impl ObjectKind {
    /// RDN attribute type used when naming a child of this kind
    pub fn rdn_type(&self) -> &'static str {
        match self {
            ObjectKind::Domain => "DC",
            ObjectKind::Container => "OU",
            ObjectKind::User | ObjectKind::Group => "CN",
        }
    }

    /// Structural object class searched for when looking up a child
    pub fn object_class(&self) -> &'static str {
        match self {
            ObjectKind::Domain => "domainDNS",
            ObjectKind::Container => "organizationalUnit",
            ObjectKind::User => "user",
            ObjectKind::Group => "group",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Domain => "domain",
            ObjectKind::Container => "container",
            ObjectKind::User => "user",
            ObjectKind::Group => "group",
        };
        f.write_str(s)
    }
}

/// Reference to an object that exists in the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    /// Distinguished name
    pub dn: String,
    /// Unescaped RDN value (e.g. `Sales` for `OU=Sales,...`)
    pub name: String,
    pub kind: ObjectKind,
}

impl ObjectHandle {
    pub fn new(dn: impl Into<String>, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            dn: dn.into(),
            name: name.into(),
            kind,
        }
    }

    /// Handle for the domain root `DC=<domain>,DC=<realm>`
    pub fn domain_root(domain: &str, realm: &str) -> Self {
        Self::new(root_dn(domain, realm), domain, ObjectKind::Domain)
    }

    /// DN a child named `name` of the given kind would have under this object
    pub fn child_dn(&self, name: &str, kind: ObjectKind) -> String {
        child_dn(&self.dn, name, kind)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dn)
    }
}

/// Build the root DN for a domain and realm, e.g. `corp` + `com` -> `DC=corp,DC=com`
pub fn root_dn(domain: &str, realm: &str) -> String {
    domain
        .split('.')
        .chain(realm.split('.'))
        .filter(|part| !part.is_empty())
        .map(|part| format!("DC={}", escape_rdn_value(part)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build `<TYPE>=<escaped name>,<parent>`
pub fn child_dn(parent_dn: &str, name: &str, kind: ObjectKind) -> String {
    format!("{}={},{}", kind.rdn_type(), escape_rdn_value(name), parent_dn)
}

/// Escape special characters in an RDN value per RFC 4514.
pub fn escape_rdn_value(value: &str) -> String {
    let char_count = value.chars().count();
    let mut result = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' | '=' => {
                result.push('\\');
                result.push(c);
            }
            '#' if i == 0 => {
                result.push('\\');
                result.push(c);
            }
            ' ' if i == 0 || i == char_count - 1 => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}
