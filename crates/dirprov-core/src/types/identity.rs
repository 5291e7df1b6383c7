//! Member identity references used for group membership

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a member is identified when added to a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityType {
    #[default]
    UserPrincipalName,
    SamAccountName,
    DistinguishedName,
}

impl IdentityType {
    /// Directory attribute holding this identity on a user entry
    pub fn attribute(&self) -> &'static str {
        match self {
            IdentityType::UserPrincipalName => "userPrincipalName",
            IdentityType::SamAccountName => "sAMAccountName",
            IdentityType::DistinguishedName => "distinguishedName",
        }
    }
}

/// Reference to the identity being added to groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub identity_type: IdentityType,
    pub value: String,
}

impl MemberIdentity {
    pub fn new(identity_type: IdentityType, value: impl Into<String>) -> Self {
        Self {
            identity_type,
            value: value.into(),
        }
    }

    pub fn upn(value: impl Into<String>) -> Self {
        Self::new(IdentityType::UserPrincipalName, value)
    }
}

impl fmt::Display for MemberIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.identity_type.attribute(), self.value)
    }
}
