//! Attribute groups ("tabs")

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, closed set of canonical keys committed together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeGroup {
    Account,
    General,
    Address,
    Profile,
    Organization,
    Telephone,
    OrganizationExtra,
}

impl AttributeGroup {
    /// Application order used by the provisioning workflow
    pub const ORDER: [AttributeGroup; 7] = [
        AttributeGroup::Account,
        AttributeGroup::General,
        AttributeGroup::Address,
        AttributeGroup::Profile,
        AttributeGroup::Organization,
        AttributeGroup::Telephone,
        AttributeGroup::OrganizationExtra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeGroup::Account => "Account",
            AttributeGroup::General => "General",
            AttributeGroup::Address => "Address",
            AttributeGroup::Profile => "Profile",
            AttributeGroup::Organization => "Organization",
            AttributeGroup::Telephone => "Telephone",
            AttributeGroup::OrganizationExtra => "OrganizationExtra",
        }
    }
}

impl fmt::Display for AttributeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
