//! Organizational-unit paths

use crate::{Error, Result, MAX_PATH_DEPTH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of container names below the domain root, outermost first.
///
/// `["Region", "Dept", "Sales", "Users"]` names
/// `OU=Users,OU=Sales,OU=Dept,OU=Region,<root>`. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ContainerPath {
    segments: Vec<String>,
}

impl ContainerPath {
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();

        if segments.is_empty() {
            return Err(Error::EmptyPath);
        }
        if segments.len() > MAX_PATH_DEPTH {
            return Err(Error::InvalidArgument(format!(
                "Container path deeper than {} segments",
                MAX_PATH_DEPTH
            )));
        }
        if let Some(pos) = segments.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "Container path segment {} is blank",
                pos
            )));
        }

        Ok(Self { segments })
    }

    /// Parse a `/`-separated path such as `Region/Dept/Sales/Users`
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        Self::new(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; an empty path cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for ContainerPath {
    type Error = Error;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        Self::new(segments)
    }
}

impl From<ContainerPath> for Vec<String> {
    fn from(path: ContainerPath) -> Self {
        path.segments
    }
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
