//! Error types for Dirprov

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Session Errors
    #[error("Authentication to {uri} failed: {cause}")]
    Auth { uri: String, cause: String },

    // Path Errors
    #[error("Container path segment '{segment}' not found (resolved depth {depth})")]
    Path { segment: String, depth: usize },

    #[error("Container path is empty; at least one segment is required")]
    EmptyPath,

    // Validation Errors
    #[error("Required field missing: {0}")]
    RequiredField(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Write Errors
    #[error("Commit of {dn} failed: {cause}")]
    Commit { dn: String, cause: String },

    #[error("Setting credential on {dn} failed: {cause}")]
    Credential { dn: String, cause: String },

    #[error("Group assignment to '{group}' failed: {cause}")]
    GroupAssignment { group: String, cause: String },

    // Lookup Errors
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    // Collaborator Errors
    #[error("Directory service error: {0}")]
    Remote(String),

    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Cancelled before stage {stage}")]
    Cancelled { stage: String },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Auth { .. } => "AuthError",
            Error::Path { .. } => "PathError",
            Error::EmptyPath => "EmptyPathError",
            Error::RequiredField(_) => "RequiredFieldError",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::Commit { .. } => "CommitError",
            Error::Credential { .. } => "CredentialError",
            Error::GroupAssignment { .. } => "GroupAssignmentError",
            Error::NotFound { .. } => "NotFoundError",
            Error::AlreadyExists(_) => "AlreadyExists",
            Error::Remote(_) => "DirectoryError",
            Error::Entropy(_) => "EntropyError",
            Error::Cancelled { .. } => "Cancelled",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn remote(cause: impl std::fmt::Display) -> Self {
        Error::Remote(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::EmptyPath.code(), "EmptyPathError");
        assert_eq!(
            Error::Path {
                segment: "Sales".into(),
                depth: 2
            }
            .code(),
            "PathError"
        );
        assert_eq!(Error::RequiredField("LastName".into()).code(), "RequiredFieldError");
    }

    #[test]
    fn test_path_error_message() {
        let err = Error::Path {
            segment: "Users".into(),
            depth: 3,
        };
        assert_eq!(
            err.to_string(),
            "Container path segment 'Users' not found (resolved depth 3)"
        );
    }
}
