//! Container path resolution
//!
//! Resolution is a strict left-to-right walk below the session root. The
//! read-only walk never creates anything; `resolve_or_create` is the only
//! operation that builds missing containers.

use crate::session::DirectorySession;
use dirprov_core::types::{ContainerPath, ObjectHandle};
use dirprov_core::{Error, Result};
use tracing::{debug, info, instrument};

/// Terminal container of a path walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolution {
    pub container: ObjectHandle,
    /// Segments created during the walk, outermost first
    pub created: Vec<String>,
}

/// Walks container paths through a session
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        Self
    }

    /// Find every segment of `path` in turn, failing at the first missing one
    #[instrument(skip(self, session, path), fields(path = %path))]
    pub async fn resolve(
        &self,
        session: &DirectorySession,
        path: &ContainerPath,
    ) -> Result<ObjectHandle> {
        let mut current = session.root().clone();

        for (depth, segment) in path.iter().enumerate() {
            current = match session.find_container(&current, segment).await {
                Ok(child) => child,
                Err(Error::NotFound { .. }) => {
                    debug!(segment, depth, "Container path segment missing");
                    return Err(Error::Path {
                        segment: segment.to_string(),
                        depth,
                    });
                }
                Err(e) => return Err(e),
            };
        }

        debug!(dn = %current.dn, "Resolved container path");
        Ok(current)
    }

    /// Resolve raw segments, rejecting an empty list
    pub async fn resolve_segments<S: AsRef<str>>(
        &self,
        session: &DirectorySession,
        segments: &[S],
    ) -> Result<ObjectHandle> {
        let path = ContainerPath::new(segments.iter().map(|s| s.as_ref().to_string()))?;
        self.resolve(session, &path).await
    }

    /// Walk `path`, creating each missing segment before descending into it
    #[instrument(skip(self, session, path), fields(path = %path))]
    pub async fn resolve_or_create(
        &self,
        session: &DirectorySession,
        path: &ContainerPath,
    ) -> Result<PathResolution> {
        let mut current = session.root().clone();
        let mut created = Vec::new();

        for (depth, segment) in path.iter().enumerate() {
            current = match session.find_container(&current, segment).await {
                Ok(child) => child,
                Err(Error::NotFound { .. }) => {
                    match session.create_container(&current, segment).await {
                        Ok(child) => {
                            created.push(segment.to_string());
                            child
                        }
                        // Created concurrently by someone else
                        Err(Error::AlreadyExists(_)) => session
                            .find_container(&current, segment)
                            .await
                            .map_err(|e| path_failure(segment, depth, e))?,
                        Err(e) => return Err(path_failure(segment, depth, e)),
                    }
                }
                Err(e) => return Err(e),
            };
        }

        info!(dn = %current.dn, created = created.len(), "Container path ready");
        Ok(PathResolution {
            container: current,
            created,
        })
    }
}

fn path_failure(segment: &str, depth: usize, cause: Error) -> Error {
    match cause {
        Error::NotFound { .. } => Error::Path {
            segment: segment.to_string(),
            depth,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;
    use crate::session::BindCredentials;

    async fn session(dir: &MemoryDirectory) -> DirectorySession {
        let creds = BindCredentials::new("svc", "secret", "corp", "com");
        DirectorySession::connect(dir, &creds).await.unwrap()
    }

    fn path(segments: &[&str]) -> ContainerPath {
        ContainerPath::new(segments.iter().copied()).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_full_path() {
        let dir = MemoryDirectory::new("corp", "com");
        dir.add_container_path(&["Region", "Dept", "Sales", "Users"]);
        let session = session(&dir).await;
        let before = dir.calls();

        let handle = PathResolver::new()
            .resolve(&session, &path(&["Region", "Dept", "Sales", "Users"]))
            .await
            .unwrap();

        let calls = dir.calls();
        assert_eq!(
            handle.dn,
            "OU=Users,OU=Sales,OU=Dept,OU=Region,DC=corp,DC=com"
        );
        assert_eq!(calls.finds - before.finds, 4);
        assert_eq!(calls.creates, 0);
    }

    #[tokio::test]
    async fn test_resolve_missing_segment() {
        let dir = MemoryDirectory::new("corp", "com");
        dir.add_container_path(&["Region", "Dept"]);
        let session = session(&dir).await;

        let err = PathResolver::new()
            .resolve(&session, &path(&["Region", "Dept", "Sales", "Users"]))
            .await
            .unwrap_err();

        match err {
            Error::Path { segment, depth } => {
                assert_eq!(segment, "Sales");
                assert_eq!(depth, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(dir.calls().finds, 3);
        assert_eq!(dir.calls().creates, 0);
        assert!(!dir.contains("OU=Sales,OU=Dept,OU=Region,DC=corp,DC=com"));
    }

    #[tokio::test]
    async fn test_resolve_empty_segments() {
        let dir = MemoryDirectory::new("corp", "com");
        let session = session(&dir).await;

        let segments: [&str; 0] = [];
        let err = PathResolver::new()
            .resolve_segments(&session, &segments)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyPath));
        assert_eq!(dir.calls().finds, 0);
    }

    #[tokio::test]
    async fn test_resolve_or_create_builds_missing_tail() {
        let dir = MemoryDirectory::new("corp", "com");
        dir.add_container_path(&["Region"]);
        let session = session(&dir).await;

        let resolution = PathResolver::new()
            .resolve_or_create(&session, &path(&["Region", "Dept", "Sales"]))
            .await
            .unwrap();

        assert_eq!(resolution.created, vec!["Dept", "Sales"]);
        assert_eq!(
            resolution.container.dn,
            "OU=Sales,OU=Dept,OU=Region,DC=corp,DC=com"
        );
        assert_eq!(dir.calls().creates, 2);

        // Second walk finds everything
        let again = PathResolver::new()
            .resolve_or_create(&session, &path(&["Region", "Dept", "Sales"]))
            .await
            .unwrap();
        assert!(again.created.is_empty());
        assert_eq!(dir.calls().creates, 2);
    }
}
