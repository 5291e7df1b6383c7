//! Group membership assignment
//!
//! Adds one member to a list of existing groups. Every group is attempted
//! independently and an existing membership counts as success. Nothing here
//! can remove a member or delete a group.

use crate::trace::DiagnosticTrace;
use dirprov_core::types::{MemberIdentity, MembershipOutcome};
use dirprov_core::Error;
use dirprov_directory::{AddMemberOutcome, DirectorySession, GroupDirectory};
use std::sync::Arc;
use tracing::{info, warn};

/// Per-group outcomes of one assignment batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    pub outcomes: Vec<MembershipOutcome>,
}

impl AssignmentResult {
    /// Every group failed for the same reason, without any remote call
    pub fn unavailable<S: AsRef<str>>(groups: &[S], cause: &str) -> Self {
        Self {
            outcomes: groups
                .iter()
                .map(|g| MembershipOutcome::failed(g.as_ref(), cause))
                .collect(),
        }
    }

    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &MembershipOutcome> {
        self.outcomes.iter().filter(|o| !o.ok)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

pub struct GroupMembershipManager {
    directory: Arc<dyn GroupDirectory>,
}

impl GroupMembershipManager {
    pub fn new(directory: Arc<dyn GroupDirectory>) -> Self {
        Self { directory }
    }

    /// Manager over the groups reachable through `session`
    pub fn for_session(session: &DirectorySession) -> Self {
        Self::new(session.group_directory())
    }

    pub async fn assign_memberships<S: AsRef<str>>(
        &self,
        member: &MemberIdentity,
        groups: &[S],
        trace: &mut DiagnosticTrace,
    ) -> AssignmentResult {
        let mut outcomes = Vec::with_capacity(groups.len());

        for group in groups {
            let group = group.as_ref();
            trace.append(format!("Adding {} to group {}", member, group));

            let outcome = match self.assign_one(member, group).await {
                Ok(AddMemberOutcome::Added) => {
                    trace.append(format!("Added to group {}", group));
                    MembershipOutcome::added(group)
                }
                Ok(AddMemberOutcome::AlreadyMember) => {
                    trace.append(format!("Already a member of group {}", group));
                    MembershipOutcome::duplicate(group)
                }
                Err(e) => {
                    warn!(group, error = %e, "Group assignment failed");
                    trace.append(format!("Failed to add to group {}: {}", group, e));
                    trace.fail("AssignMemberships", &e);
                    MembershipOutcome::failed(group, e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        let result = AssignmentResult { outcomes };
        info!(
            groups = result.len(),
            failed = result.failed().count(),
            "Group assignment finished"
        );
        result
    }

    async fn assign_one(&self, member: &MemberIdentity, group: &str) -> Result<AddMemberOutcome, Error> {
        let failure = |cause: String| Error::GroupAssignment {
            group: group.to_string(),
            cause,
        };

        if group.trim().is_empty() {
            return Err(failure("blank group name".into()));
        }

        let handle = self
            .directory
            .find_group(group)
            .await
            .map_err(|e| failure(e.to_string()))?
            .ok_or_else(|| failure("group not found".into()))?;

        self.directory
            .add_member(&handle, member)
            .await
            .map_err(|e| failure(e.to_string()))
    }
}
