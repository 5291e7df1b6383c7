//! Provisioning report records

use super::AttributeGroup;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of a provisioning run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Idle,
    Authenticated,
    PathResolved,
    EntryStaged,
    EntryCommitted,
    AttributesApplied,
    MembershipsAssigned,
    Done,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Idle => "idle",
            WorkflowStage::Authenticated => "authenticated",
            WorkflowStage::PathResolved => "path_resolved",
            WorkflowStage::EntryStaged => "entry_staged",
            WorkflowStage::EntryCommitted => "entry_committed",
            WorkflowStage::AttributesApplied => "attributes_applied",
            WorkflowStage::MembershipsAssigned => "memberships_assigned",
            WorkflowStage::Done => "done",
        }
    }

    /// Whether the entry exists remotely once this stage has been reached
    pub fn entry_exists(&self) -> bool {
        *self >= WorkflowStage::EntryCommitted
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What took effect in the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every stage succeeded
    Completed,
    /// Entry created, but some credential, attribute group or membership failed
    Partial,
    /// Nothing was written for the entry
    NotCreated,
}

/// Outcome of one attribute group commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOutcome {
    pub group: AttributeGroup,
    pub ok: bool,
    pub cause: Option<String>,
}

/// Outcome of one group membership assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipOutcome {
    pub group: String,
    pub ok: bool,
    pub cause: Option<String>,
    /// The member was already present; counted as success
    #[serde(default)]
    pub already_member: bool,
}

impl MembershipOutcome {
    pub fn added(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ok: true,
            cause: None,
            already_member: false,
        }
    }

    pub fn duplicate(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ok: true,
            cause: None,
            already_member: true,
        }
    }

    pub fn failed(group: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ok: false,
            cause: Some(cause.into()),
            already_member: false,
        }
    }
}

/// The single terminal failure record of a diagnostic trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalError {
    pub operation: String,
    pub cause: String,
}

/// Structured result of a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningReport {
    /// True only if every stage succeeded
    pub success: bool,
    pub status: ReportStatus,
    pub entry_dn: Option<String>,
    /// Last stage reached successfully
    pub stage_reached: WorkflowStage,
    /// Stage that could not be reached because a fatal error stopped the run
    pub failed_at: Option<WorkflowStage>,
    pub credential_set: bool,
    pub group_outcomes: Vec<GroupOutcome>,
    pub membership_outcomes: Vec<MembershipOutcome>,
    pub trace: Vec<String>,
    pub terminal_error: Option<TerminalError>,
}

impl ProvisioningReport {
    pub fn entry_created(&self) -> bool {
        self.status != ReportStatus::NotCreated
    }

    pub fn group_outcome(&self, group: AttributeGroup) -> Option<&GroupOutcome> {
        self.group_outcomes.iter().find(|o| o.group == group)
    }

    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.group_outcomes.iter().filter(|o| !o.ok)
    }

    pub fn failed_memberships(&self) -> impl Iterator<Item = &MembershipOutcome> {
        self.membership_outcomes.iter().filter(|o| !o.ok)
    }
}
