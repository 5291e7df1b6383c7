//! Provisioning workflow for Dirprov
//!
//! Creates one directory user entry under an organizational-unit path,
//! sets its initial credential, applies attribute groups one commit at a
//! time and adds it to groups, recording every step in a diagnostic trace.

pub mod mapper;
pub mod membership;
pub mod trace;
pub mod workflow;

pub use mapper::{AppliedGroupResult, AttributeMapper, AttributeMapping, Params, RequiredFields};
pub use membership::{AssignmentResult, GroupMembershipManager};
pub use trace::{render_failure, DiagnosticTrace, TraceEntry, NO_ERROR_RECORDED, WORKFLOW_COMPONENT};
pub use workflow::{ProvisioningOutcome, ProvisioningRequest, ProvisioningWorkflow};
