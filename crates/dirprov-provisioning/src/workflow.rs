//! Provisioning workflow
//!
//! Drives one run through
//! `Idle -> Authenticated -> PathResolved -> EntryStaged -> EntryCommitted
//! -> AttributesApplied -> MembershipsAssigned -> Done`.
//!
//! Validation and every stage up to the entry commit are fatal: the run
//! stops and nothing is left half-created. After the commit, the credential,
//! each attribute group and each membership are isolated units whose
//! failures are reported, not raised. No remote call is retried and nothing
//! already committed is undone, including on cancellation.

use crate::mapper::{creation_attributes, AttributeMapper, Params, RequiredFields};
use crate::membership::{AssignmentResult, GroupMembershipManager};
use crate::trace::{DiagnosticTrace, WORKFLOW_COMPONENT};
use dirprov_core::config::ProvisioningConfig;
use dirprov_core::types::{
    AttributeGroup, ContainerPath, GroupOutcome, IdentityType, MemberIdentity,
    MembershipOutcome, PasswordPolicy, ProvisioningReport, ReportStatus, WorkflowStage,
};
use dirprov_core::{Error, Result, DEFAULT_PASSWORD_BYTES};
use dirprov_crypto::PasswordGenerator;
use dirprov_directory::{
    BindCredentials, DirectoryConnector, DirectorySession, EntryHandle, GraphGroupDirectory,
    GroupDirectory, PathResolver,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// What to provision: where, with which fields, into which groups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    /// Container path below the domain root, outermost first
    pub path: ContainerPath,
    /// Canonical key/value fields (`FirstName`, `LastName`, `Street`, ...)
    #[serde(default)]
    pub attributes: Params,
    /// Names of existing groups to add the new entry to
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Report plus the generated initial password.
///
/// The password is handed to the caller only; it is not part of the report.
pub struct ProvisioningOutcome {
    pub report: ProvisioningReport,
    pub initial_password: Option<String>,
    /// The error that stopped the run, if any
    pub fatal: Option<Error>,
}

impl ProvisioningOutcome {
    pub fn success(&self) -> bool {
        self.report.success
    }
}

impl fmt::Debug for ProvisioningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningOutcome")
            .field("report", &self.report)
            .field(
                "initial_password",
                &self.initial_password.as_ref().map(|_| "<redacted>"),
            )
            .field("fatal", &self.fatal)
            .finish()
    }
}

pub struct ProvisioningWorkflow {
    connector: Arc<dyn DirectoryConnector>,
    credentials: BindCredentials,
    passwords: PasswordGenerator,
    password_bytes: usize,
    identity_type: IdentityType,
    group_directory: Option<Arc<dyn GroupDirectory>>,
    resolver: PathResolver,
    mapper: AttributeMapper,
    cancel: CancellationToken,
}

impl ProvisioningWorkflow {
    pub fn new(connector: Arc<dyn DirectoryConnector>, credentials: BindCredentials) -> Self {
        Self {
            connector,
            credentials,
            passwords: PasswordGenerator::default(),
            password_bytes: DEFAULT_PASSWORD_BYTES,
            identity_type: IdentityType::default(),
            group_directory: None,
            resolver: PathResolver::new(),
            mapper: AttributeMapper::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Workflow configured from `config`. When a graph section is present,
    /// memberships go to the identity graph instead of the directory.
    pub fn from_config(
        connector: Arc<dyn DirectoryConnector>,
        config: &ProvisioningConfig,
    ) -> Result<Self> {
        let mut workflow = Self::new(connector, BindCredentials::from_config(&config.directory))
            .with_password_policy(config.password.policy, config.password.byte_length)
            .with_identity_type(config.membership.identity_type);

        if let Some(graph) = &config.graph {
            workflow = workflow.with_group_directory(Arc::new(GraphGroupDirectory::from_config(graph)?));
        }
        Ok(workflow)
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy, byte_length: usize) -> Self {
        self.passwords = PasswordGenerator::new(policy);
        self.password_bytes = byte_length;
        self
    }

    pub fn with_identity_type(mut self, identity_type: IdentityType) -> Self {
        self.identity_type = identity_type;
        self
    }

    /// Use `directory` for group memberships instead of the session's own
    pub fn with_group_directory(mut self, directory: Arc<dyn GroupDirectory>) -> Self {
        self.group_directory = Some(directory);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Open a session with the configured credentials
    pub async fn connect(&self) -> Result<DirectorySession> {
        DirectorySession::connect(self.connector.as_ref(), &self.credentials).await
    }

    #[instrument(skip(self, request), fields(path = %request.path, groups = request.groups.len()))]
    pub async fn run(&self, request: &ProvisioningRequest) -> ProvisioningOutcome {
        let mut run = Run::new();

        // Validation, before any remote call
        let fields = match RequiredFields::from_params(&request.attributes) {
            Ok(fields) => fields,
            Err(e) => return run.abort(WorkflowStage::Authenticated, "ValidateRequest", e),
        };
        let display_name = fields.display_name();
        run.trace
            .append(format!("Validated required fields for: {}", display_name));

        let password = match self.passwords.generate(self.password_bytes) {
            Ok(password) => password,
            Err(e) => return run.abort(WorkflowStage::Authenticated, "GeneratePassword", e),
        };
        run.trace.append("Generated initial password");

        // Idle -> Authenticated
        if let Err(e) = self.check_cancelled(WorkflowStage::Authenticated) {
            return run.abort(WorkflowStage::Authenticated, "Connect", e);
        }
        run.trace
            .append(format!("Connecting to directory: {}", self.credentials.uri()));
        let session = match self.connect().await {
            Ok(session) => session,
            Err(e) => return run.abort(WorkflowStage::Authenticated, "Connect", e),
        };
        run.trace.append("Successfully connected to directory");
        run.stage = WorkflowStage::Authenticated;

        // Authenticated -> PathResolved
        if let Err(e) = self.check_cancelled(WorkflowStage::PathResolved) {
            return run.abort(WorkflowStage::PathResolved, "ResolvePath", e);
        }
        run.trace
            .append(format!("Resolving container path: {}", request.path));
        let container = match self.resolver.resolve(&session, &request.path).await {
            Ok(container) => container,
            Err(e) => return run.abort(WorkflowStage::PathResolved, "ResolvePath", e),
        };
        run.trace.append(format!("Container resolved: {}", container.dn));
        run.stage = WorkflowStage::PathResolved;

        // PathResolved -> EntryStaged
        if let Err(e) = self.check_cancelled(WorkflowStage::EntryStaged) {
            return run.abort(WorkflowStage::EntryStaged, "CreateEntry", e);
        }
        run.trace
            .append(format!("Creating user instance: {}", display_name));
        let mut entry = session.create_entry(&container, &display_name);
        for (name, value) in creation_attributes(&fields, &request.attributes).iter() {
            session.set_attribute(&mut entry, name, value);
        }
        run.entry_dn = Some(entry.dn().to_string());
        run.stage = WorkflowStage::EntryStaged;

        // EntryStaged -> EntryCommitted
        if let Err(e) = self.check_cancelled(WorkflowStage::EntryCommitted) {
            return run.abort(WorkflowStage::EntryCommitted, "CreateEntry", e);
        }
        run.trace.append("Attempting to commit changes");
        if let Err(e) = session.commit(&mut entry).await {
            return run.abort(WorkflowStage::EntryCommitted, "CreateEntry", e);
        }
        run.trace.append(format!("User instance created: {}", entry.dn()));
        run.stage = WorkflowStage::EntryCommitted;
        info!(dn = %entry.dn(), "Entry created");

        // Credential, once, before the first attribute group
        if let Err(e) = self.check_cancelled(WorkflowStage::AttributesApplied) {
            return run.stop(WorkflowStage::AttributesApplied, e, Some(password));
        }
        run.trace.append("Setting initial password");
        match session.set_credential(&entry, &password).await {
            Ok(()) => {
                run.credential_set = true;
                run.trace.append("Initial password set");
            }
            Err(e) => {
                warn!(error = %e, "Setting initial password failed");
                run.trace
                    .append(format!("Setting initial password failed: {}", e));
                run.trace.fail("SetPassword", &e);
            }
        }

        // EntryCommitted -> AttributesApplied
        for group in AttributeGroup::ORDER {
            if let Err(e) = self.check_cancelled(WorkflowStage::AttributesApplied) {
                return run.stop(WorkflowStage::AttributesApplied, e, Some(password));
            }
            let result = self
                .mapper
                .apply(&session, &mut entry, group, &request.attributes, &mut run.trace)
                .await;
            run.group_outcomes.push(GroupOutcome::from(result));
        }
        run.stage = WorkflowStage::AttributesApplied;

        // AttributesApplied -> MembershipsAssigned
        if let Err(e) = self.check_cancelled(WorkflowStage::MembershipsAssigned) {
            return run.stop(WorkflowStage::MembershipsAssigned, e, Some(password));
        }
        let assignment = self
            .assign_memberships(&session, &entry, request, &mut run.trace)
            .await;
        run.membership_outcomes = assignment.outcomes;
        run.stage = WorkflowStage::MembershipsAssigned;

        run.stage = WorkflowStage::Done;
        run.finish(password)
    }

    async fn assign_memberships(
        &self,
        session: &DirectorySession,
        entry: &EntryHandle,
        request: &ProvisioningRequest,
        trace: &mut DiagnosticTrace,
    ) -> AssignmentResult {
        if request.groups.is_empty() {
            return AssignmentResult::default();
        }

        let Some(member) = self.member_identity(entry, &request.attributes) else {
            let cause = format!(
                "member identity unavailable: no {} supplied",
                self.identity_type.attribute()
            );
            trace.append(format!("Skipping group assignment: {}", cause));
            trace.fail("AssignMemberships", &cause);
            return AssignmentResult::unavailable(&request.groups, &cause);
        };

        let manager = match &self.group_directory {
            Some(directory) => GroupMembershipManager::new(directory.clone()),
            None => GroupMembershipManager::for_session(session),
        };
        manager
            .assign_memberships(&member, &request.groups, trace)
            .await
    }

    /// Identity of the new entry in the configured form
    fn member_identity(&self, entry: &EntryHandle, params: &Params) -> Option<MemberIdentity> {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| params.get(*k))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(String::from)
        };

        let value = match self.identity_type {
            IdentityType::UserPrincipalName => first(&["UPN", "Email"][..]),
            IdentityType::SamAccountName => first(&["AccountName", "Username"][..]),
            IdentityType::DistinguishedName => Some(entry.dn().to_string()),
        }?;
        Some(MemberIdentity::new(self.identity_type, value))
    }

    fn check_cancelled(&self, stage: WorkflowStage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

/// Mutable state of one run
struct Run {
    trace: DiagnosticTrace,
    stage: WorkflowStage,
    entry_dn: Option<String>,
    credential_set: bool,
    group_outcomes: Vec<GroupOutcome>,
    membership_outcomes: Vec<MembershipOutcome>,
}

impl Run {
    fn new() -> Self {
        Self {
            trace: DiagnosticTrace::new(WORKFLOW_COMPONENT),
            stage: WorkflowStage::Idle,
            entry_dn: None,
            credential_set: false,
            group_outcomes: Vec::new(),
            membership_outcomes: Vec::new(),
        }
    }

    /// Fatal failure before the entry exists
    fn abort(mut self, failed_at: WorkflowStage, operation: &str, error: Error) -> ProvisioningOutcome {
        warn!(stage = %failed_at, error = %error, "Provisioning aborted");
        self.trace.fail(operation, &error);
        if !self.stage.entry_exists() {
            self.entry_dn = None;
        }
        self.outcome(Some(failed_at), false, None, Some(error))
    }

    /// Cancellation after the entry was committed; committed state is kept
    fn stop(mut self, failed_at: WorkflowStage, error: Error, password: Option<String>) -> ProvisioningOutcome {
        warn!(stage = %failed_at, "Provisioning cancelled after entry creation");
        self.trace.fail(WORKFLOW_COMPONENT, &error);
        let password = password.filter(|_| self.credential_set);
        self.outcome(Some(failed_at), false, password, Some(error))
    }

    fn finish(mut self, password: String) -> ProvisioningOutcome {
        let mut failed = Vec::new();
        if !self.credential_set {
            failed.push("initial password".to_string());
        }
        let groups: Vec<&str> = self
            .group_outcomes
            .iter()
            .filter(|o| !o.ok)
            .map(|o| o.group.as_str())
            .collect();
        if !groups.is_empty() {
            failed.push(format!("attribute groups [{}]", groups.join(", ")));
        }
        let memberships: Vec<&str> = self
            .membership_outcomes
            .iter()
            .filter(|o| !o.ok)
            .map(|o| o.group.as_str())
            .collect();
        if !memberships.is_empty() {
            failed.push(format!("memberships [{}]", memberships.join(", ")));
        }

        let success = failed.is_empty();
        if !success {
            self.trace.fail(
                WORKFLOW_COMPONENT,
                format!(
                    "Entry {} created but some operations failed: {}",
                    self.entry_dn.as_deref().unwrap_or_default(),
                    failed.join("; ")
                ),
            );
        }
        info!(success, "Provisioning finished");

        let password = Some(password).filter(|_| self.credential_set);
        self.outcome(None, success, password, None)
    }

    fn outcome(
        self,
        failed_at: Option<WorkflowStage>,
        success: bool,
        initial_password: Option<String>,
        fatal: Option<Error>,
    ) -> ProvisioningOutcome {
        let status = if success {
            ReportStatus::Completed
        } else if self.stage.entry_exists() {
            ReportStatus::Partial
        } else {
            ReportStatus::NotCreated
        };

        let report = ProvisioningReport {
            success,
            status,
            entry_dn: self.entry_dn,
            stage_reached: self.stage,
            failed_at,
            credential_set: self.credential_set,
            group_outcomes: self.group_outcomes,
            membership_outcomes: self.membership_outcomes,
            trace: self.trace.messages(),
            terminal_error: self.trace.terminal().cloned(),
        };

        ProvisioningOutcome {
            report,
            initial_password,
            fatal,
        }
    }
}
